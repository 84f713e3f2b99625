//! Shelf application library
//!
//! Project modules plus the bootstrap shared by the server binary and the CLI.

pub mod app;
pub mod modules;

pub use app::App;

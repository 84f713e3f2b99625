pub mod books;

use std::sync::Arc;

use shelf_db::Pool;
use shelf_kernel::ModuleRegistry;

/// Handles to the project modules, for callers that need more than the
/// `Module` trait exposes
pub struct Modules {
    pub books: Arc<books::BooksModule>,
}

/// Register all project-specific modules with the registry
pub fn register_all(registry: &mut ModuleRegistry, pool: &Pool) -> anyhow::Result<Modules> {
    let books = books::create_module(pool.clone());
    registry.register(books.clone())?;

    Ok(Modules { books })
}

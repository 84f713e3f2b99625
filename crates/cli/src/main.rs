use anyhow::Context;
use clap::{Parser, Subcommand};

use shelf_app::App;
use shelf_kernel::settings::Settings;

mod admin;

#[derive(Parser, Debug)]
#[command(
    name = "shelf",
    version,
    about = "Shelf: book purchase requests for students",
    after_help = "Examples:\n  shelf migrate\n  shelf serve\n  shelf admin list --status Pendente --search rosalia\n  shelf admin show 12\n  shelf admin edit 12 --status Aprobado\n"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the HTTP API
    Serve,

    /// Apply pending database migrations
    Migrate,

    /// Review and edit book requests
    Admin {
        #[command(subcommand)]
        command: admin::AdminCommand,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load().with_context(|| "failed to load Shelf settings")?;
    shelf_telemetry::init(&settings.telemetry)?;

    tracing::debug!(env = ?settings.environment, command = ?cli.command, "shelf cli starting");

    let app = App::build(settings).await?;

    match cli.command {
        Commands::Serve => app.serve().await,
        Commands::Migrate => {
            let applied = app.migrate().await?;
            println!("applied {applied} migration(s)");
            for (module, id) in app.applied_migrations().await? {
                println!("  {module}/{id}");
            }
            Ok(())
        }
        Commands::Admin { command } => {
            app.prepare().await?;
            admin::run(&app, command).await
        }
    }
}

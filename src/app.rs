use anyhow::Context;
use axum::Router;
use shelf_db::Pool;
use shelf_kernel::{settings::Settings, InitCtx, ModuleRegistry};

use crate::modules::{self, Modules};

/// A connected application: settings, database pool and registered modules.
pub struct App {
    pub settings: Settings,
    pub pool: Pool,
    pub registry: ModuleRegistry,
    pub modules: Modules,
}

impl App {
    /// Connect to the configured database and register every module.
    pub async fn build(settings: Settings) -> anyhow::Result<Self> {
        let pool = shelf_db::connect(&settings.database)
            .await
            .with_context(|| format!("failed to open database '{}'", settings.database.url))?;

        let mut registry = ModuleRegistry::new();
        let modules = modules::register_all(&mut registry, &pool)?;

        Ok(Self {
            settings,
            pool,
            registry,
            modules,
        })
    }

    /// Apply pending module migrations; returns how many ran
    pub async fn migrate(&self) -> anyhow::Result<usize> {
        let migrations = self.registry.collect_migrations();
        let applied = shelf_db::migrate(&self.pool, &migrations)
            .await
            .context("failed to apply migrations")?;

        tracing::info!(applied, total = migrations.len(), "migrations complete");
        Ok(applied)
    }

    /// `(module, migration id)` pairs recorded so far, oldest first
    pub async fn applied_migrations(&self) -> anyhow::Result<Vec<(String, String)>> {
        shelf_db::applied_migrations(&self.pool)
            .await
            .context("failed to read applied migrations")
    }

    /// Initialize modules and bring the schema up to date
    pub async fn prepare(&self) -> anyhow::Result<()> {
        let ctx = InitCtx {
            settings: &self.settings,
        };
        self.registry.init_all(&ctx).await?;
        self.migrate().await?;
        Ok(())
    }

    pub fn router(&self) -> Router {
        shelf_http::build_router(&self.registry, &self.settings)
    }

    /// Run the HTTP server until shutdown, driving the module lifecycle
    /// around it.
    pub async fn serve(self) -> anyhow::Result<()> {
        self.prepare().await?;

        let ctx = InitCtx {
            settings: &self.settings,
        };
        self.registry.start_all(&ctx).await?;

        let served = shelf_http::start_server(&self.registry, &self.settings).await;

        self.registry.stop_all().await?;
        self.pool.close().await;
        served
    }
}

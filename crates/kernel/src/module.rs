use async_trait::async_trait;
use axum::Router;

/// Context handed to modules while the application boots
pub struct InitCtx<'a> {
    pub settings: &'a crate::settings::Settings,
}

/// A schema change contributed by a module.
///
/// `id` must be unique within the owning module; ids are applied in
/// lexical order, so prefix them with a zero-padded sequence number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    pub id: &'static str,
    pub up: &'static str,
}

/// Contract every Shelf module implements
#[async_trait]
pub trait Module: Sync + Send {
    /// Unique name for this module, also used as its mount prefix
    fn name(&self) -> &'static str;

    /// Called during startup before migrations run
    async fn init(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    /// Routes mounted under `/api/{module_name}`
    fn routes(&self) -> Router {
        Router::new()
    }

    /// OpenAPI fragment (`paths` and `components.schemas`) merged into the
    /// application document
    fn openapi(&self) -> Option<serde_json::Value> {
        None
    }

    /// SQL migrations contributed by this module
    fn migrations(&self) -> Vec<Migration> {
        vec![]
    }

    /// Called once migrations are complete
    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called during shutdown
    async fn stop(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

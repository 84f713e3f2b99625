use anyhow::Context;
use shelf_app::App;
use shelf_kernel::settings::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().with_context(|| "failed to load Shelf settings")?;
    shelf_telemetry::init(&settings.telemetry)?;

    tracing::info!(
        env = ?settings.environment,
        db = %settings.database.url,
        "shelf-app bootstrap starting"
    );

    let app = App::build(settings).await?;
    app.serve().await?;

    tracing::info!("shelf-app shut down cleanly");
    Ok(())
}

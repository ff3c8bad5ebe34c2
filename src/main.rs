use std::sync::Arc;

use anyhow::Context;
use shelf_db::Database;
use shelf_kernel::{settings::Settings, InitCtx};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().with_context(|| "failed to load settings")?;
    shelf_telemetry::init(&settings.telemetry)?;

    tracing::info!(
        env = ?settings.environment,
        db = %settings.database.path.display(),
        "shelf-app bootstrap starting"
    );

    let db = Arc::new(
        Database::open(&settings.database.path).with_context(|| "failed to open database")?,
    );
    let registry = shelf_app::build_registry(&settings, Arc::clone(&db))?;

    let ctx = InitCtx {
        settings: &settings,
    };
    registry.init_modules(&ctx).await?;
    registry.start_modules(&ctx).await?;

    tracing::info!("shelf-app bootstrap complete");

    let served = shelf_http::start_server(&registry, &settings).await;
    registry.stop_modules().await?;
    served
}

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use homefix::config::AppConfig;
use homefix::routes;
use homefix::services::media::cloudinary::CloudinaryUploader;
use homefix::state::AppState;
use homefix::store::SqliteStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let store = SqliteStore::open(&config.database_url)?;

    if config.cloudinary_cloud_name.is_empty() || config.cloudinary_upload_preset.is_empty() {
        tracing::warn!("Cloudinary is not configured; image uploads will fail");
    }
    let media = CloudinaryUploader::new(
        config.cloudinary_cloud_name.clone(),
        config.cloudinary_upload_preset.clone(),
    );

    tracing::info!(
        policy = ?config.transition_policy,
        device_gate = config.device_gate,
        "booking transitions and device gate configured"
    );

    let state = Arc::new(AppState::new(config.clone(), Arc::new(store), Box::new(media)));
    let app = routes::router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

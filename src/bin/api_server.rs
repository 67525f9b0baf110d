use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use seed_sweep::api::{create_router, AppState};
use seed_sweep::MissionConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match std::env::var("SEED_SWEEP_CONFIG") {
        Ok(path) => MissionConfig::load(&path).with_context(|| format!("Failed to load config {}", path))?,
        Err(_) => MissionConfig::default(),
    };
    let bind = std::env::var("SEED_SWEEP_BIND").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

    let app = create_router(Arc::new(AppState::new(config)));

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;

    info!(%bind, "seed-sweep API server listening");
    println!("Endpoints:");
    println!("  GET  /api/plan?width=<cells>&height=<cells>&latitude=<lat>&longitude=<lon>[&step_size_m=<m>]");
    println!("  POST /api/missions (json: width, height, simulate, address)");
    println!("  GET  /api/missions/<id>");
    println!("  POST /api/missions/<id>/abort");
    println!();

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}

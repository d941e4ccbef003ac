// src/main.rs
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ha_cluster_exporter::{Config, exposition};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse();

    // RUST_LOG wins over --log.level
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.log_level))?,
        )
        .init();

    let collectors = config.collectors();
    if collectors.is_empty() {
        return Err("no collector could be initialized".into());
    }

    let app = exposition::router(&config.telemetry_path, collectors);
    let listener = TcpListener::bind(&config.listen_address).await?;

    info!(
        address = %config.listen_address,
        path = %config.telemetry_path,
        "serving metrics"
    );
    axum::serve(listener, app).await?;

    Ok(())
}

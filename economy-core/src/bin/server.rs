//! Standalone economy service binary

use anyhow::Context;
use economy_core::{AlwaysActive, Config, Economy, RocksStore};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting economy server");

    // Load configuration
    let config = match std::env::var("ECONOMY_CONFIG") {
        Ok(path) => Config::from_file(&path)
            .with_context(|| format!("Failed to load config from {}", path))?,
        Err(_) => Config::from_env().context("Invalid environment configuration")?,
    };

    let store = Arc::new(RocksStore::open(&config).context("Failed to open economy store")?);
    let economy = Economy::open(config, store, Arc::new(AlwaysActive)).await?;
    tracing::info!("Economy opened successfully");

    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down economy server");
    economy.shutdown().await?;
    Ok(())
}

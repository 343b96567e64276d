//! rangerd entry point.
//!
//! Boots the proxy over the configured store, runs install and activation,
//! then serves until interrupted. Logging goes to stderr so stdout stays
//! free for tooling.

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use ranger_core::AppConfig;
use ranger_proxy::Proxy;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = AppConfig::load()?;
    tracing::info!(version = %config.version, db_path = %config.db_path.display(), "starting rangerd");

    let proxy = Proxy::new(config).await?;
    proxy.start().await?;
    tracing::info!("proxy active");

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    proxy.shutdown().await;

    Ok(())
}

//! pwa-cache-agent entry point.
//!
//! Boots the caching agent behind the line-delimited JSON protocol on stdio.
//! Logging goes to stderr so it never interleaves with protocol replies.

use std::sync::Arc;

use anyhow::Result;
use pwa_cache_agent::{CacheAgent, WorkerHost, protocol};
use pwa_cache_client::{FetchClient, FetchConfig, Network};
use pwa_cache_core::config::AppConfig;
use pwa_cache_core::{CacheDb, CacheStorage};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!(cache = %config.cache_name, origin = %config.origin, "Starting pwa-cache agent on stdio");

    let storage: Arc<dyn CacheStorage> = Arc::new(CacheDb::open(&config.db_path).await?);
    let network: Arc<dyn Network> = Arc::new(FetchClient::new(FetchConfig::from_app(&config)?)?);

    let agent = Arc::new(CacheAgent::from_config(&config, storage, Arc::clone(&network))?);
    let host = Arc::new(WorkerHost::for_agent(&agent, network));

    if config.auto_install
        && let Err(e) = host.install().await
    {
        tracing::warn!(error = %e, "install on startup failed");
    }

    protocol::serve(host, tokio::io::stdin(), tokio::io::stdout()).await?;

    Ok(())
}

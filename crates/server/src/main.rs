//! external-brain server entry point.
//!
//! Boots the offline cache controller, registers a worker for the configured
//! cache version, and serves the MCP tools on stdio transport.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use ebrain_core::{AppConfig, CacheDb};
use ebrain_worker::{Controller, HttpConfig, HttpNetwork, Network, Registration, WorkerSettings};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;

mod handler;
mod state;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!(
        version = %config.cache_version,
        origin = %config.origin,
        db_path = %config.db_path.display(),
        "Starting external-brain server on stdio transport"
    );

    let cache = CacheDb::open(&config.db_path).await?;
    let network: Arc<dyn Network> = Arc::new(HttpNetwork::new(HttpConfig::from(&config))?);
    let settings = WorkerSettings::from_config(&config)?;

    let registration = Registration::new(network.clone());
    if let Err(err) = registration
        .register(Controller::new(settings.clone(), cache.clone(), network))
        .await
    {
        tracing::warn!(error = %err, "no worker installed; requests pass through to the network");
    }

    let handler = handler::BrainServer::new(state::BrainState::new(registration, cache, settings));
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}

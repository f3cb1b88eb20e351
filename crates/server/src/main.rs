//! sig-offline entry point.
//!
//! Loads configuration, opens the cache database, installs the engine and
//! serves it over MCP on stdio. Logging goes to stderr to avoid interfering
//! with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::{Context, Result};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use sigcache_core::{AppConfig, CacheDb};
use sigcache_engine::{Engine, FetchClient, FetchConfig};
use tracing_subscriber::EnvFilter;

mod error;
mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load().context("loading configuration")?;
    tracing::info!(version = %config.version, db = %config.db_path.display(), "starting sig-offline on stdio transport");

    let db = CacheDb::open(&config.db_path).await.context("opening cache database")?;
    let fetcher = Arc::new(FetchClient::new(FetchConfig::from_app(&config))?);
    let engine = Arc::new(Engine::new(db, &config, fetcher)?);

    let report = engine.install().await?;
    tracing::info!(
        cached = report.cached.len(),
        failed = report.failed.len(),
        activated = report.activated,
        "install complete"
    );

    let handler = handler::SigOfflineServer::new(engine);
    let server = serve_server(handler, stdio()).await?;

    server.waiting().await?;

    Ok(())
}

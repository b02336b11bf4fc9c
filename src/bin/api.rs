//! Autoindex API Server
//!
//! Serves federated search and tracker endpoints without running periodic
//! indexing. Manual runs through `/api/v1/indexing/:uuid/run` still work
//! when an index writer is configured.
//!
//! Run with: cargo run --bin autoindex-api
//!
//! # Configuration
//!
//! Loaded from the default config locations, then environment:
//! - `AUTOINDEX_DATA_DIR`: Tracker data directory
//! - `AUTOINDEX_API_HOST`: Host to bind to (default: 0.0.0.0)
//! - `AUTOINDEX_API_PORT`: Port to listen on (default: 8090)
//! - `AUTOINDEX_MAX_CONCURRENCY`: Sub-requests in flight at once
//! - `RUST_LOG`: Log filter (default: from `[logging] level`)

use anyhow::Context;
use autoindex::api::serve;
use autoindex::app::{init_logging, App};
use autoindex::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load_default();
    init_logging(&config.logging);

    tracing::info!("Starting Autoindex API server v{}", env!("CARGO_PKG_VERSION"));

    let api_config = config.api.clone();
    let app = App::build(config)
        .await
        .context("Failed to initialise components")?;

    serve(app.state(), &api_config).await?;

    app.shutdown().await;
    tracing::info!("Autoindex API server stopped");

    Ok(())
}

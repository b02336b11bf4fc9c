//! Autoindex node
//!
//! Federated search API plus the background indexing scheduler.
//!
//! Run with: cargo run --bin autoindex -- --config config.toml

use anyhow::Context;
use autoindex::app::{init_logging, App};
use autoindex::config::Config;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "autoindex", version, about = "Federated search with incremental indexing")]
struct Args {
    /// Config file (default: search the standard locations)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };

    init_logging(&config.logging);
    tracing::info!("Starting Autoindex v{}", env!("CARGO_PKG_VERSION"));

    let api_config = config.api.clone();
    let mut app = App::build(config)
        .await
        .context("Failed to start autoindex")?;
    app.start_indexing();

    autoindex::api::serve(app.state(), &api_config).await?;

    tracing::info!("Stopping background work...");
    app.shutdown().await;
    tracing::info!("Autoindex stopped");

    Ok(())
}

//! Autoindex CLI
//!
//! Command-line interface for Autoindex operations:
//! - Inspect and edit timeline trackers
//! - Preview the next windows to index
//! - Check a running node
//! - Generate a config file

use anyhow::{bail, Context};
use autoindex::config::{generate_default_config, Config};
use autoindex::tracking::{TimelineTracker, TimelineTrackerService, Window};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "autoindex-cli")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Inspect and manage autoindex timeline trackers")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Tracker data directory (default: from config)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// API server URL, for `status`
    #[arg(long, default_value = "http://localhost:8090", global = true)]
    pub api_url: String,

    /// Output format (table, json)
    #[arg(short, long, default_value = "table", global = true)]
    pub format: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Timeline tracker operations
    Tracker {
        #[command(subcommand)]
        action: TrackerCommand,
    },

    /// Suggest the next windows to index
    Suggest {
        /// Auto-index uuid
        uuid: String,
        /// Window size in milliseconds (default: the auto-index's, else one day)
        #[arg(short, long)]
        size: Option<i64>,
        /// Number of windows
        #[arg(short, long, default_value = "5")]
        count: usize,
    },

    /// Show status of a running node
    Status,

    /// Config file helpers
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },
}

#[derive(Subcommand)]
pub enum TrackerCommand {
    /// List tracked entities
    List,
    /// Show bounds, windows and gaps
    Show { uuid: String },
    /// Set the bounds of known raw data
    SetBounds {
        uuid: String,
        /// Inclusive start (epoch ms or RFC 3339)
        from: String,
        /// Exclusive end (epoch ms or RFC 3339)
        to: String,
    },
    /// Record a window as indexed
    AddWindow { uuid: String, from: String, to: String },
    /// Forget every indexed window
    Clear { uuid: String },
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Write a commented default config
    Init {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Tracker { action } => {
            let trackers = open_trackers(&cli)?;
            let tracker = match action {
                TrackerCommand::List => {
                    let ids = trackers.entity_ids()?;
                    if cli.format == "json" {
                        println!("{}", serde_json::to_string_pretty(&ids)?);
                    } else if ids.is_empty() {
                        println!("No trackers yet.");
                    } else {
                        for id in ids {
                            println!("{}", id);
                        }
                    }
                    return Ok(());
                }
                TrackerCommand::Show { uuid } => trackers.get(uuid)?,
                TrackerCommand::SetBounds { uuid, from, to } => {
                    trackers.set_bounds(uuid, parse_window(from, to)?)?
                }
                TrackerCommand::AddWindow { uuid, from, to } => {
                    trackers.add_window(uuid, parse_window(from, to)?)?
                }
                TrackerCommand::Clear { uuid } => trackers.clear_windows(uuid)?,
            };
            print_tracker(&tracker, &cli.format)?;
        }

        Commands::Suggest { uuid, size, count } => {
            let config = load_config(&cli);
            let size = size
                .or_else(|| {
                    config
                        .auto_index
                        .iter()
                        .find(|a| &a.uuid == uuid)
                        .map(|a| a.index_window)
                })
                .unwrap_or(autoindex::docref::DEFAULT_INDEX_WINDOW);
            if size <= 0 {
                bail!("Window size must be positive, got {}", size);
            }

            let tracker = open_trackers(&cli)?.get(uuid)?;
            let Some(selector) = tracker.next_window_selector(size) else {
                bail!("Tracker {} has no bounds; set them with `tracker set-bounds`", uuid);
            };
            let windows: Vec<Window<i64>> = selector.suggest_next_windows(*count).collect();

            if cli.format == "json" {
                println!("{}", serde_json::to_string_pretty(&windows)?);
            } else if windows.is_empty() {
                println!("Fully indexed.");
            } else {
                for window in windows {
                    print_window(&window);
                }
            }
        }

        Commands::Status => {
            let response = reqwest::Client::new()
                .get(format!("{}/health", cli.api_url))
                .send()
                .await;

            match response {
                Ok(resp) if resp.status().is_success() => {
                    let health: serde_json::Value = resp.json().await?;
                    println!("Autoindex v{}", env!("CARGO_PKG_VERSION"));
                    println!();
                    println!("Status:        {}", health["status"].as_str().unwrap_or("unknown"));
                    println!("Trackers:      {}", health["trackers"].as_str().unwrap_or("unknown"));
                    println!("Dispatch pool: {}", health["dispatch_pool"].as_str().unwrap_or("unknown"));
                    println!("In flight:     {}", health["in_flight"].as_u64().unwrap_or(0));
                    println!("Indexing:      {}", health["indexing"].as_bool().unwrap_or(false));
                    if let Some(uptime) = health["uptime_seconds"].as_u64() {
                        println!("Uptime:        {}s", uptime);
                    }
                }
                Ok(resp) => bail!("API returned error: {}", resp.status()),
                Err(e) => {
                    eprintln!("Cannot connect to Autoindex API at {}", cli.api_url);
                    eprintln!();
                    eprintln!("Make sure the server is running:");
                    eprintln!("  cargo run --bin autoindex");
                    return Err(e.into());
                }
            }
        }

        Commands::Config { action: ConfigCommand::Init { output } } => {
            let content = generate_default_config();
            match output {
                Some(path) => {
                    std::fs::write(path, content)
                        .with_context(|| format!("Failed to write {:?}", path))?;
                    println!("Config written to {:?}", path);
                }
                None => print!("{}", content),
            }
        }
    }

    Ok(())
}

fn load_config(cli: &Cli) -> Config {
    let mut config = Config::load_default();
    if let Some(dir) = &cli.data_dir {
        config.tracker.data_dir = dir.to_string_lossy().to_string();
    }
    config
}

fn open_trackers(cli: &Cli) -> anyhow::Result<TimelineTrackerService> {
    let data_dir = load_config(cli).tracker.data_path();
    TimelineTrackerService::open(&data_dir)
        .with_context(|| format!("Failed to open tracker store in {:?}", data_dir))
}

/// Epoch milliseconds or an RFC 3339 timestamp
fn parse_time(s: &str) -> anyhow::Result<i64> {
    if let Ok(ms) = s.parse::<i64>() {
        return Ok(ms);
    }
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.timestamp_millis())
        .with_context(|| format!("Invalid time: {}", s))
}

fn parse_window(from: &str, to: &str) -> anyhow::Result<Window<i64>> {
    let (from, to) = (parse_time(from)?, parse_time(to)?);
    if from >= to {
        bail!("Window start must be before its end: [{}, {})", from, to);
    }
    Ok(Window::new(from, to))
}

fn format_time(ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| ms.to_string())
}

fn print_window(window: &Window<i64>) {
    println!(
        "  {:<15} {:<15} {} .. {}",
        window.from,
        window.to,
        format_time(window.from),
        format_time(window.to)
    );
}

fn print_tracker(tracker: &TimelineTracker, format: &str) -> anyhow::Result<()> {
    if format == "json" {
        println!("{}", serde_json::to_string_pretty(tracker)?);
        return Ok(());
    }

    println!("Tracker {}", tracker.entity_id);
    match &tracker.bounds {
        Some(bounds) => {
            println!("Bounds:");
            print_window(bounds);
        }
        None => println!("Bounds: (none)"),
    }

    println!("Indexed windows ({}):", tracker.windows.len());
    for window in &tracker.windows {
        print_window(window);
    }

    if let Ok(gaps) = tracker.invert() {
        println!("Gaps ({}):", gaps.len());
        for gap in &gaps {
            print_window(gap);
        }
    }
    Ok(())
}

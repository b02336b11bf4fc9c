//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use crate::docref::AutoIndexDocRef;
use crate::indexing::IndexingOptions;
use crate::search::{ClusterOptions, RoutingStrategy};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub tracker: TrackerConfig,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub query_clients: QueryClientsConfig,

    #[serde(default)]
    pub indexing: IndexingConfig,

    #[serde(default)]
    pub cluster: ClusterConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Auto-indexes served by this process
    #[serde(default)]
    pub auto_index: Vec<AutoIndexDocRef>,
}

/// Timeline tracker storage
#[derive(Debug, Clone, Deserialize)]
pub struct TrackerConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

fn default_data_dir() -> String {
    dirs::data_local_dir()
        .map(|p| p.join("autoindex").to_string_lossy().to_string())
        .unwrap_or_else(|| "./autoindex_data".to_string())
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

impl TrackerConfig {
    pub fn data_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir)
    }
}

/// Federated search dispatch
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    #[serde(default = "default_search_timeout")]
    pub request_timeout_ms: u64,

    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_ms: u64,
}

fn default_max_concurrency() -> usize {
    8
}

fn default_search_timeout() -> u64 {
    30_000
}

fn default_shutdown_timeout() -> u64 {
    5_000
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            request_timeout_ms: default_search_timeout(),
            shutdown_timeout_ms: default_shutdown_timeout(),
        }
    }
}

impl SearchConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

/// Remote query backends, one base URL per document type
#[derive(Debug, Clone, Deserialize)]
pub struct QueryClientsConfig {
    #[serde(default)]
    pub urls_by_type: HashMap<String, String>,

    #[serde(default = "default_search_timeout")]
    pub request_timeout_ms: u64,
}

impl Default for QueryClientsConfig {
    fn default() -> Self {
        Self {
            urls_by_type: HashMap::new(),
            request_timeout_ms: default_search_timeout(),
        }
    }
}

impl QueryClientsConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Background indexing
#[derive(Debug, Clone, Deserialize)]
pub struct IndexingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_tasks_per_run")]
    pub tasks_per_run: usize,

    #[serde(default = "default_seconds_between_checks")]
    pub seconds_between_checks: u64,

    /// Base URL of the service that writes windows into indexes
    #[serde(default)]
    pub writer_url: Option<String>,

    #[serde(default = "default_search_timeout")]
    pub writer_timeout_ms: u64,
}

fn default_true() -> bool {
    true
}

fn default_tasks_per_run() -> usize {
    4
}

fn default_seconds_between_checks() -> u64 {
    120
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            tasks_per_run: default_tasks_per_run(),
            seconds_between_checks: default_seconds_between_checks(),
            writer_url: None,
            writer_timeout_ms: default_search_timeout(),
        }
    }
}

impl IndexingConfig {
    pub fn options(&self) -> IndexingOptions {
        IndexingOptions {
            tasks_per_run: self.tasks_per_run.max(1),
            check_interval: Duration::from_secs(self.seconds_between_checks.max(1)),
        }
    }

    pub fn writer_timeout(&self) -> Duration {
        Duration::from_millis(self.writer_timeout_ms)
    }
}

/// In-process search cluster
#[derive(Debug, Clone, Deserialize)]
pub struct ClusterConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_backends_per_type")]
    pub backends_per_type: usize,

    #[serde(default)]
    pub routing: RoutingStrategy,

    /// Unset means the per sub-request timeout in `[search]`
    #[serde(default)]
    pub ask_timeout_ms: Option<u64>,
}

fn default_backends_per_type() -> usize {
    1
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            backends_per_type: default_backends_per_type(),
            routing: RoutingStrategy::default(),
            ask_timeout_ms: None,
        }
    }
}

impl ClusterConfig {
    /// Cluster settings for sub-requests allowed `call_timeout` each
    pub fn options(&self, call_timeout: Duration) -> ClusterOptions {
        ClusterOptions {
            strategy: self.routing,
            ask_timeout: self
                .ask_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(call_timeout),
            ..ClusterOptions::default()
        }
    }
}

/// API server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8090
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ApiConfig {
    /// Get the socket address string
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|error| ConfigError::Parse {
            path: path.to_path_buf(),
            error,
        })
    }

    fn parse(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("autoindex").join("config.toml")),
            Some(PathBuf::from("/etc/autoindex/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path in config_paths.iter().flatten() {
            if path.exists() {
                match Self::load_with_env(path) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(data_dir) = var("AUTOINDEX_DATA_DIR") {
            self.tracker.data_dir = data_dir;
        }

        if let Some(host) = var("AUTOINDEX_API_HOST") {
            self.api.host = host;
        }
        if let Some(port) = var("AUTOINDEX_API_PORT").and_then(|p| p.parse().ok()) {
            self.api.port = port;
        }

        if let Some(max) = var("AUTOINDEX_MAX_CONCURRENCY").and_then(|m| m.parse().ok()) {
            self.search.max_concurrency = max;
        }

        if let Some(level) = var("AUTOINDEX_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = var("AUTOINDEX_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Autoindex Configuration
#
# Environment variables override these settings:
# - AUTOINDEX_DATA_DIR
# - AUTOINDEX_API_HOST
# - AUTOINDEX_API_PORT
# - AUTOINDEX_MAX_CONCURRENCY
# - AUTOINDEX_LOG_LEVEL
# - AUTOINDEX_LOG_FORMAT

[tracker]
# Directory holding tracker.db and index_jobs.db
data_dir = "~/.local/share/autoindex"

[search]
# Sub-requests in flight at once across all searches
max_concurrency = 8

# Per sub-request timeout (ms)
request_timeout_ms = 30000

# How long shutdown waits for in-flight sub-requests (ms)
shutdown_timeout_ms = 5000

[query_clients]
# Timeout for calls to remote query services (ms)
request_timeout_ms = 30000

[query_clients.urls_by_type]
# Base URL of the query API serving each document type
# Raw = "http://raw-host:8080/queryApi/v1"
# Index = "http://index-host:8080/queryApi/v1"

[indexing]
# Copy windows from raw sources into their indexes in the background
enabled = true

# Windows indexed concurrently per check
tasks_per_run = 4

# Delay between checks (seconds)
seconds_between_checks = 120

# Service that copies a window from raw to index (POST {writer_url}/write)
# writer_url = "http://indexer:8080/autoIndex/v1"

# Timeout for write calls (ms)
writer_timeout_ms = 30000

[cluster]
# Route backend calls through in-process worker tasks
enabled = false

# Workers started per document type
backends_per_type = 1

# round_robin or type_affinity
routing = "type_affinity"

# How long the frontend waits for a worker reply (ms). Defaults to
# search.request_timeout_ms; a lower value cuts slow sub-requests short.
# ask_timeout_ms = 30000

[api]
# API server host
host = "0.0.0.0"

# API server port
port = 8090

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"

# One block per auto-index
# [[auto_index]]
# uuid = "3f1c2a9e-auto"
# name = "Events"
# time_field_name = "EventTime"
# index_window = 86400000
# raw = { type = "Raw", uuid = "raw-events" }
# index = { type = "Index", uuid = "idx-events" }
"#
    .to_string()
}

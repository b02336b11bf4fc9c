//! Process wiring
//!
//! Builds every component from a [`Config`] the same way for each binary:
//!
//! ```text
//! Config ─► TimelineTrackerService (tracker.db)
//!        ─► InMemoryDocRefStore ([[auto_index]])
//!        ─► ClientRegistry ─► HttpQueryClient per URL
//!                         └─► SearchCluster frontend, when [cluster] is enabled
//!        ─► DispatchPool ─► FederatedSearch
//!        ─► IndexingScheduler (index_jobs.db + HttpIndexWriter), when a writer is set
//! ```

use crate::api::AppState;
use crate::config::{Config, LoggingConfig};
use crate::docref::{DocRefStore, InMemoryDocRefStore};
use crate::indexing::{HttpIndexWriter, IndexJobStore, IndexingError, IndexingScheduler};
use crate::query::{ClientRegistry, HttpQueryClient, QueryApiError, QueryService};
use crate::search::{DispatchPool, FederatedSearch, SearchCluster};
use crate::tracking::{TimelineTrackerService, TrackerError};
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Failures while assembling the process
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("Tracker store: {0}")]
    Tracker(#[from] TrackerError),

    #[error("Indexing: {0}")]
    Indexing(#[from] IndexingError),

    #[error("Query client: {0}")]
    Client(#[from] QueryApiError),
}

/// Install the global tracing subscriber
///
/// `RUST_LOG` wins over the configured level.
pub fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("autoindex={},tower_http=info", config.level).into());

    let registry = tracing_subscriber::registry().with(filter);
    if config.format.eq_ignore_ascii_case("json") {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Every long-lived component of a running node
pub struct App {
    pub config: Config,
    pub trackers: Arc<TimelineTrackerService>,
    pub doc_refs: Arc<dyn DocRefStore>,
    pub search: Arc<FederatedSearch>,
    pub scheduler: Option<Arc<IndexingScheduler>>,
    cluster: Option<SearchCluster>,
    scheduler_task: Option<JoinHandle<()>>,
}

impl App {
    pub async fn build(config: Config) -> Result<Self, StartupError> {
        let data_dir = config.tracker.data_path();
        tracing::info!("Data directory: {:?}", data_dir);

        let trackers = Arc::new(TimelineTrackerService::open(&data_dir)?);

        for auto_index in &config.auto_index {
            tracing::info!(
                entity_id = %auto_index.uuid,
                raw = %auto_index.raw,
                index = %auto_index.index,
                "Auto index configured"
            );
        }
        let doc_refs: Arc<dyn DocRefStore> =
            Arc::new(InMemoryDocRefStore::new(config.auto_index.iter().cloned()));

        let (registry, cluster) = build_registry(&config).await?;

        let pool = Arc::new(DispatchPool::new(
            config.search.max_concurrency,
            config.search.request_timeout(),
        ));
        let search = Arc::new(FederatedSearch::new(
            trackers.clone(),
            doc_refs.clone(),
            Arc::new(registry),
            pool,
        ));

        let scheduler = match &config.indexing.writer_url {
            Some(url) => {
                let writer = HttpIndexWriter::new(url, config.indexing.writer_timeout())?;
                let jobs = IndexJobStore::open(&data_dir)?;
                Some(Arc::new(IndexingScheduler::new(
                    trackers.clone(),
                    doc_refs.clone(),
                    Arc::new(jobs),
                    Arc::new(writer),
                    config.indexing.options(),
                )))
            }
            None => {
                tracing::info!("No index writer configured, indexing disabled");
                None
            }
        };

        Ok(Self {
            config,
            trackers,
            doc_refs,
            search,
            scheduler,
            cluster,
            scheduler_task: None,
        })
    }

    /// Start periodic indexing if it is configured and enabled
    pub fn start_indexing(&mut self) {
        if !self.config.indexing.enabled {
            tracing::info!("Periodic indexing disabled by config");
            return;
        }
        if let Some(scheduler) = &self.scheduler {
            tracing::info!(
                tasks_per_run = scheduler.options().tasks_per_run,
                interval = ?scheduler.options().check_interval,
                "Starting indexing scheduler"
            );
            self.scheduler_task = Some(Arc::clone(scheduler).start());
        }
    }

    /// API state over this node's components
    pub fn state(&self) -> AppState {
        let state = AppState::new(self.search.clone(), self.trackers.clone(), self.doc_refs.clone());
        match &self.scheduler {
            Some(scheduler) => state.with_scheduler(scheduler.clone()),
            None => state,
        }
    }

    /// Stop indexing, drain in-flight searches, then stop the cluster
    pub async fn shutdown(self) {
        let timeout = self.config.search.shutdown_timeout();

        if let Some(scheduler) = &self.scheduler {
            scheduler.stop().await;
        }
        if let Some(task) = self.scheduler_task {
            if tokio::time::timeout(timeout, task).await.is_err() {
                tracing::warn!("Indexing scheduler did not stop within {:?}", timeout);
            }
        }

        if let Err(e) = self.search.pool().shutdown(timeout).await {
            tracing::warn!("Dispatch pool shutdown: {}", e);
        }

        if let Some(cluster) = self.cluster {
            // Abort is already logged by the cluster
            let _ = cluster.shutdown(timeout).await;
        }
    }
}

/// Remote clients per type, fronted by a cluster when enabled
async fn build_registry(
    config: &Config,
) -> Result<(ClientRegistry, Option<SearchCluster>), StartupError> {
    let urls = &config.query_clients.urls_by_type;
    let timeout = config.query_clients.request_timeout();

    if !config.cluster.enabled {
        for (doc_type, url) in urls {
            tracing::info!(doc_type = %doc_type, url = %url, "Remote query backend");
        }
        return Ok((ClientRegistry::with_urls(urls.clone(), timeout), None));
    }

    let mut services: Vec<(Arc<dyn QueryService>, usize)> = Vec::new();
    for (doc_type, url) in urls {
        let client = HttpQueryClient::new(doc_type.clone(), url.clone(), timeout)?;
        services.push((Arc::new(client), config.cluster.backends_per_type.max(1)));
    }

    let options = config.cluster.options(config.search.request_timeout());
    let ask_timeout = options.ask_timeout;
    let cluster = SearchCluster::start(services, options);
    let frontend = cluster.frontend();

    if !frontend.wait_until_ready(ask_timeout).await {
        tracing::warn!("Not every cluster backend answered the readiness ping");
    }

    let registry = urls.keys().fold(ClientRegistry::new(), |registry, doc_type| {
        registry.register(Arc::new(frontend.client(doc_type.clone())))
    });

    Ok((registry, Some(cluster)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn config(data_dir: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.tracker.data_dir = data_dir.to_string_lossy().to_string();
        config
            .query_clients
            .urls_by_type
            .insert("Raw".to_string(), "http://127.0.0.1:1/queryApi/v1".to_string());
        config
    }

    #[tokio::test]
    async fn test_build_without_writer() {
        let dir = tempdir().unwrap();
        let mut app = App::build(config(dir.path())).await.unwrap();

        assert!(app.scheduler.is_none());
        app.start_indexing();
        assert!(app.state().scheduler.is_none());
        assert!(dir.path().join("tracker.db").exists());

        app.shutdown().await;
    }

    #[tokio::test]
    async fn test_build_with_cluster_and_writer() {
        let dir = tempdir().unwrap();
        let mut config = config(dir.path());
        config.cluster.enabled = true;
        config.cluster.backends_per_type = 2;
        config.indexing.writer_url = Some("http://127.0.0.1:1/write".to_string());
        config.indexing.seconds_between_checks = 3600;

        let mut app = App::build(config).await.unwrap();
        assert!(app.cluster.is_some());
        assert!(app.state().scheduler.is_some());

        app.start_indexing();
        assert!(app.scheduler_task.is_some());

        app.shutdown().await;
    }
}

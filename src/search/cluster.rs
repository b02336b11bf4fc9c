//! Clustered search
//!
//! A frontend routes search jobs to a pool of backend workers. Each job
//! carries its own reply channel, so the worker answers the caller
//! directly and the frontend never sits on the response path.
//!
//! ```text
//!   caller ──job+reply──► SearchFrontend ──route──► backend worker
//!      ▲                                                  │
//!      └──────────────── reply (oneshot) ─────────────────┘
//! ```
//!
//! A worker only runs jobs for its own document type; anything else is
//! answered with a failure. The cluster is started and shut down
//! explicitly, and shutdown waits a bounded time for running jobs.

use crate::query::{
    DataSource, DocRef, QueryApiError, QueryApiResult, QueryService, SearchRequest,
    SearchResponse, ServiceUser,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{JoinHandle, JoinSet};

/// Reply to a job, `Err` holds the failure reason
pub type JobReply<T> = Result<T, String>;

/// Messages a backend worker accepts
pub enum BackendMessage {
    DataSource {
        user: ServiceUser,
        doc_type: String,
        doc_ref: DocRef,
        reply: oneshot::Sender<JobReply<Option<DataSource>>>,
    },
    Search {
        user: ServiceUser,
        doc_type: String,
        request: SearchRequest,
        reply: oneshot::Sender<JobReply<Option<SearchResponse>>>,
    },
    Ping {
        reply: oneshot::Sender<BackendInfo>,
    },
}

/// What a backend reports when pinged
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendInfo {
    pub id: usize,
    pub doc_type: String,
}

/// How the frontend picks a backend for a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingStrategy {
    /// One cursor shared by the whole pool, skipping backends of other types
    RoundRobin,
    /// One cursor per document type over that type's backends
    #[default]
    TypeAffinity,
}

/// Frontend's view of one backend
#[derive(Clone)]
struct BackendRoute {
    info: BackendInfo,
    mailbox: mpsc::Sender<BackendMessage>,
}

// ==================== Backend ====================

/// Worker loop: one task per job so a slow search does not block the mailbox
async fn run_backend(
    info: BackendInfo,
    service: Arc<dyn QueryService>,
    mut mailbox: mpsc::Receiver<BackendMessage>,
    mut shutdown: watch::Receiver<bool>,
) {
    tracing::info!(backend = info.id, doc_type = %info.doc_type, "Search backend started");
    let mut jobs = JoinSet::new();

    loop {
        let message = tokio::select! {
            message = mailbox.recv() => message,
            _ = shutdown.changed() => None,
        };
        let Some(message) = message else { break };

        match message {
            BackendMessage::Ping { reply } => {
                let _ = reply.send(info.clone());
            }
            BackendMessage::DataSource {
                user,
                doc_type,
                doc_ref,
                reply,
            } => {
                if doc_type != info.doc_type {
                    let _ = reply.send(Err(wrong_type(&info, &doc_type)));
                    continue;
                }
                let service = Arc::clone(&service);
                jobs.spawn(async move {
                    let result = service
                        .data_source(&user, &doc_ref)
                        .await
                        .map_err(|e| e.to_string());
                    let _ = reply.send(result);
                });
            }
            BackendMessage::Search {
                user,
                doc_type,
                request,
                reply,
            } => {
                if doc_type != info.doc_type {
                    tracing::warn!(backend = info.id, job_type = %doc_type, "Rejecting job for another type");
                    let _ = reply.send(Err(wrong_type(&info, &doc_type)));
                    continue;
                }
                let service = Arc::clone(&service);
                let backend = info.id;
                jobs.spawn(async move {
                    tracing::debug!(backend, key = %request.key, "Running search job");
                    let result = service.search(&user, &request).await.map_err(|e| e.to_string());
                    let _ = reply.send(result);
                });
            }
        }

        // Reap finished jobs
        while jobs.try_join_next().is_some() {}
    }

    // Jobs already accepted still reply
    while jobs.join_next().await.is_some() {}
    tracing::info!(backend = info.id, doc_type = %info.doc_type, "Search backend stopped");
}

fn wrong_type(info: &BackendInfo, doc_type: &str) -> String {
    format!(
        "Backend {} serves {} and cannot handle {}",
        info.id, info.doc_type, doc_type
    )
}

// ==================== Frontend ====================

/// Routes jobs to backend workers
pub struct SearchFrontend {
    backends: Vec<BackendRoute>,
    strategy: RoutingStrategy,
    next: AtomicUsize,
    next_by_type: HashMap<String, AtomicUsize>,
    ask_timeout: Duration,
}

impl SearchFrontend {
    fn route(&self, doc_type: &str) -> QueryApiResult<&BackendRoute> {
        let serves = |backend: &&BackendRoute| backend.info.doc_type == doc_type;

        match self.strategy {
            RoutingStrategy::RoundRobin => {
                let len = self.backends.len();
                let start = self.next.fetch_add(1, Ordering::Relaxed);
                (0..len)
                    .map(|i| &self.backends[(start + i) % len])
                    .find(serves)
                    .ok_or(QueryApiError::Unavailable)
            }
            RoutingStrategy::TypeAffinity => {
                let cursor = self
                    .next_by_type
                    .get(doc_type)
                    .ok_or(QueryApiError::Unavailable)?;
                let candidates: Vec<&BackendRoute> = self.backends.iter().filter(serves).collect();
                if candidates.is_empty() {
                    return Err(QueryApiError::Unavailable);
                }
                let n = cursor.fetch_add(1, Ordering::Relaxed);
                Ok(candidates[n % candidates.len()])
            }
        }
    }

    /// Send a job built around `reply` and wait for the worker's answer
    async fn ask<T>(
        &self,
        doc_type: &str,
        build: impl FnOnce(oneshot::Sender<JobReply<T>>) -> BackendMessage,
    ) -> QueryApiResult<T> {
        let backend = self.route(doc_type)?;
        let (reply, answer) = oneshot::channel();

        backend
            .mailbox
            .send(build(reply))
            .await
            .map_err(|_| QueryApiError::Unavailable)?;

        match tokio::time::timeout(self.ask_timeout, answer).await {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(reason))) => Err(QueryApiError::Execution(reason)),
            // Worker dropped the reply without answering
            Ok(Err(_)) => Err(QueryApiError::Unavailable),
            Err(_) => Err(QueryApiError::Timeout),
        }
    }

    pub async fn search(
        &self,
        user: &ServiceUser,
        doc_type: &str,
        request: &SearchRequest,
    ) -> QueryApiResult<Option<SearchResponse>> {
        self.ask(doc_type, |reply| BackendMessage::Search {
            user: user.clone(),
            doc_type: doc_type.to_string(),
            request: request.clone(),
            reply,
        })
        .await
    }

    pub async fn data_source(
        &self,
        user: &ServiceUser,
        doc_type: &str,
        doc_ref: &DocRef,
    ) -> QueryApiResult<Option<DataSource>> {
        self.ask(doc_type, |reply| BackendMessage::DataSource {
            user: user.clone(),
            doc_type: doc_type.to_string(),
            doc_ref: doc_ref.clone(),
            reply,
        })
        .await
    }

    /// Ping every backend, returning those that answered in time
    pub async fn ping_all(&self, timeout: Duration) -> Vec<BackendInfo> {
        let mut pings = JoinSet::new();
        for backend in &self.backends {
            let mailbox = backend.mailbox.clone();
            pings.spawn(async move {
                let (reply, answer) = oneshot::channel();
                mailbox.send(BackendMessage::Ping { reply }).await.ok()?;
                tokio::time::timeout(timeout, answer).await.ok()?.ok()
            });
        }

        let mut ready = Vec::new();
        while let Some(joined) = pings.join_next().await {
            if let Ok(Some(info)) = joined {
                ready.push(info);
            }
        }
        ready.sort_by_key(|info| info.id);
        ready
    }

    /// Whether every backend answers a ping within `timeout`
    pub async fn wait_until_ready(&self, timeout: Duration) -> bool {
        let ready = self.ping_all(timeout).await.len();
        if ready < self.backends.len() {
            tracing::warn!(ready, total = self.backends.len(), "Not all search backends are ready");
            false
        } else {
            true
        }
    }

    /// A [`QueryService`] that sends `doc_type` jobs through this frontend
    pub fn client(self: &Arc<Self>, doc_type: impl Into<String>) -> FrontendClient {
        FrontendClient {
            frontend: Arc::clone(self),
            doc_type: doc_type.into(),
        }
    }
}

/// Per-type handle onto a frontend
pub struct FrontendClient {
    frontend: Arc<SearchFrontend>,
    doc_type: String,
}

#[async_trait]
impl QueryService for FrontendClient {
    fn doc_type(&self) -> &str {
        &self.doc_type
    }

    async fn data_source(
        &self,
        user: &ServiceUser,
        doc_ref: &DocRef,
    ) -> QueryApiResult<Option<DataSource>> {
        self.frontend.data_source(user, &self.doc_type, doc_ref).await
    }

    async fn search(
        &self,
        user: &ServiceUser,
        request: &SearchRequest,
    ) -> QueryApiResult<Option<SearchResponse>> {
        self.frontend.search(user, &self.doc_type, request).await
    }
}

// ==================== Cluster ====================

/// Running frontend plus its backend workers
pub struct SearchCluster {
    frontend: Arc<SearchFrontend>,
    workers: Vec<JoinHandle<()>>,
    shutdown: watch::Sender<bool>,
}

/// Settings for starting a cluster
#[derive(Debug, Clone)]
pub struct ClusterOptions {
    pub strategy: RoutingStrategy,
    pub ask_timeout: Duration,
    pub mailbox_capacity: usize,
}

impl Default for ClusterOptions {
    fn default() -> Self {
        Self {
            strategy: RoutingStrategy::default(),
            ask_timeout: Duration::from_secs(5),
            mailbox_capacity: 64,
        }
    }
}

impl SearchCluster {
    /// Spawn `count` workers per service and a frontend over all of them
    pub fn start(services: Vec<(Arc<dyn QueryService>, usize)>, options: ClusterOptions) -> Self {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let mut backends = Vec::new();
        let mut workers = Vec::new();

        for (service, count) in services {
            for _ in 0..count {
                let info = BackendInfo {
                    id: backends.len(),
                    doc_type: service.doc_type().to_string(),
                };
                let (mailbox, inbox) = mpsc::channel(options.mailbox_capacity.max(1));

                workers.push(tokio::spawn(run_backend(
                    info.clone(),
                    Arc::clone(&service),
                    inbox,
                    shutdown_rx.clone(),
                )));
                backends.push(BackendRoute { info, mailbox });
            }
        }

        tracing::info!(
            backends = backends.len(),
            strategy = ?options.strategy,
            "Search cluster started"
        );

        let next_by_type = backends
            .iter()
            .map(|b| (b.info.doc_type.clone(), AtomicUsize::new(0)))
            .collect();

        Self {
            frontend: Arc::new(SearchFrontend {
                backends,
                strategy: options.strategy,
                next: AtomicUsize::new(0),
                next_by_type,
                ask_timeout: options.ask_timeout,
            }),
            workers,
            shutdown,
        }
    }

    pub fn frontend(&self) -> Arc<SearchFrontend> {
        Arc::clone(&self.frontend)
    }

    /// Stop every worker, aborting any still running after `timeout`
    pub async fn shutdown(self, timeout: Duration) -> Result<(), Duration> {
        let _ = self.shutdown.send(true);

        let mut workers = self.workers;
        let drained = tokio::time::timeout(timeout, async {
            for worker in workers.iter_mut() {
                let _ = worker.await;
            }
        })
        .await;

        match drained {
            Ok(()) => {
                tracing::info!("Search cluster stopped");
                Ok(())
            }
            Err(_) => {
                for worker in &workers {
                    worker.abort();
                }
                tracing::warn!(?timeout, "Search cluster shutdown timed out, workers aborted");
                Err(timeout)
            }
        }
    }
}

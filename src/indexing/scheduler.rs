//! Indexing Scheduler
//!
//! Runs indexing jobs on a fixed interval. Each check creates at most one
//! job per auto-index, then starts the oldest unstarted jobs up to
//! `tasks_per_run`, all concurrently.

use super::job::{IndexJob, IndexJobStore};
use super::{IndexWriter, IndexingError, IndexingResult};
use crate::docref::{AutoIndexDocRef, DocRefStore};
use crate::tracking::{TimelineTracker, TimelineTrackerService, Window};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinSet;

/// How often and how much the scheduler indexes
#[derive(Debug, Clone)]
pub struct IndexingOptions {
    pub tasks_per_run: usize,
    pub check_interval: Duration,
}

impl Default for IndexingOptions {
    fn default() -> Self {
        Self {
            tasks_per_run: 4,
            check_interval: Duration::from_secs(120),
        }
    }
}

/// Result of asking an auto-index for more indexing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IndexOutcome {
    /// The window was written and recorded
    Indexed { window: Window<i64> },
    /// Every window inside the bounds is already indexed
    FullyIndexed,
    /// The tracker has no bounds, so nothing can be suggested
    NoBounds,
    /// Another run holds the current job
    InProgress { window: Window<i64> },
}

/// Periodic driver of index writes
pub struct IndexingScheduler {
    trackers: Arc<TimelineTrackerService>,
    doc_refs: Arc<dyn DocRefStore>,
    jobs: Arc<IndexJobStore>,
    writer: Arc<dyn IndexWriter>,
    options: IndexingOptions,
    running: AtomicBool,
    wake: Notify,
}

impl IndexingScheduler {
    pub fn new(
        trackers: Arc<TimelineTrackerService>,
        doc_refs: Arc<dyn DocRefStore>,
        jobs: Arc<IndexJobStore>,
        writer: Arc<dyn IndexWriter>,
        options: IndexingOptions,
    ) -> Self {
        Self {
            trackers,
            doc_refs,
            jobs,
            writer,
            options,
            running: AtomicBool::new(false),
            wake: Notify::new(),
        }
    }

    pub fn jobs(&self) -> &IndexJobStore {
        &self.jobs
    }

    pub fn options(&self) -> &IndexingOptions {
        &self.options
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Index the next window of one auto-index right away
    pub async fn select_and_index_next_window(&self, uuid: &str) -> IndexingResult<IndexOutcome> {
        let auto_index = self
            .doc_refs
            .get(uuid)
            .await
            .ok_or_else(|| IndexingError::UnknownAutoIndex(uuid.to_string()))?;

        let tracker = self.trackers.get(uuid)?;
        if tracker.bounds.is_none() {
            return Ok(IndexOutcome::NoBounds);
        }

        let Some(job) = self.next_job(&auto_index, &tracker)? else {
            return Ok(IndexOutcome::FullyIndexed);
        };

        if !self.jobs.mark_started(uuid)? {
            return Ok(IndexOutcome::InProgress { window: job.window });
        }

        self.run_job(&auto_index, job).await
    }

    /// Outstanding job, or a new one for the next suggested window
    fn next_job(
        &self,
        auto_index: &AutoIndexDocRef,
        tracker: &TimelineTracker,
    ) -> IndexingResult<Option<IndexJob>> {
        self.jobs.get_or_create(&auto_index.uuid, || {
            tracker
                .next_window_selector(auto_index.index_window)
                .and_then(|selector| selector.suggest_next_window())
        })
    }

    /// Write a claimed job and record its window
    async fn run_job(
        &self,
        auto_index: &AutoIndexDocRef,
        job: IndexJob,
    ) -> IndexingResult<IndexOutcome> {
        let window = job.window;
        tracing::info!(entity_id = %auto_index.uuid, window = %window, "Indexing window");

        let recorded = match self.writer.write(auto_index, window).await {
            Ok(()) => self
                .trackers
                .add_window(&auto_index.uuid, window)
                .map_err(IndexingError::from),
            Err(e) => Err(e),
        };

        if let Err(e) = recorded {
            tracing::warn!(
                entity_id = %auto_index.uuid,
                window = %window,
                error = %e,
                "Indexing failed, job released for retry"
            );
            self.jobs.reset(&auto_index.uuid)?;
            return Err(e);
        }

        self.jobs.mark_complete(&auto_index.uuid)?;
        Ok(IndexOutcome::Indexed { window })
    }

    /// One scheduling pass, returning the number of windows indexed
    pub async fn run_once(self: &Arc<Self>) -> usize {
        let mut pending = Vec::new();

        for auto_index in self.doc_refs.all().await {
            let job = self
                .trackers
                .get(&auto_index.uuid)
                .map_err(IndexingError::from)
                .and_then(|tracker| self.next_job(&auto_index, &tracker));

            match job {
                Ok(Some(job)) if !job.started => pending.push((auto_index, job)),
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(entity_id = %auto_index.uuid, error = %e, "Could not select next window");
                }
            }
        }

        pending.sort_by_key(|(_, job)| job.created_at);

        let mut tasks = JoinSet::new();
        for (auto_index, job) in pending.into_iter().take(self.options.tasks_per_run) {
            match self.jobs.mark_started(&auto_index.uuid) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    tracing::warn!(entity_id = %auto_index.uuid, error = %e, "Could not claim job");
                    continue;
                }
            }

            let scheduler = Arc::clone(self);
            tasks.spawn(async move {
                let result = scheduler.run_job(&auto_index, job).await;
                (auto_index.uuid, result)
            });
        }

        let mut indexed = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(_))) => indexed += 1,
                Ok((uuid, Err(e))) => {
                    tracing::error!(entity_id = %uuid, error = %e, "Indexing task failed");
                }
                Err(e) => {
                    tracing::error!(error = %e, "Indexing task panicked");
                }
            }
        }

        if indexed > 0 {
            tracing::info!(windows = indexed, "Indexing pass complete");
        }
        indexed
    }

    /// Start the scheduler background task
    ///
    /// Jobs left claimed by a previous process are released first.
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        let scheduler = self.clone();
        scheduler.running.store(true, Ordering::SeqCst);

        tokio::spawn(async move {
            match scheduler.jobs.reset_all() {
                Ok(0) => {}
                Ok(n) => tracing::info!(jobs = n, "Released stale index jobs"),
                Err(e) => tracing::warn!(error = %e, "Could not release stale index jobs"),
            }

            let mut interval = tokio::time::interval(scheduler.options.check_interval);

            loop {
                tokio::select! {
                    _ = interval.tick() => {}
                    _ = scheduler.wake.notified() => {}
                }

                if !scheduler.is_running() {
                    break;
                }

                scheduler.run_once().await;
            }

            tracing::info!("Indexing scheduler stopped");
        })
    }

    /// Stop the scheduler after the current pass
    pub async fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.wake.notify_one();
    }
}

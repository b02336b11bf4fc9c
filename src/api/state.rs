//! Application State
//!
//! Shared state accessible by all API handlers.
//! Wrapped in Arc for thread-safe sharing across async tasks.

use crate::docref::DocRefStore;
use crate::indexing::IndexingScheduler;
use crate::search::FederatedSearch;
use crate::tracking::TimelineTrackerService;
use std::sync::Arc;
use std::time::Instant;

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    /// Federated search over auto-indexes
    pub search: Arc<FederatedSearch>,
    /// Timeline trackers, one per auto-index
    pub trackers: Arc<TimelineTrackerService>,
    /// Auto-index configuration
    pub doc_refs: Arc<dyn DocRefStore>,
    /// Indexing scheduler, absent when indexing is disabled
    pub scheduler: Option<Arc<IndexingScheduler>>,
    /// Server start time for uptime tracking
    pub start_time: Instant,
}

impl AppState {
    /// Create state without indexing
    pub fn new(
        search: Arc<FederatedSearch>,
        trackers: Arc<TimelineTrackerService>,
        doc_refs: Arc<dyn DocRefStore>,
    ) -> Self {
        Self {
            search,
            trackers,
            doc_refs,
            scheduler: None,
            start_time: Instant::now(),
        }
    }

    /// Builder method: expose an indexing scheduler
    pub fn with_scheduler(mut self, scheduler: Arc<IndexingScheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

//! # Autoindex
//!
//! Federated search over a slow, complete raw source and a fast index that
//! is filled in window by window.
//!
//! ## Features
//!
//! - **Timeline tracking**: which time windows of each auto-index are
//!   already indexed, persisted in SQLite
//! - **Request splitting**: covered ranges go to the index, the rest to the
//!   raw source, answers are merged into one response
//! - **Bounded dispatch**: sub-requests run on a worker pool with per-call
//!   timeouts, optionally through an in-process cluster
//! - **Incremental indexing**: a scheduler picks grid-aligned windows,
//!   newest first, and records each one once written
//!
//! ## Modules
//!
//! - [`tracking`]: windows, merging, next-window selection, tracker store
//! - [`query`]: query model, backend service trait and HTTP client
//! - [`search`]: splitter, merger, dispatch pool, federated search, cluster
//! - [`indexing`]: index jobs and the indexing scheduler
//! - [`api`]: REST API server with Axum
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use autoindex::tracking::{TimelineTrackerService, Window};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let trackers = TimelineTrackerService::open(std::path::Path::new("./autoindex_data"))?;
//!
//!     trackers.set_bounds("events", Window::new(0, 1_000))?;
//!     let tracker = trackers.add_window("events", Window::new(900, 1_000))?;
//!
//!     if let Some(selector) = tracker.next_window_selector(100) {
//!         for window in selector.suggest_next_windows(3) {
//!             println!("next: {}", window);
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod app;
pub mod config;
pub mod docref;
pub mod indexing;
pub mod query;
pub mod search;
pub mod tracking;

// Re-export top-level types for convenience
pub use tracking::{
    NextWindowSelector, TimelineTracker, TimelineTrackerService, TrackerError, TrackerResult,
    Window, WindowMerger,
};

pub use query::{
    ClientRegistry, DocRef, HttpQueryClient, QueryApiError, QueryService, SearchRequest,
    SearchResponse, ServiceUser,
};

pub use search::{FederatedSearch, SearchError, SearchResponseMerger, SearchResult};

pub use docref::{AutoIndexDocRef, DocRefStore, InMemoryDocRefStore};

pub use indexing::{IndexWriter, IndexingError, IndexingScheduler};

pub use api::{build_router, serve, ApiError, AppState};

pub use config::{Config, ConfigError};

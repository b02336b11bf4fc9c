//! Incremental indexing
//!
//! Periodically picks the next window of raw data to copy into each
//! auto-index, hands it to an [`IndexWriter`], and records it in the
//! timeline tracker once written.
//!
//! ```text
//! tick ─► for each auto-index ─► get or create job (next suggested window)
//!      ─► unstarted jobs, oldest first, at most tasks_per_run
//!      ─► mark started ─► IndexWriter::write ─► tracker.add_window ─► complete
//!                                  └─ failure ─► job reset for the next tick
//! ```

pub mod job;
pub mod scheduler;
pub mod writer;

pub use job::{IndexJob, IndexJobStore};
pub use scheduler::{IndexOutcome, IndexingOptions, IndexingScheduler};
pub use writer::HttpIndexWriter;

use crate::docref::AutoIndexDocRef;
use crate::tracking::{TrackerError, Window};
use async_trait::async_trait;
use thiserror::Error;

/// Errors from selecting or running indexing work
#[derive(Error, Debug)]
pub enum IndexingError {
    #[error("Unknown auto index: {0}")]
    UnknownAutoIndex(String),

    #[error("Tracker error: {0}")]
    Tracker(#[from] TrackerError),

    #[error("Job store error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Index write failed: {0}")]
    Writer(String),

    #[error("Job store lock poisoned")]
    LockPoisoned,
}

/// Result type for indexing operations
pub type IndexingResult<T> = Result<T, IndexingError>;

/// Copies one window of raw data into the index
///
/// Implemented outside this crate; the scheduler only decides what to copy.
#[async_trait]
pub trait IndexWriter: Send + Sync {
    async fn write(&self, auto_index: &AutoIndexDocRef, window: Window<i64>) -> IndexingResult<()>;
}

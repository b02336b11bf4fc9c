//! Federated search error types

use crate::query::QueryApiError;
use crate::tracking::TrackerError;
use std::time::Duration;
use thiserror::Error;

/// Errors that fail a whole federated search
#[derive(Error, Debug)]
pub enum SearchError {
    // Configuration errors, never retried
    #[error("Unknown auto index: {0}")]
    UnknownAutoIndex(String),

    #[error("No query client configured for type {0}")]
    NoClientForType(String),

    #[error("Auto index {0} has no time field configured")]
    MissingTimeField(String),

    #[error("Invalid value for time field {field}: {value}")]
    InvalidTimeTerm { field: String, value: String },

    #[error("Tracker error: {0}")]
    Tracker(#[from] TrackerError),

    /// Backend failure on a call that is not fanned out
    #[error("Backend error: {0}")]
    Backend(#[from] QueryApiError),

    /// Every sub-request failed
    #[error("Could not get response")]
    NoResponse,

    #[error("Dispatch pool is shut down")]
    PoolClosed,

    #[error("Shutdown did not finish within {0:?}")]
    ShutdownTimeout(Duration),
}

impl SearchError {
    /// Errors caused by how things are configured rather than by data
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            SearchError::UnknownAutoIndex(_)
                | SearchError::NoClientForType(_)
                | SearchError::MissingTimeField(_)
                | SearchError::InvalidTimeTerm { .. }
        )
    }
}

/// Result type for federated search operations
pub type SearchResult<T> = Result<T, SearchError>;

/// Why a single sub-request produced nothing
#[derive(Error, Debug)]
pub enum DispatchFailure {
    #[error("{0}")]
    Backend(#[from] QueryApiError),

    #[error("Could not get response")]
    Empty,

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Dispatch pool is shut down")]
    PoolClosed,
}

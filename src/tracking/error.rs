//! Timeline tracker error types

use thiserror::Error;

/// Errors from reading or writing tracked windows
#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid window [{from}, {to}): to must be greater than from")]
    InvalidWindow { from: i64, to: i64 },

    #[error("Tracker {0} has no timeline bounds")]
    NoBounds(String),

    #[error("Tracker store lock poisoned")]
    LockPoisoned,
}

/// Result type for tracker operations
pub type TrackerResult<T> = Result<T, TrackerError>;

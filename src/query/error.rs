//! Query backend error types
//!
//! Errors raised by a backend query service, local or remote.

use thiserror::Error;

/// Errors from a backend's data source or search call
#[derive(Error, Debug)]
pub enum QueryApiError {
    /// The backend ran the request and failed
    #[error("Execution error: {0}")]
    Execution(String),

    /// Transport failure talking to a remote backend
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Remote backend answered with a non-success status
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Request timeout")]
    Timeout,

    /// Remote backend could not be reached
    #[error("Backend unavailable")]
    Unavailable,
}

/// Result type for backend query operations
pub type QueryApiResult<T> = Result<T, QueryApiError>;

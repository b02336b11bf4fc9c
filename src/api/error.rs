//! API Error Types
//!
//! Defines error types for the API layer and implements conversion
//! to HTTP responses with appropriate status codes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::indexing::IndexingError;
use crate::search::SearchError;
use crate::tracking::TrackerError;

/// API error types
#[derive(Error, Debug)]
pub enum ApiError {
    /// Request validation failed
    #[error("Validation error: {0}")]
    Validation(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Federated search failed
    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    /// Tracker read or update failed
    #[error("Tracker error: {0}")]
    Tracker(#[from] TrackerError),

    /// Indexing run failed
    #[error("Indexing error: {0}")]
    Indexing(#[from] IndexingError),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),

    /// Service unavailable (component disabled or shut down)
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
    pub request_id: String,
}

/// Error details
#[derive(Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::Search(e) => match e {
                SearchError::UnknownAutoIndex(_) => (StatusCode::NOT_FOUND, "UNKNOWN_AUTO_INDEX"),
                SearchError::InvalidTimeTerm { .. } => (StatusCode::BAD_REQUEST, "QUERY_ERROR"),
                SearchError::NoClientForType(_) | SearchError::MissingTimeField(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "CONFIGURATION_ERROR")
                }
                SearchError::Tracker(_) => (StatusCode::INTERNAL_SERVER_ERROR, "TRACKER_ERROR"),
                SearchError::Backend(_) => (StatusCode::BAD_GATEWAY, "BACKEND_ERROR"),
                SearchError::NoResponse => (StatusCode::BAD_GATEWAY, "NO_RESPONSE"),
                SearchError::PoolClosed | SearchError::ShutdownTimeout(_) => {
                    (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE")
                }
            },
            ApiError::Tracker(e) => match e {
                TrackerError::InvalidWindow { .. } => (StatusCode::BAD_REQUEST, "INVALID_WINDOW"),
                TrackerError::NoBounds(_) => (StatusCode::CONFLICT, "NO_BOUNDS"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "TRACKER_ERROR"),
            },
            ApiError::Indexing(e) => match e {
                IndexingError::UnknownAutoIndex(_) => (StatusCode::NOT_FOUND, "UNKNOWN_AUTO_INDEX"),
                IndexingError::Writer(_) => (StatusCode::BAD_GATEWAY, "INDEX_WRITE_FAILED"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "INDEXING_ERROR"),
            },
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            ApiError::ServiceUnavailable(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE")
            }
            ApiError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let request_id = uuid::Uuid::new_v4().to_string();

        tracing::error!(
            request_id = %request_id,
            error_code = %code,
            error_message = %self,
            "API error occurred"
        );

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message: self.to_string(),
            },
            request_id,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type for API operations
pub type ApiResult<T> = Result<T, ApiError>;

//! Data Transfer Objects
//!
//! Request and response types for the tracker, indexing and health
//! endpoints. Query API bodies are the query model types themselves.

use serde::{Deserialize, Serialize};

use crate::indexing::IndexJob;
use crate::tracking::{TimelineTracker, Window};

// ============================================
// TRACKER DTOs
// ============================================

/// Full view of one tracker
#[derive(Debug, Serialize, Deserialize)]
pub struct TrackerResponse {
    pub entity_id: String,
    pub bounds: Option<Window<i64>>,
    /// Indexed windows, ascending
    pub windows: Vec<Window<i64>>,
    /// Unindexed windows inside the bounds, ascending
    pub gaps: Vec<Window<i64>>,
    /// Total length of indexed time
    pub indexed_span: i64,
}

impl From<TimelineTracker> for TrackerResponse {
    fn from(tracker: TimelineTracker) -> Self {
        let gaps = tracker.invert().unwrap_or_default();
        let indexed_span = tracker.indexed_span();
        Self {
            entity_id: tracker.entity_id,
            bounds: tracker.bounds,
            windows: tracker.windows,
            gaps,
            indexed_span,
        }
    }
}

/// Query parameters for next-window suggestions
#[derive(Debug, Deserialize)]
pub struct NextWindowsQuery {
    /// Number of suggestions, defaults to 1
    #[serde(default)]
    pub count: Option<usize>,
    /// Window size, defaults to the auto-index's configured size
    #[serde(default)]
    pub size: Option<i64>,
}

/// Suggested windows, newest first
#[derive(Debug, Serialize, Deserialize)]
pub struct NextWindowsResponse {
    pub entity_id: String,
    pub window_size: i64,
    pub windows: Vec<Window<i64>>,
}

// ============================================
// INDEXING DTOs
// ============================================

/// Outstanding index jobs
#[derive(Debug, Serialize)]
pub struct IndexJobListResponse {
    pub jobs: Vec<IndexJob>,
    pub total: usize,
}

// ============================================
// HEALTH DTOs
// ============================================

/// Full health status
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// "healthy", "degraded" or "unhealthy"
    pub status: String,
    pub trackers: String,
    pub dispatch_pool: String,
    pub in_flight: usize,
    pub indexing: bool,
    pub uptime_seconds: u64,
    pub version: String,
}

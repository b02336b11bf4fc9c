//! Tracker Routes
//!
//! Inspect and adjust what each auto-index has indexed.
//!
//! - GET /api/v1/trackers - List tracked entities
//! - GET /api/v1/trackers/:uuid - Bounds, windows and gaps
//! - PUT /api/v1/trackers/:uuid/bounds - Set bounds of known raw data
//! - POST /api/v1/trackers/:uuid/windows - Record a window as indexed
//! - DELETE /api/v1/trackers/:uuid/windows - Forget every indexed window
//! - GET /api/v1/trackers/:uuid/next-windows - Suggest windows to index

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::api::dto::{NextWindowsQuery, NextWindowsResponse, TrackerResponse};
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::tracking::Window;

/// Upper limit on suggestions per request
const MAX_SUGGESTIONS: usize = 1000;

/// GET /api/v1/trackers
pub async fn list_trackers(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<String>>> {
    Ok(Json(state.trackers.entity_ids()?))
}

/// GET /api/v1/trackers/:uuid
pub async fn get_tracker(
    State(state): State<Arc<AppState>>,
    Path(uuid): Path<String>,
) -> ApiResult<Json<TrackerResponse>> {
    Ok(Json(state.trackers.get(&uuid)?.into()))
}

/// PUT /api/v1/trackers/:uuid/bounds
pub async fn set_bounds(
    State(state): State<Arc<AppState>>,
    Path(uuid): Path<String>,
    Json(bounds): Json<Window<i64>>,
) -> ApiResult<Json<TrackerResponse>> {
    Ok(Json(state.trackers.set_bounds(&uuid, bounds)?.into()))
}

/// POST /api/v1/trackers/:uuid/windows
pub async fn add_window(
    State(state): State<Arc<AppState>>,
    Path(uuid): Path<String>,
    Json(window): Json<Window<i64>>,
) -> ApiResult<(StatusCode, Json<TrackerResponse>)> {
    let tracker = state.trackers.add_window(&uuid, window)?;
    Ok((StatusCode::CREATED, Json(tracker.into())))
}

/// DELETE /api/v1/trackers/:uuid/windows
pub async fn clear_windows(
    State(state): State<Arc<AppState>>,
    Path(uuid): Path<String>,
) -> ApiResult<Json<TrackerResponse>> {
    Ok(Json(state.trackers.clear_windows(&uuid)?.into()))
}

/// GET /api/v1/trackers/:uuid/next-windows?count=n&size=s
///
/// Without `size`, the auto-index's configured window size is used.
pub async fn next_windows(
    State(state): State<Arc<AppState>>,
    Path(uuid): Path<String>,
    Query(query): Query<NextWindowsQuery>,
) -> ApiResult<Json<NextWindowsResponse>> {
    let window_size = match query.size {
        Some(size) => size,
        None => state
            .doc_refs
            .get(&uuid)
            .await
            .map(|doc| doc.index_window)
            .ok_or_else(|| {
                ApiError::Validation(format!("No auto index {}, pass a window size", uuid))
            })?,
    };
    if window_size <= 0 {
        return Err(ApiError::Validation(format!(
            "Window size must be positive, got {}",
            window_size
        )));
    }

    let count = query.count.unwrap_or(1).min(MAX_SUGGESTIONS);
    let tracker = state.trackers.get(&uuid)?;

    let windows = match tracker.next_window_selector(window_size) {
        Some(selector) => selector.suggest_next_windows(count).collect(),
        None => Vec::new(),
    };

    Ok(Json(NextWindowsResponse {
        entity_id: uuid,
        window_size,
        windows,
    }))
}

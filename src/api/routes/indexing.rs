//! Indexing Routes
//!
//! - POST /api/v1/indexing/:uuid/run - Index the next window now
//! - GET /api/v1/indexing/jobs - Outstanding index jobs

use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

use crate::api::dto::IndexJobListResponse;
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::indexing::{IndexOutcome, IndexingScheduler};

fn scheduler(state: &AppState) -> ApiResult<&Arc<IndexingScheduler>> {
    state
        .scheduler
        .as_ref()
        .ok_or_else(|| ApiError::ServiceUnavailable("Indexing is disabled".to_string()))
}

/// POST /api/v1/indexing/:uuid/run
pub async fn run_indexing(
    State(state): State<Arc<AppState>>,
    Path(uuid): Path<String>,
) -> ApiResult<Json<IndexOutcome>> {
    let outcome = scheduler(&state)?.select_and_index_next_window(&uuid).await?;
    tracing::info!(entity_id = %uuid, outcome = ?outcome, "Manual indexing run");
    Ok(Json(outcome))
}

/// GET /api/v1/indexing/jobs
pub async fn list_jobs(State(state): State<Arc<AppState>>) -> ApiResult<Json<IndexJobListResponse>> {
    let jobs = scheduler(&state)?.jobs().all()?;
    Ok(Json(IndexJobListResponse {
        total: jobs.len(),
        jobs,
    }))
}

//! Health Routes
//!
//! Health check endpoints for monitoring and Kubernetes probes.
//!
//! - GET /health/live - Liveness probe (process is alive)
//! - GET /health/ready - Readiness probe (ready to serve traffic)
//! - GET /health - Full health status

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::api::dto::HealthResponse;
use crate::api::state::AppState;

/// GET /health/live
///
/// Returns 200 if the process is alive, no dependency checks.
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// GET /health/ready
///
/// Returns 200 when trackers are readable and searches can be dispatched.
pub async fn readiness(State(state): State<Arc<AppState>>) -> StatusCode {
    if check_trackers(&state) && !state.search.pool().is_closed() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// GET /health
///
/// Full health status with component details.
pub async fn full_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let trackers_ok = check_trackers(&state);
    let pool = state.search.pool();
    let pool_ok = !pool.is_closed();

    let overall_status = match (trackers_ok, pool_ok) {
        (true, true) => "healthy",
        (false, false) => "unhealthy",
        _ => "degraded",
    };

    let indexing = state
        .scheduler
        .as_ref()
        .map(|s| s.is_running())
        .unwrap_or(false);

    Json(HealthResponse {
        status: overall_status.to_string(),
        trackers: status_label(trackers_ok),
        dispatch_pool: status_label(pool_ok),
        in_flight: pool.in_flight(),
        indexing,
        uptime_seconds: state.uptime_seconds(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

fn check_trackers(state: &AppState) -> bool {
    match state.trackers.entity_ids() {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Tracker store health check failed");
            false
        }
    }
}

fn status_label(ok: bool) -> String {
    let label = if ok { "ok" } else { "error" };
    label.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_liveness() {
        let status = liveness().await;
        assert_eq!(status, StatusCode::OK);
    }
}

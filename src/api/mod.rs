//! Autoindex REST API
//!
//! HTTP API layer, built with Axum.
//!
//! # Endpoints
//!
//! ## Query API
//! - `POST /queryApi/v1/search` - Federated search over an auto-index
//! - `POST /queryApi/v1/dataSource` - Fields of an auto-index
//!
//! ## Trackers
//! - `GET /api/v1/trackers` - List tracked entities
//! - `GET /api/v1/trackers/:uuid` - Bounds, windows and gaps
//! - `PUT /api/v1/trackers/:uuid/bounds` - Set bounds
//! - `POST /api/v1/trackers/:uuid/windows` - Record an indexed window
//! - `DELETE /api/v1/trackers/:uuid/windows` - Clear indexed windows
//! - `GET /api/v1/trackers/:uuid/next-windows` - Suggest windows to index
//!
//! ## Indexing
//! - `POST /api/v1/indexing/:uuid/run` - Index the next window now
//! - `GET /api/v1/indexing/jobs` - Outstanding jobs
//!
//! ## Health
//! - `GET /health/live` - Liveness probe
//! - `GET /health/ready` - Readiness probe
//! - `GET /health` - Full health status

pub mod dto;
pub mod error;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use state::AppState;

use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::ApiConfig;

/// Build the API router with all routes and middleware
pub fn build_router(state: AppState) -> Router {
    let query_api_routes = Router::new()
        .route("/search", post(routes::query_api::search))
        .route("/dataSource", post(routes::query_api::data_source));

    let api_routes = Router::new()
        // Tracker routes
        .route("/trackers", get(routes::trackers::list_trackers))
        .route("/trackers/:uuid", get(routes::trackers::get_tracker))
        .route("/trackers/:uuid/bounds", put(routes::trackers::set_bounds))
        .route(
            "/trackers/:uuid/windows",
            post(routes::trackers::add_window).delete(routes::trackers::clear_windows),
        )
        .route("/trackers/:uuid/next-windows", get(routes::trackers::next_windows))
        // Indexing routes
        .route("/indexing/jobs", get(routes::indexing::list_jobs))
        .route("/indexing/:uuid/run", post(routes::indexing::run_indexing));

    let health_routes = Router::new()
        .route("/live", get(routes::health::liveness))
        .route("/ready", get(routes::health::readiness))
        .route("/", get(routes::health::full_health));

    let shared_state = Arc::new(state);

    Router::new()
        .nest("/queryApi/v1", query_api_routes)
        .nest("/api/v1", api_routes)
        .nest("/health", health_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(shared_state)
}

/// Start the API server, returning once a shutdown signal is handled
pub async fn serve(state: AppState, config: &ApiConfig) -> Result<(), ApiError> {
    let router = build_router(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Autoindex API listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ApiError::Internal(format!("Server error: {}", e)))?;

    tracing::info!("Autoindex API shut down gracefully");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docref::{DocRefStore, InMemoryDocRefStore};
    use crate::indexing::{IndexJobStore, IndexWriter, IndexingOptions, IndexingResult, IndexingScheduler};
    use crate::query::{
        ClientRegistry, Condition, ExpressionOperator, Query, QueryService, ResultRequest,
        SearchRequest, SearchResponse,
    };
    use crate::docref::AutoIndexDocRef;
    use crate::search::orchestrator::tests::{auto_index, StubBackend};
    use crate::search::{DispatchPool, FederatedSearch};
    use crate::tracking::{TimelineTrackerService, Window};
    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        response::Response,
    };
    use std::time::Duration;
    use tower::util::ServiceExt;

    struct NoopWriter;

    #[async_trait]
    impl IndexWriter for NoopWriter {
        async fn write(&self, _: &AutoIndexDocRef, _: Window<i64>) -> IndexingResult<()> {
            Ok(())
        }
    }

    fn create_test_app(raw: StubBackend) -> Router {
        let trackers = Arc::new(TimelineTrackerService::in_memory().unwrap());
        trackers.set_bounds("auto-1", Window::new(1000, 2000)).unwrap();
        trackers.add_window("auto-1", Window::new(1700, 2000)).unwrap();

        let doc_refs: Arc<dyn DocRefStore> =
            Arc::new(InMemoryDocRefStore::new([auto_index().index_window(100)]));
        let clients = ClientRegistry::new()
            .register(Arc::new(raw) as Arc<dyn QueryService>)
            .register(Arc::new(StubBackend::new("Index")) as Arc<dyn QueryService>);
        let search = FederatedSearch::new(
            trackers.clone(),
            doc_refs.clone(),
            Arc::new(clients),
            Arc::new(DispatchPool::new(4, Duration::from_secs(2))),
        );
        let scheduler = IndexingScheduler::new(
            trackers.clone(),
            doc_refs.clone(),
            Arc::new(IndexJobStore::in_memory().unwrap()),
            Arc::new(NoopWriter),
            IndexingOptions::default(),
        );

        build_router(
            AppState::new(Arc::new(search), trackers, doc_refs).with_scheduler(Arc::new(scheduler)),
        )
    }

    async fn send(app: Router, method: &str, uri: &str, body: Option<String>) -> Response {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(json))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        app.oneshot(request).await.unwrap()
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn search_request() -> String {
        let expression = ExpressionOperator::and()
            .term("timestamp", Condition::Between, "1000,2000");
        let request = SearchRequest::new(Query::new(auto_index().doc_ref(), expression))
            .result_request(ResultRequest::new("table-1"));
        serde_json::to_string(&request).unwrap()
    }

    #[tokio::test]
    async fn test_health_live() {
        let app = create_test_app(StubBackend::new("Raw"));
        let response = send(app, "GET", "/health/live", None).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_ready() {
        let app = create_test_app(StubBackend::new("Raw"));
        let response = send(app, "GET", "/health/ready", None).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_full() {
        let app = create_test_app(StubBackend::new("Raw"));
        let body = json_body(send(app, "GET", "/health", None).await).await;
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_search() {
        let app = create_test_app(StubBackend::new("Raw"));
        let response = send(app, "POST", "/queryApi/v1/search", Some(search_request())).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        let response: SearchResponse = serde_json::from_value(body).unwrap();
        assert_eq!(response.table("table-1").map(|t| t.rows.len()), Some(2));
    }

    #[tokio::test]
    async fn test_search_with_no_response_is_no_content() {
        let app = create_test_app(StubBackend::new("Raw").failing());

        // Only the raw window is requested, so nothing answers
        let expression = ExpressionOperator::and()
            .term("timestamp", Condition::Between, "1000,1500");
        let request = SearchRequest::new(Query::new(auto_index().doc_ref(), expression))
            .result_request(ResultRequest::new("table-1"));
        let body = serde_json::to_string(&request).unwrap();

        let response = send(app, "POST", "/queryApi/v1/search", Some(body)).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_search_unknown_auto_index() {
        let app = create_test_app(StubBackend::new("Raw"));
        let request = SearchRequest::new(Query::new(
            crate::query::DocRef::new("AutoIndex", "missing"),
            ExpressionOperator::and(),
        ));
        let body = serde_json::to_string(&request).unwrap();

        let response = send(app, "POST", "/queryApi/v1/search", Some(body)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(response).await["error"]["code"], "UNKNOWN_AUTO_INDEX");
    }

    #[tokio::test]
    async fn test_search_invalid_json() {
        let app = create_test_app(StubBackend::new("Raw"));
        let response = send(app, "POST", "/queryApi/v1/search", Some("not json".into())).await;
        assert!(response.status().is_client_error());
    }

    #[tokio::test]
    async fn test_data_source() {
        let app = create_test_app(StubBackend::new("Raw"));
        let body = serde_json::to_string(&auto_index().doc_ref()).unwrap();

        let response = send(app, "POST", "/queryApi/v1/dataSource", Some(body)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["fields"][0]["name"], "timestamp");
    }

    #[tokio::test]
    async fn test_get_tracker() {
        let app = create_test_app(StubBackend::new("Raw"));
        let body = json_body(send(app, "GET", "/api/v1/trackers/auto-1", None).await).await;

        assert_eq!(body["bounds"]["from"], 1000);
        assert_eq!(body["windows"][0]["from"], 1700);
        assert_eq!(body["gaps"][0]["to"], 1700);
        assert_eq!(body["indexed_span"], 300);
    }

    #[tokio::test]
    async fn test_add_window_and_clear() {
        let app = create_test_app(StubBackend::new("Raw"));

        let response = send(
            app.clone(),
            "POST",
            "/api/v1/trackers/auto-1/windows",
            Some(r#"{"from": 1600, "to": 1700}"#.into()),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = json_body(response).await;
        assert_eq!(body["windows"].as_array().map(Vec::len), Some(1));
        assert_eq!(body["windows"][0]["from"], 1600);

        let body = json_body(send(app, "DELETE", "/api/v1/trackers/auto-1/windows", None).await).await;
        assert_eq!(body["windows"].as_array().map(Vec::len), Some(0));
        assert_eq!(body["bounds"]["to"], 2000);
    }

    #[tokio::test]
    async fn test_invalid_window_rejected() {
        let app = create_test_app(StubBackend::new("Raw"));
        let response = send(
            app,
            "PUT",
            "/api/v1/trackers/auto-1/bounds",
            Some(r#"{"from": 50, "to": 10}"#.into()),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_next_windows() {
        let app = create_test_app(StubBackend::new("Raw"));
        let body = json_body(
            send(app.clone(), "GET", "/api/v1/trackers/auto-1/next-windows?count=3", None).await,
        )
        .await;
        assert_eq!(body["window_size"], 100);
        assert_eq!(body["windows"][0]["from"], 1600);
        assert_eq!(body["windows"][2]["from"], 1400);

        let response = send(app, "GET", "/api/v1/trackers/other/next-windows", None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_next_windows_near_domain_minimum() {
        let app = create_test_app(StubBackend::new("Raw"));
        let bounds = format!(r#"{{"from": {}, "to": 10}}"#, i64::MIN);
        let window = format!(r#"{{"from": {}, "to": -3}}"#, i64::MIN + 1);

        send(app.clone(), "PUT", "/api/v1/trackers/edge/bounds", Some(bounds)).await;
        let response = send(app.clone(), "POST", "/api/v1/trackers/edge/windows", Some(window)).await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = send(app, "GET", "/api/v1/trackers/edge/next-windows?count=10&size=3", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["windows"][0]["from"], 6);
        assert_eq!(body["windows"][4]["from"], i64::MIN);
        assert_eq!(body["windows"][4]["to"], i64::MIN + 1);
    }

    #[tokio::test]
    async fn test_run_indexing() {
        let app = create_test_app(StubBackend::new("Raw"));

        let body = json_body(send(app.clone(), "POST", "/api/v1/indexing/auto-1/run", None).await).await;
        assert_eq!(body["status"], "indexed");
        assert_eq!(body["window"]["from"], 1600);

        let body = json_body(send(app.clone(), "GET", "/api/v1/trackers/auto-1", None).await).await;
        assert_eq!(body["windows"][0]["from"], 1600);

        let response = send(app, "POST", "/api/v1/indexing/missing/run", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}

//! Federated Search
//!
//! The single `search(request)` entry point over an auto-index:
//!
//! ```text
//! request ──► splitter ──► sub-requests ──► dispatch (concurrent)
//!                │                               │
//!          tracker state             raw / index backends
//!                                                │
//! response ◄── merger ◄──── completed ◄──────────┘
//!                             failed ──► logged, dropped
//! ```
//!
//! Every backend is resolved before anything is sent, so a missing client
//! fails the search without touching any backend. Dispatched calls are
//! independent tasks reporting over a channel: if the caller stops
//! waiting, calls already sent still run to completion.

use super::error::{DispatchFailure, SearchError, SearchResult};
use super::merger::SearchResponseMerger;
use super::pool::DispatchPool;
use super::splitter::{self, SplitSearchRequest};
use crate::docref::{AutoIndexDocRef, DocRefStore, AUTO_INDEX_DOC_TYPE};
use crate::query::{
    ClientResolver, DataSource, DocRef, QueryApiError, QueryApiResult, QueryService,
    SearchRequest, SearchResponse, ServiceUser, TableResult,
};
use crate::tracking::{TimelineTrackerService, Window};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Terminal state of one dispatched sub-request
#[derive(Debug)]
pub enum DispatchOutcome {
    Completed(SearchResponse),
    Failed(DispatchFailure),
}

/// Report sent back by a dispatched sub-request
#[derive(Debug)]
pub struct Dispatch {
    pub target: DocRef,
    pub window: Window<i64>,
    pub outcome: DispatchOutcome,
}

/// Federated search over auto-indexes
pub struct FederatedSearch {
    trackers: Arc<TimelineTrackerService>,
    doc_refs: Arc<dyn DocRefStore>,
    clients: Arc<dyn ClientResolver>,
    pool: Arc<DispatchPool>,
}

impl FederatedSearch {
    pub fn new(
        trackers: Arc<TimelineTrackerService>,
        doc_refs: Arc<dyn DocRefStore>,
        clients: Arc<dyn ClientResolver>,
        pool: Arc<DispatchPool>,
    ) -> Self {
        Self {
            trackers,
            doc_refs,
            clients,
            pool,
        }
    }

    pub fn pool(&self) -> &Arc<DispatchPool> {
        &self.pool
    }

    async fn auto_index(&self, uuid: &str) -> SearchResult<AutoIndexDocRef> {
        self.doc_refs
            .get(uuid)
            .await
            .ok_or_else(|| SearchError::UnknownAutoIndex(uuid.to_string()))
    }

    fn resolve(&self, doc_type: &str) -> SearchResult<Arc<dyn QueryService>> {
        self.clients
            .resolve(doc_type)
            .ok_or_else(|| SearchError::NoClientForType(doc_type.to_string()))
    }

    /// Split `request` without dispatching it
    pub async fn plan(&self, request: &SearchRequest) -> SearchResult<SplitSearchRequest> {
        let auto_index = self.auto_index(&request.query.data_source.uuid).await?;
        let tracker = self.trackers.get(&auto_index.uuid)?;
        splitter::split(request, &auto_index, &tracker)
    }

    /// Run a federated search
    ///
    /// Succeeds with partial data when at least one sub-request answered.
    /// Fails with [`SearchError::NoResponse`] when every one of them failed.
    pub async fn search(
        &self,
        user: &ServiceUser,
        request: &SearchRequest,
    ) -> SearchResult<SearchResponse> {
        let split = self.plan(request).await?;

        if split.is_empty() {
            tracing::debug!(key = %request.key, "Query range matches nothing, returning empty response");
            return Ok(empty_response(request));
        }

        let mut resolved = Vec::new();
        for target in split.targets() {
            resolved.push(self.resolve(&target.doc_type)?);
        }

        let timeout = request.timeout_ms.map(Duration::from_millis);
        let (tx, mut rx) = mpsc::channel(split.len());
        let mut dispatched = 0usize;

        for ((target, sub_requests), client) in split.into_iter().zip(resolved) {
            for sub_request in sub_requests {
                tracing::debug!(
                    key = %sub_request.request.key,
                    target = %target,
                    window = %sub_request.window,
                    "Dispatching sub-request"
                );

                let tx = tx.clone();
                let pool = Arc::clone(&self.pool);
                let client = Arc::clone(&client);
                let user = user.clone();
                let target = target.clone();

                tokio::spawn(async move {
                    let outcome = match pool.run(timeout, client.search(&user, &sub_request.request)).await {
                        Ok(Ok(Some(response))) => DispatchOutcome::Completed(response),
                        Ok(Ok(None)) => DispatchOutcome::Failed(DispatchFailure::Empty),
                        Ok(Err(e)) => DispatchOutcome::Failed(DispatchFailure::Backend(e)),
                        Err(failure) => DispatchOutcome::Failed(failure),
                    };
                    let _ = tx
                        .send(Dispatch {
                            target,
                            window: sub_request.window,
                            outcome,
                        })
                        .await;
                });
                dispatched += 1;
            }
        }
        drop(tx);

        let mut merger = SearchResponseMerger::start().expect_components(&request.result_requests);
        let mut failed = 0usize;

        while let Some(dispatch) = rx.recv().await {
            match dispatch.outcome {
                DispatchOutcome::Completed(response) => {
                    merger.response(response);
                }
                DispatchOutcome::Failed(failure) => {
                    failed += 1;
                    tracing::warn!(
                        key = %request.key,
                        target = %dispatch.target,
                        window = %dispatch.window,
                        error = %failure,
                        "Sub-request failed"
                    );
                }
            }
        }

        let answered = merger.response_count();
        match merger.merge() {
            Some(response) => {
                tracing::info!(
                    key = %request.key,
                    dispatched,
                    answered,
                    failed,
                    rows = response.row_count(),
                    "Federated search complete"
                );
                Ok(response)
            }
            None => {
                tracing::error!(key = %request.key, dispatched, failed, "No sub-request produced a response");
                Err(SearchError::NoResponse)
            }
        }
    }

    /// Schema of an auto-index, taken from its raw source
    pub async fn data_source(
        &self,
        user: &ServiceUser,
        doc_ref: &DocRef,
    ) -> SearchResult<Option<DataSource>> {
        let auto_index = self.auto_index(&doc_ref.uuid).await?;
        let raw = self.resolve(&auto_index.raw.doc_type)?;
        Ok(raw.data_source(user, &auto_index.raw).await?)
    }
}

/// Response with an empty table per requested component
fn empty_response(request: &SearchRequest) -> SearchResponse {
    SearchResponse {
        results: request
            .result_requests
            .iter()
            .map(|r| TableResult::new(r.component_id.clone(), Vec::new()))
            .collect(),
        complete: true,
        ..Default::default()
    }
}

impl From<SearchError> for QueryApiError {
    fn from(e: SearchError) -> Self {
        match e {
            SearchError::Backend(inner) => inner,
            other => QueryApiError::Execution(other.to_string()),
        }
    }
}

/// Lets a federated search sit behind the same interface as any backend
#[async_trait]
impl QueryService for FederatedSearch {
    fn doc_type(&self) -> &str {
        AUTO_INDEX_DOC_TYPE
    }

    async fn data_source(
        &self,
        user: &ServiceUser,
        doc_ref: &DocRef,
    ) -> QueryApiResult<Option<DataSource>> {
        Ok(FederatedSearch::data_source(self, user, doc_ref).await?)
    }

    async fn search(
        &self,
        user: &ServiceUser,
        request: &SearchRequest,
    ) -> QueryApiResult<Option<SearchResponse>> {
        match FederatedSearch::search(self, user, request).await {
            Ok(response) => Ok(Some(response)),
            Err(SearchError::NoResponse) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::docref::InMemoryDocRefStore;
    use crate::query::{
        ClientRegistry, Condition, DataSourceField, ExpressionOperator, FieldType, Query,
        ResultRequest, Row,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Backend answering with one row per request naming its time term
    pub(crate) struct StubBackend {
        pub doc_type: &'static str,
        pub fail: bool,
        pub delay: Duration,
        pub calls: AtomicUsize,
        pub completed: AtomicUsize,
    }

    impl StubBackend {
        pub fn new(doc_type: &'static str) -> Self {
            Self {
                doc_type,
                fail: false,
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
                completed: AtomicUsize::new(0),
            }
        }

        pub fn failing(mut self) -> Self {
            self.fail = true;
            self
        }

        pub fn slow(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }
    }

    #[async_trait]
    impl QueryService for StubBackend {
        fn doc_type(&self) -> &str {
            self.doc_type
        }

        async fn data_source(&self, _: &ServiceUser, _: &DocRef) -> QueryApiResult<Option<DataSource>> {
            Ok(Some(DataSource {
                fields: vec![DataSourceField::new("timestamp", FieldType::Date)],
            }))
        }

        async fn search(
            &self,
            _: &ServiceUser,
            request: &SearchRequest,
        ) -> QueryApiResult<Option<SearchResponse>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.completed.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(QueryApiError::Execution(format!("{} is down", self.doc_type)));
            }

            let label = format!("{}:{}", self.doc_type, request.query.data_source.uuid);
            Ok(Some(SearchResponse {
                results: request
                    .result_requests
                    .iter()
                    .map(|r| TableResult::new(r.component_id.clone(), vec![Row::new([label.clone()])]))
                    .collect(),
                complete: true,
                ..Default::default()
            }))
        }
    }

    pub(crate) fn auto_index() -> AutoIndexDocRef {
        AutoIndexDocRef::new(
            "auto-1",
            DocRef::new("Raw", "raw-1"),
            DocRef::new("Index", "index-1"),
            "timestamp",
        )
    }

    fn federated(raw: StubBackend, index: StubBackend) -> (FederatedSearch, Arc<StubBackend>, Arc<StubBackend>) {
        let trackers = Arc::new(TimelineTrackerService::in_memory().unwrap());
        trackers.set_bounds("auto-1", Window::new(1000, 2000)).unwrap();
        trackers.add_window("auto-1", Window::new(1700, 2000)).unwrap();

        let raw = Arc::new(raw);
        let index = Arc::new(index);
        let clients = ClientRegistry::new()
            .register(raw.clone() as Arc<dyn QueryService>)
            .register(index.clone() as Arc<dyn QueryService>);

        let search = FederatedSearch::new(
            trackers,
            Arc::new(InMemoryDocRefStore::new([auto_index()])),
            Arc::new(clients),
            Arc::new(DispatchPool::new(4, Duration::from_secs(2))),
        );
        (search, raw, index)
    }

    pub(crate) fn request() -> SearchRequest {
        let expression = ExpressionOperator::and()
            .term("colour", Condition::Equals, "red")
            .term("timestamp", Condition::Between, "1000,2000");
        SearchRequest::new(Query::new(auto_index().doc_ref(), expression))
            .result_request(ResultRequest::new("table-1"))
    }

    fn labels(response: &SearchResponse) -> Vec<String> {
        let mut labels: Vec<String> = response.results[0]
            .rows
            .iter()
            .filter_map(|r| r.values[0].clone())
            .collect();
        labels.sort();
        labels
    }

    #[tokio::test]
    async fn test_search_merges_both_targets() {
        let (search, raw, index) = federated(StubBackend::new("Raw"), StubBackend::new("Index"));
        let user = ServiceUser::new("admin");

        let response = search.search(&user, &request()).await.unwrap();

        assert_eq!(labels(&response), vec!["Index:index-1", "Raw:raw-1"]);
        assert_eq!(raw.calls.load(Ordering::SeqCst), 1);
        assert_eq!(index.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_partial_failure_still_answers() {
        let (search, _, _) = federated(StubBackend::new("Raw"), StubBackend::new("Index").failing());

        let response = search
            .search(&ServiceUser::new("admin"), &request())
            .await
            .unwrap();

        assert_eq!(labels(&response), vec!["Raw:raw-1"]);
    }

    #[tokio::test]
    async fn test_all_failing_is_no_response() {
        let (search, _, _) = federated(
            StubBackend::new("Raw").failing(),
            StubBackend::new("Index").failing(),
        );

        let result = search.search(&ServiceUser::new("admin"), &request()).await;
        assert!(matches!(result, Err(SearchError::NoResponse)));
    }

    #[tokio::test]
    async fn test_slow_backend_times_out() {
        let (search, _, _) = federated(
            StubBackend::new("Raw"),
            StubBackend::new("Index").slow(Duration::from_secs(30)),
        );

        let mut request = request();
        request.timeout_ms = Some(50);
        let response = search.search(&ServiceUser::new("admin"), &request).await.unwrap();

        assert_eq!(labels(&response), vec!["Raw:raw-1"]);
    }

    #[tokio::test]
    async fn test_sub_requests_run_concurrently() {
        let (search, raw, index) = federated(
            StubBackend::new("Raw").slow(Duration::from_millis(200)),
            StubBackend::new("Index").slow(Duration::from_millis(200)),
        );

        let started = std::time::Instant::now();
        let response = search.search(&ServiceUser::new("admin"), &request()).await.unwrap();
        let elapsed = started.elapsed();

        assert_eq!(labels(&response), vec!["Index:index-1", "Raw:raw-1"]);
        assert_eq!(raw.completed.load(Ordering::SeqCst), 1);
        assert_eq!(index.completed.load(Ordering::SeqCst), 1);
        // Sequential dispatch would take at least 400ms
        assert!(elapsed < Duration::from_millis(350), "took {:?}", elapsed);
    }

    #[tokio::test]
    async fn test_dropped_caller_leaves_dispatched_work_running() {
        let (search, raw, index) = federated(
            StubBackend::new("Raw").slow(Duration::from_millis(200)),
            StubBackend::new("Index").slow(Duration::from_millis(200)),
        );
        let user = ServiceUser::new("admin");
        let request = request();

        // Stop waiting while both backends are mid-call
        let waited = tokio::time::timeout(Duration::from_millis(50), search.search(&user, &request)).await;
        assert!(waited.is_err());
        assert_eq!(raw.calls.load(Ordering::SeqCst), 1);
        assert_eq!(index.calls.load(Ordering::SeqCst), 1);
        assert_eq!(raw.completed.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(400)).await;

        assert_eq!(raw.completed.load(Ordering::SeqCst), 1);
        assert_eq!(index.completed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_client_fails_before_dispatch() {
        let trackers = Arc::new(TimelineTrackerService::in_memory().unwrap());
        trackers.add_window("auto-1", Window::new(1700, 2000)).unwrap();
        trackers.set_bounds("auto-1", Window::new(1000, 2000)).unwrap();
        let raw = Arc::new(StubBackend::new("Raw"));

        let search = FederatedSearch::new(
            trackers,
            Arc::new(InMemoryDocRefStore::new([auto_index()])),
            Arc::new(ClientRegistry::new().register(raw.clone() as Arc<dyn QueryService>)),
            Arc::new(DispatchPool::new(4, Duration::from_secs(2))),
        );

        let result = search.search(&ServiceUser::new("admin"), &request()).await;

        assert!(matches!(result, Err(SearchError::NoClientForType(ref t)) if t == "Index"));
        assert!(result.unwrap_err().is_configuration());
        assert_eq!(raw.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unknown_auto_index() {
        let (search, _, _) = federated(StubBackend::new("Raw"), StubBackend::new("Index"));
        let mut request = request();
        request.query.data_source = DocRef::new(AUTO_INDEX_DOC_TYPE, "nope");

        let result = search.search(&ServiceUser::new("admin"), &request).await;
        assert!(matches!(result, Err(SearchError::UnknownAutoIndex(_))));
    }

    #[tokio::test]
    async fn test_empty_range_returns_empty_response() {
        let (search, raw, _) = federated(StubBackend::new("Raw"), StubBackend::new("Index"));
        let expression = ExpressionOperator::and().term("timestamp", Condition::Between, "500,400");
        let request = SearchRequest::new(Query::new(auto_index().doc_ref(), expression))
            .result_request(ResultRequest::new("table-1"));

        let response = search.search(&ServiceUser::new("admin"), &request).await.unwrap();

        assert_eq!(response.results.len(), 1);
        assert_eq!(response.row_count(), 0);
        assert_eq!(raw.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_plan() {
        let (search, _, _) = federated(StubBackend::new("Raw"), StubBackend::new("Index"));
        let split = search.plan(&request()).await.unwrap();

        assert_eq!(split.len(), 2);
        assert_eq!(
            split.get(&DocRef::new("Raw", "raw-1"))[0].window,
            Window::new(1000, 1700)
        );
    }

    #[tokio::test]
    async fn test_data_source_from_raw() {
        let (search, _, _) = federated(StubBackend::new("Raw"), StubBackend::new("Index"));

        let schema = FederatedSearch::data_source(&search, &ServiceUser::new("admin"), &auto_index().doc_ref())
            .await
            .unwrap()
            .unwrap();
        assert!(schema.field("timestamp").is_some());
    }

    #[tokio::test]
    async fn test_as_query_service() {
        let (search, _, _) = federated(
            StubBackend::new("Raw").failing(),
            StubBackend::new("Index").failing(),
        );
        let service: &dyn QueryService = &search;

        assert_eq!(service.doc_type(), AUTO_INDEX_DOC_TYPE);
        let result = service.search(&ServiceUser::new("admin"), &request()).await;
        assert!(matches!(result, Ok(None)));
    }
}

//! Federated search
//!
//! Splits a search over an auto-index into raw and index sub-requests,
//! runs them concurrently on a bounded pool, and merges what comes back.
//! [`cluster`] adds a frontend/backend mode where workers answer callers
//! directly.

pub mod cluster;
pub mod error;
pub mod merger;
pub mod orchestrator;
pub mod pool;
pub mod splitter;

pub use cluster::{ClusterOptions, FrontendClient, RoutingStrategy, SearchCluster, SearchFrontend};
pub use error::{DispatchFailure, SearchError, SearchResult};
pub use merger::SearchResponseMerger;
pub use orchestrator::{Dispatch, DispatchOutcome, FederatedSearch};
pub use pool::DispatchPool;
pub use splitter::{split, SplitSearchRequest, SubRequest};

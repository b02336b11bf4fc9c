//! Backend query service
//!
//! The narrow interface every backend (raw store, index, remote process,
//! or cluster frontend) implements so the federated search can treat them
//! alike.

use super::error::QueryApiResult;
use super::model::{DataSource, DocRef, SearchRequest, SearchResponse};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Identity a request is made on behalf of
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ServiceUser {
    pub name: String,
    /// Bearer token forwarded to remote backends
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl ServiceUser {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            token: None,
        }
    }

    /// Builder method: attach a bearer token
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

/// A backend that can describe and search its documents
///
/// `Ok(None)` means the backend ran but had nothing to return.
#[async_trait]
pub trait QueryService: Send + Sync {
    /// Document type this service answers for
    fn doc_type(&self) -> &str;

    /// Schema of the referenced document
    async fn data_source(
        &self,
        user: &ServiceUser,
        doc_ref: &DocRef,
    ) -> QueryApiResult<Option<DataSource>>;

    /// Run a search
    async fn search(
        &self,
        user: &ServiceUser,
        request: &SearchRequest,
    ) -> QueryApiResult<Option<SearchResponse>>;
}

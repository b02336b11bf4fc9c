//! Remote query backend client
//!
//! Talks JSON over HTTP to a backend exposing `{base}/dataSource` and
//! `{base}/search`. A `204 No Content` or empty body means "no result".

use super::error::{QueryApiError, QueryApiResult};
use super::model::{DataSource, DocRef, SearchRequest, SearchResponse};
use super::service::{QueryService, ServiceUser};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

/// HTTP client for one remote backend
pub struct HttpQueryClient {
    client: Client,
    doc_type: String,
    base_url: String,
}

impl HttpQueryClient {
    /// Create a client for `doc_type` rooted at `base_url`
    pub fn new(
        doc_type: impl Into<String>,
        base_url: impl Into<String>,
        request_timeout: Duration,
    ) -> QueryApiResult<Self> {
        let client = Client::builder().timeout(request_timeout).build()?;

        Ok(Self {
            client,
            doc_type: doc_type.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST `body` to `{base}/{path}` and decode the answer
    async fn post<B, R>(&self, path: &str, user: &ServiceUser, body: &B) -> QueryApiResult<Option<R>>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, path);

        let mut request = self.client.post(&url).json(body);
        if let Some(token) = &user.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                QueryApiError::Timeout
            } else if e.is_connect() {
                QueryApiError::Unavailable
            } else {
                QueryApiError::Request(e)
            }
        })?;

        let status = response.status();
        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(QueryApiError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Ok(None);
        }

        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| QueryApiError::Execution(format!("Invalid response from {}: {}", url, e)))
    }
}

#[async_trait]
impl QueryService for HttpQueryClient {
    fn doc_type(&self) -> &str {
        &self.doc_type
    }

    async fn data_source(
        &self,
        user: &ServiceUser,
        doc_ref: &DocRef,
    ) -> QueryApiResult<Option<DataSource>> {
        self.post("dataSource", user, doc_ref).await
    }

    async fn search(
        &self,
        user: &ServiceUser,
        request: &SearchRequest,
    ) -> QueryApiResult<Option<SearchResponse>> {
        tracing::debug!(url = %self.base_url, key = %request.key, "Sending remote search");
        self.post("search", user, request).await
    }
}

//! Remote index writer
//!
//! Hands each selected window to an external indexing service with
//! `POST {base}/write`. Any 2xx answer counts as written.

use super::{IndexWriter, IndexingError, IndexingResult};
use crate::docref::AutoIndexDocRef;
use crate::tracking::Window;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WriteRequest<'a> {
    auto_index: &'a AutoIndexDocRef,
    window: Window<i64>,
}

/// Index writer backed by an HTTP service
pub struct HttpIndexWriter {
    client: Client,
    base_url: String,
}

impl HttpIndexWriter {
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> IndexingResult<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| IndexingError::Writer(format!("Could not build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl IndexWriter for HttpIndexWriter {
    async fn write(&self, auto_index: &AutoIndexDocRef, window: Window<i64>) -> IndexingResult<()> {
        let url = format!("{}/write", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&WriteRequest { auto_index, window })
            .send()
            .await
            .map_err(|e| IndexingError::Writer(format!("{}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(IndexingError::Writer(format!("HTTP {}: {}", status.as_u16(), message)));
        }

        tracing::debug!(entity_id = %auto_index.uuid, window = %window, "Window written");
        Ok(())
    }
}

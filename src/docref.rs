//! Auto-index documents
//!
//! An auto-index pairs a slow, complete raw source with the faster index
//! being built from it. The timeline tracker for an auto-index is keyed by
//! its `uuid`.

use crate::query::DocRef;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Document type under which auto-indexes are searched
pub const AUTO_INDEX_DOC_TYPE: &str = "AutoIndex";

/// One day in epoch milliseconds
pub const DEFAULT_INDEX_WINDOW: i64 = 24 * 60 * 60 * 1000;

fn default_index_window() -> i64 {
    DEFAULT_INDEX_WINDOW
}

/// Configuration of one auto-index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoIndexDocRef {
    pub uuid: String,
    #[serde(default)]
    pub name: String,
    /// Complete but slow source
    pub raw: DocRef,
    /// Partially populated fast copy
    pub index: DocRef,
    /// Field holding each row's event time, as epoch milliseconds
    pub time_field_name: String,
    /// Size of the windows copied per indexing job
    #[serde(default = "default_index_window")]
    pub index_window: i64,
}

impl AutoIndexDocRef {
    pub fn new(
        uuid: impl Into<String>,
        raw: DocRef,
        index: DocRef,
        time_field_name: impl Into<String>,
    ) -> Self {
        let uuid = uuid.into();
        Self {
            name: uuid.clone(),
            uuid,
            raw,
            index,
            time_field_name: time_field_name.into(),
            index_window: DEFAULT_INDEX_WINDOW,
        }
    }

    /// Builder method: set the window size
    pub fn index_window(mut self, window: i64) -> Self {
        self.index_window = window;
        self
    }

    /// Builder method: set the display name
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Reference to the auto-index itself
    pub fn doc_ref(&self) -> DocRef {
        DocRef::new(AUTO_INDEX_DOC_TYPE, &self.uuid).name(&self.name)
    }
}

/// Read-only source of auto-index configuration
#[async_trait]
pub trait DocRefStore: Send + Sync {
    async fn get(&self, uuid: &str) -> Option<AutoIndexDocRef>;

    async fn all(&self) -> Vec<AutoIndexDocRef>;
}

/// Store backed by a map, filled from configuration
#[derive(Default)]
pub struct InMemoryDocRefStore {
    docs: RwLock<HashMap<String, AutoIndexDocRef>>,
}

impl InMemoryDocRefStore {
    pub fn new(docs: impl IntoIterator<Item = AutoIndexDocRef>) -> Self {
        Self {
            docs: RwLock::new(docs.into_iter().map(|d| (d.uuid.clone(), d)).collect()),
        }
    }

    /// Add or replace a document
    pub async fn put(&self, doc: AutoIndexDocRef) {
        self.docs.write().await.insert(doc.uuid.clone(), doc);
    }
}

#[async_trait]
impl DocRefStore for InMemoryDocRefStore {
    async fn get(&self, uuid: &str) -> Option<AutoIndexDocRef> {
        self.docs.read().await.get(uuid).cloned()
    }

    async fn all(&self) -> Vec<AutoIndexDocRef> {
        let mut docs: Vec<_> = self.docs.read().await.values().cloned().collect();
        docs.sort_by(|a, b| a.uuid.cmp(&b.uuid));
        docs
    }
}

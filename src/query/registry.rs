//! Client-by-type resolver
//!
//! Maps a document type to the service that answers for it. In-process
//! services are registered directly; remote ones are configured as URLs
//! and get one cached HTTP client per type and URL.

use super::client::HttpQueryClient;
use super::service::QueryService;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// Looks up the backend for a document type
pub trait ClientResolver: Send + Sync {
    /// None means nothing is configured for `doc_type`
    fn resolve(&self, doc_type: &str) -> Option<Arc<dyn QueryService>>;
}

/// Registry of local services and remote URLs
pub struct ClientRegistry {
    local: HashMap<String, Arc<dyn QueryService>>,
    urls_by_type: HashMap<String, String>,
    request_timeout: Duration,
    remote: RwLock<HashMap<(String, String), Arc<dyn QueryService>>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self {
            local: HashMap::new(),
            urls_by_type: HashMap::new(),
            request_timeout: Duration::from_secs(30),
            remote: RwLock::new(HashMap::new()),
        }
    }

    /// Build from a type to URL map
    pub fn with_urls(urls_by_type: HashMap<String, String>, request_timeout: Duration) -> Self {
        Self {
            urls_by_type,
            request_timeout,
            ..Self::new()
        }
    }

    /// Builder method: register an in-process service under its own type
    pub fn register(mut self, service: Arc<dyn QueryService>) -> Self {
        self.local.insert(service.doc_type().to_string(), service);
        self
    }

    /// Builder method: route a type to a remote URL
    pub fn remote(mut self, doc_type: impl Into<String>, url: impl Into<String>) -> Self {
        self.urls_by_type.insert(doc_type.into(), url.into());
        self
    }

    /// Builder method: timeout for remote clients created from now on
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Every type this registry can resolve
    pub fn doc_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self
            .local
            .keys()
            .chain(self.urls_by_type.keys())
            .cloned()
            .collect();
        types.sort();
        types.dedup();
        types
    }

    fn remote_client(&self, doc_type: &str, url: &str) -> Option<Arc<dyn QueryService>> {
        let key = (doc_type.to_string(), url.to_string());
        if let Some(client) = self
            .remote
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&key)
        {
            return Some(Arc::clone(client));
        }

        let mut cache = self.remote.write().unwrap_or_else(|e| e.into_inner());
        if let Some(client) = cache.get(&key) {
            return Some(Arc::clone(client));
        }

        match HttpQueryClient::new(doc_type, url, self.request_timeout) {
            Ok(client) => {
                tracing::info!(doc_type = %doc_type, url = %url, "Created remote query client");
                let client: Arc<dyn QueryService> = Arc::new(client);
                cache.insert(key, Arc::clone(&client));
                Some(client)
            }
            Err(e) => {
                tracing::error!(doc_type = %doc_type, url = %url, error = %e, "Failed to create query client");
                None
            }
        }
    }
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientResolver for ClientRegistry {
    fn resolve(&self, doc_type: &str) -> Option<Arc<dyn QueryService>> {
        if let Some(service) = self.local.get(doc_type) {
            return Some(Arc::clone(service));
        }
        let url = self.urls_by_type.get(doc_type)?;
        self.remote_client(doc_type, url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::error::QueryApiResult;
    use crate::query::model::{DataSource, DocRef, SearchRequest, SearchResponse};
    use crate::query::service::ServiceUser;
    use async_trait::async_trait;

    struct Fixed(&'static str);

    #[async_trait]
    impl QueryService for Fixed {
        fn doc_type(&self) -> &str {
            self.0
        }

        async fn data_source(&self, _: &ServiceUser, _: &DocRef) -> QueryApiResult<Option<DataSource>> {
            Ok(None)
        }

        async fn search(&self, _: &ServiceUser, _: &SearchRequest) -> QueryApiResult<Option<SearchResponse>> {
            Ok(None)
        }
    }

    #[test]
    fn test_local_registration() {
        let registry = ClientRegistry::new().register(Arc::new(Fixed("Raw")));

        assert_eq!(registry.resolve("Raw").map(|s| s.doc_type().to_string()), Some("Raw".into()));
        assert!(registry.resolve("Index").is_none());
    }

    #[test]
    fn test_remote_clients_cached() {
        let registry = ClientRegistry::new()
            .remote("Index", "http://localhost:9999/queryApi/v1")
            .remote("Other", "http://localhost:9998/queryApi/v1");

        let a = registry.resolve("Index").unwrap();
        let b = registry.resolve("Index").unwrap();
        let c = registry.resolve("Other").unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[test]
    fn test_types_sharing_a_url_keep_their_own_type() {
        let registry = ClientRegistry::new()
            .remote("Index", "http://localhost:9999/queryApi/v1")
            .remote("IndexCopy", "http://localhost:9999/queryApi/v1");

        let index = registry.resolve("Index").unwrap();
        let copy = registry.resolve("IndexCopy").unwrap();

        assert_eq!(index.doc_type(), "Index");
        assert_eq!(copy.doc_type(), "IndexCopy");
        assert!(!Arc::ptr_eq(&index, &copy));
    }

    #[test]
    fn test_local_wins_over_remote() {
        let registry = ClientRegistry::new()
            .remote("Raw", "http://localhost:9999")
            .register(Arc::new(Fixed("Raw")));

        let resolved = registry.resolve("Raw").unwrap();
        assert_eq!(resolved.doc_type(), "Raw");
        assert_eq!(registry.doc_types(), vec!["Raw".to_string()]);
    }
}

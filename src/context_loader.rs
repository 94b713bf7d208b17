//! `@context` URL resolution over the context cache.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::cache::{CacheStore, ContextRecord, ContextSource};
use crate::config::Connectivity;
use crate::error::Error;
use crate::http::{get_json, HttpClient};
use crate::jsonld::Loader;

/// Resolves context URLs cache-first, fetching and caching when the network
/// may be used.
#[derive(Clone)]
pub struct DocumentResolver {
    cache: Arc<CacheStore>,
    http: Arc<dyn HttpClient>,
}

impl DocumentResolver {
    pub fn new(cache: Arc<CacheStore>, http: Arc<dyn HttpClient>) -> Self {
        Self { cache, http }
    }

    pub async fn resolve(&self, url: &str, connectivity: Connectivity) -> Result<Value, Error> {
        if url.starts_with("did:") {
            return Err(Error::DidContextUrl(url.to_string()));
        }
        match self.cache.contexts.get(url).await {
            Ok(Some(record)) => return Ok(record.document),
            Ok(None) => log::debug!("context {} not cached", url),
            Err(e) => log::warn!("context cache read failed for {}: {}", url, e),
        }
        if connectivity.is_offline() {
            return Err(Error::OfflineDependenciesMissing(url.to_string()));
        }
        let document = match get_json(&*self.http, url).await {
            Ok(document) => document,
            Err(e) => {
                log::debug!("fetching context {} failed: {}", url, e);
                return Err(e);
            }
        };
        self.cache
            .contexts
            .put(vec![ContextRecord::new(url, document.clone(), ContextSource::Fetched)])
            .await?;
        Ok(document)
    }

    /// Whether `url` can be resolved without the network.
    pub async fn is_cached(&self, url: &str) -> bool {
        matches!(self.cache.contexts.get(url).await, Ok(Some(_)))
    }

    /// Loader for JSON-LD processing bound to one connectivity state.
    pub fn loader(&self, connectivity: Connectivity) -> ContextLoader {
        ContextLoader {
            resolver: self.clone(),
            connectivity,
        }
    }
}

pub struct ContextLoader {
    resolver: DocumentResolver,
    connectivity: Connectivity,
}

#[async_trait]
impl Loader for ContextLoader {
    async fn load(&self, url: &str) -> Result<Value, Error> {
        self.resolver.resolve(url, self.connectivity).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::test_util::MockHttp;
    use crate::http::NoHttpClient;
    use serde_json::json;

    const URL: &str = "https://example.org/contexts/v1";

    fn context() -> Value {
        json!({ "@context": { "name": "https://schema.org/name" } })
    }

    #[async_std::test]
    async fn cache_hit_needs_no_network() {
        let cache = Arc::new(CacheStore::in_memory());
        cache
            .contexts
            .put(vec![ContextRecord::new(URL, context(), ContextSource::Prime)])
            .await
            .unwrap();
        let resolver = DocumentResolver::new(cache, Arc::new(NoHttpClient));
        assert_eq!(
            resolver.resolve(URL, Connectivity::Offline).await.unwrap(),
            context()
        );
        assert!(resolver.is_cached(URL).await);
    }

    #[async_std::test]
    async fn fetch_caches_under_exact_url() {
        let cache = Arc::new(CacheStore::in_memory());
        let http = Arc::new(MockHttp::default().with(URL, context()));
        let resolver = DocumentResolver::new(cache.clone(), http.clone());
        assert!(!resolver.is_cached(URL).await);
        resolver.resolve(URL, Connectivity::Unknown).await.unwrap();
        let record = cache.contexts.get(URL).await.unwrap().unwrap();
        assert_eq!(record.source, ContextSource::Fetched);
        assert_eq!(record.document, context());

        resolver.resolve(URL, Connectivity::Offline).await.unwrap();
        assert_eq!(http.request_count(), 1);
    }

    #[async_std::test]
    async fn offline_miss_is_typed() {
        let http = Arc::new(MockHttp::default().with(URL, context()));
        let resolver = DocumentResolver::new(Arc::new(CacheStore::in_memory()), http.clone());
        let err = resolver.resolve(URL, Connectivity::Offline).await.unwrap_err();
        assert!(err.is_offline_missing());
        assert_eq!(http.request_count(), 0);
    }

    #[async_std::test]
    async fn online_failures_propagate() {
        let resolver = DocumentResolver::new(
            Arc::new(CacheStore::in_memory()),
            Arc::new(MockHttp::default()),
        );
        match resolver.resolve(URL, Connectivity::Online).await {
            Err(Error::HttpStatus { status: 404, .. }) => {}
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            resolver.resolve("did:example:123", Connectivity::Online).await,
            Err(Error::DidContextUrl(_))
        ));
    }
}

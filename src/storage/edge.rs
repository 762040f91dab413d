//! Shared edge cache (L1 backing store).
//!
//! # Design Decisions
//! - Entries expire after the `max-age`/`s-maxage` of their `cdn-cache-control`
//!   directive; entries without one live until evicted
//! - Bounded: inserting past `max_entries` evicts expired entries first, then an
//!   arbitrary one

use async_trait::async_trait;
use dashmap::DashMap;
use std::time::{Duration, Instant};

use crate::http::directive::EdgeDirective;
use crate::http::headers::CDN_CACHE_CONTROL;
use crate::http::response::BufferedResponse;

use super::StorageError;

/// URL-keyed response cache shared by every request.
#[async_trait]
pub trait EdgeCache: Send + Sync {
    async fn lookup(&self, key: &str) -> Result<Option<BufferedResponse>, StorageError>;

    async fn store(&self, key: String, response: BufferedResponse) -> Result<(), StorageError>;
}

#[derive(Debug, Clone)]
struct EdgeEntry {
    response: BufferedResponse,
    expires_at: Option<Instant>,
}

impl EdgeEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.map(|at| at <= now).unwrap_or(false)
    }
}

#[derive(Debug)]
pub struct MemoryEdgeCache {
    entries: DashMap<String, EdgeEntry>,
    max_entries: usize,
}

impl MemoryEdgeCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            max_entries,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn make_room(&self) {
        let now = Instant::now();
        self.entries.retain(|_, entry| !entry.is_expired(now));

        if self.entries.len() >= self.max_entries {
            let victim = self.entries.iter().next().map(|e| e.key().clone());
            if let Some(key) = victim {
                self.entries.remove(&key);
                tracing::debug!(key = %key, "Evicted edge cache entry");
            }
        }
    }
}

/// Lifetime declared by a response's `cdn-cache-control` directive.
fn edge_ttl(response: &BufferedResponse) -> Option<Duration> {
    let directive = EdgeDirective::parse(response.header(&CDN_CACHE_CONTROL)?);
    directive
        .get("s-maxage")
        .or_else(|| directive.get("max-age"))
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
}

#[async_trait]
impl EdgeCache for MemoryEdgeCache {
    async fn lookup(&self, key: &str) -> Result<Option<BufferedResponse>, StorageError> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired(now) {
                return Ok(Some(entry.response.clone()));
            }
        }

        // Re-checked under the shard lock so a concurrent store survives.
        self.entries.remove_if(key, |_, entry| entry.is_expired(now));
        Ok(None)
    }

    async fn store(&self, key: String, response: BufferedResponse) -> Result<(), StorageError> {
        if self.max_entries == 0 {
            return Ok(());
        }
        if !self.entries.contains_key(&key) && self.entries.len() >= self.max_entries {
            self.make_room();
        }

        let expires_at = edge_ttl(&response).map(|ttl| Instant::now() + ttl);
        self.entries.insert(key, EdgeEntry { response, expires_at });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, HeaderValue, StatusCode};
    use std::sync::Arc;

    fn response(directive: Option<&'static str>) -> BufferedResponse {
        let mut headers = HeaderMap::new();
        if let Some(directive) = directive {
            headers.insert(CDN_CACHE_CONTROL, HeaderValue::from_static(directive));
        }
        BufferedResponse::new(StatusCode::OK, headers, "page")
    }

    #[tokio::test]
    async fn test_store_and_lookup() {
        let cache = MemoryEdgeCache::new(10);
        cache.store("http://o/a".into(), response(Some("max-age=60"))).await.unwrap();

        let hit = cache.lookup("http://o/a").await.unwrap().unwrap();
        assert_eq!(hit.body, "page");
        assert!(cache.lookup("http://o/b").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_zero_ttl_expires_immediately() {
        let cache = MemoryEdgeCache::new(10);
        cache.store("k".into(), response(Some("max-age=0"))).await.unwrap();

        assert!(cache.lookup("k").await.unwrap().is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_ttl_prefers_s_maxage() {
        assert_eq!(edge_ttl(&response(Some("max-age=60, s-maxage=5"))), Some(Duration::from_secs(5)));
        assert_eq!(edge_ttl(&response(Some("private"))), None);
        assert_eq!(edge_ttl(&response(None)), None);
    }

    #[tokio::test]
    async fn test_expired_lookup_keeps_concurrent_store() {
        let cache = Arc::new(MemoryEdgeCache::new(100));
        cache.store("k".into(), response(Some("max-age=0"))).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..20 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                if i % 2 == 0 {
                    cache.lookup("k").await.map(|_| ())
                } else {
                    cache.store("k".into(), response(Some("max-age=60"))).await
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert!(cache.lookup("k").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_bounded() {
        let cache = MemoryEdgeCache::new(2);
        for key in ["a", "b", "c"] {
            cache.store(key.into(), response(None)).await.unwrap();
        }
        assert_eq!(cache.len(), 2);
        assert!(cache.lookup("c").await.unwrap().is_some());
    }
}

//! L1: shared edge cache keyed by the normalized upstream URL.

use async_trait::async_trait;
use axum::http::{header, HeaderName, StatusCode};
use std::sync::Arc;

use crate::context::{CacheLevel, RequestContext, ResponseContext};
use crate::http::response::BufferedResponse;
use crate::observability::metrics;
use crate::storage::EdgeCache;

use super::{FetchError, Tier};

/// Requests carrying any of these are answered by L2, which owns the
/// entity tag and upload date they are evaluated against.
const DEFERRED_HEADERS: [HeaderName; 5] = [
    header::RANGE,
    header::IF_MATCH,
    header::IF_NONE_MATCH,
    header::IF_MODIFIED_SINCE,
    header::IF_UNMODIFIED_SINCE,
];

pub struct EdgeTier {
    cache: Arc<dyn EdgeCache>,
}

impl EdgeTier {
    pub fn new(cache: Arc<dyn EdgeCache>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl Tier for EdgeTier {
    fn level(&self) -> CacheLevel {
        CacheLevel::L1
    }

    async fn fetch(&self, ctx: &RequestContext) -> Result<Option<BufferedResponse>, FetchError> {
        let headers = &ctx.request.headers;
        if DEFERRED_HEADERS.iter().any(|name| headers.contains_key(name)) {
            tracing::debug!(request_id = %ctx.request_id, "Ranged or conditional request, skipping edge cache");
            return Ok(None);
        }
        Ok(self.cache.lookup(&ctx.edge_key()).await?)
    }

    fn cache(&self, ctx: &RequestContext, response: &ResponseContext) -> bool {
        // Edge entries are whole pages; a ranged slice never replaces one.
        if response.response.status == StatusCode::PARTIAL_CONTENT {
            return false;
        }

        let cache = Arc::clone(&self.cache);
        let key = ctx.edge_key();
        let response = response.response.clone();
        let request_id = ctx.request_id.clone();

        ctx.lifecycle.wait_until(async move {
            match cache.store(key, response).await {
                Ok(()) => metrics::record_cache_write("L1", true),
                Err(e) => {
                    metrics::record_cache_write("L1", false);
                    tracing::warn!(request_id = %request_id, error = %e, "Edge cache write failed");
                }
            }
        });
        true
    }
}

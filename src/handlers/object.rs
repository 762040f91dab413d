//! L2: durable object store with range and conditional-request support.

use async_trait::async_trait;
use axum::http::StatusCode;
use std::sync::Arc;

use crate::context::{CacheLevel, RequestContext, ResponseContext};
use crate::http::response::BufferedResponse;
use crate::objects;
use crate::observability::metrics;
use crate::storage::BlobStore;

use super::{FetchError, Tier};

pub struct ObjectTier {
    store: Arc<dyn BlobStore>,
}

impl ObjectTier {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tier for ObjectTier {
    fn level(&self) -> CacheLevel {
        CacheLevel::L2
    }

    async fn fetch(&self, ctx: &RequestContext) -> Result<Option<BufferedResponse>, FetchError> {
        let key = ctx.object_key();
        Ok(objects::lookup(self.store.as_ref(), &ctx.request, &key).await?)
    }

    fn cache(&self, ctx: &RequestContext, response: &ResponseContext) -> bool {
        if response.response.status == StatusCode::PARTIAL_CONTENT {
            return false;
        }

        let store = Arc::clone(&self.store);
        let key = ctx.object_key();
        let response = response.response.clone();
        let request_id = ctx.request_id.clone();

        ctx.lifecycle.wait_until(async move {
            match objects::store(store.as_ref(), &key, &response).await {
                Ok(meta) => {
                    metrics::record_cache_write("L2", true);
                    tracing::debug!(request_id = %request_id, key = %key, etag = %meta.etag, "Object stored");
                }
                Err(e) => {
                    metrics::record_cache_write("L2", false);
                    tracing::warn!(request_id = %request_id, key = %key, error = %e, "Object store write failed");
                }
            }
        });
        true
    }
}

//! L0: entry point of the chain and background refresh of CSR results.
//!
//! # Responsibilities
//! - Assemble the tier list (L0 → L1 → L2 → L3) from configured backends
//! - Run each request through the chain
//! - When the result is CSR, schedule a delayed re-run of the full chain as a
//!   crawler, hoping the origin renders server-side this time
//!
//! # Design Decisions
//! - Refreshes are background work on the request lifecycle
//! - The attempt number indexes the delay list; an exhausted list stops retrying

use async_trait::async_trait;
use futures_util::future::{BoxFuture, FutureExt};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::ProxyConfig;
use crate::context::{CacheLevel, RenderingMode, RequestContext, ResponseContext};
use crate::http::response::BufferedResponse;
use crate::observability::{metrics, AnalyticsSink, MetricsAnalytics};
use crate::storage::{BlobStore, EdgeCache, MemoryBlobStore, MemoryEdgeCache};
use crate::versions::{Counter, CounterError, LocalCounter};

use super::origin::origin_for;
use super::{ChainError, EdgeTier, FetchError, HandlerChain, ObjectTier, Origin, OriginError, OriginTier, Tier};

/// The L0 tier: never holds content, never caches.
#[derive(Debug, Default, Clone, Copy)]
pub struct Orchestrator;

#[async_trait]
impl Tier for Orchestrator {
    fn level(&self) -> CacheLevel {
        CacheLevel::L0
    }

    async fn fetch(&self, _ctx: &RequestContext) -> Result<Option<BufferedResponse>, FetchError> {
        Ok(None)
    }

    fn cache(&self, _ctx: &RequestContext, _response: &ResponseContext) -> bool {
        false
    }
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error(transparent)]
    Counter(#[from] CounterError),

    #[error(transparent)]
    Origin(#[from] OriginError),
}

/// Stores and services the tiers run against.
#[derive(Clone)]
pub struct Backends {
    pub edge_cache: Arc<dyn EdgeCache>,
    pub blob_store: Arc<dyn BlobStore>,
    pub origin: Arc<dyn Origin>,
    pub counter: Arc<dyn Counter>,
    pub analytics: Arc<dyn AnalyticsSink>,
}

impl Backends {
    /// In-memory stores, the origin client for the configured protocol and
    /// the local counter.
    pub fn from_config(config: &ProxyConfig) -> Result<Self, BackendError> {
        let counter = LocalCounter::from_path(config.counter.persistence_path.as_deref())?;
        Ok(Self {
            edge_cache: Arc::new(MemoryEdgeCache::new(config.cache.edge_max_entries)),
            blob_store: Arc::new(MemoryBlobStore::new()),
            origin: origin_for(&config.origin)?,
            counter: Arc::new(counter),
            analytics: Arc::new(MetricsAnalytics),
        })
    }
}

pub struct CacheHandler {
    chain: HandlerChain,
    retry_delays: Vec<Duration>,
    retry_user_agent: String,
}

impl CacheHandler {
    pub fn new(chain: HandlerChain, retry_delays: Vec<Duration>, retry_user_agent: impl Into<String>) -> Self {
        Self {
            chain,
            retry_delays,
            retry_user_agent: retry_user_agent.into(),
        }
    }

    /// Build the standard L0 → L3 chain over `backends`.
    pub fn assemble(config: &ProxyConfig, backends: &Backends) -> Self {
        let tiers: Vec<Arc<dyn Tier>> = vec![
            Arc::new(Orchestrator),
            Arc::new(EdgeTier::new(Arc::clone(&backends.edge_cache))),
            Arc::new(ObjectTier::new(Arc::clone(&backends.blob_store))),
            Arc::new(OriginTier::new(Arc::clone(&backends.origin))),
        ];
        let chain = HandlerChain::new(
            tiers,
            Arc::clone(&backends.counter),
            Arc::clone(&backends.analytics),
        );
        Self::new(chain, config.cache.retry_delays(), config.cache.retry_user_agent.clone())
    }

    pub fn chain(&self) -> &HandlerChain {
        &self.chain
    }

    /// Serve one pass of a request; schedules a refresh when the result is CSR.
    pub fn handle(
        self: &Arc<Self>,
        ctx: RequestContext,
    ) -> BoxFuture<'static, Result<Option<ResponseContext>, ChainError>> {
        let this = Arc::clone(self);
        async move {
            let response = this.chain.handle(&ctx).await?;

            if matches!(&response, Some(r) if r.rendering_mode == RenderingMode::Csr) {
                tracing::info!(
                    request_id = %ctx.request_id,
                    resource = %ctx.request.resource(),
                    attempt = ctx.attempt,
                    "CSR result, scheduling background refresh"
                );
                let retry = ctx.for_retry(&this.retry_user_agent);
                ctx.lifecycle.wait_until(Arc::clone(&this).refresh(retry));
            }

            Ok(response)
        }
        .boxed()
    }

    async fn refresh(self: Arc<Self>, ctx: RequestContext) {
        let Some(delay) = self.retry_delays.get(ctx.attempt).copied() else {
            tracing::debug!(
                request_id = %ctx.request_id,
                attempt = ctx.attempt,
                "Refresh attempts exhausted"
            );
            return;
        };

        tokio::time::sleep(delay).await;
        let ctx = ctx.next_attempt();
        metrics::record_refresh(ctx.attempt);
        tracing::debug!(
            request_id = %ctx.request_id,
            resource = %ctx.request.resource(),
            attempt = ctx.attempt,
            "Refreshing"
        );

        if let Err(e) = self.handle(ctx).await {
            tracing::warn!(error = %e, "Background refresh failed");
        }
    }
}

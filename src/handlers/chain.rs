//! Index-driven traversal of the tier list.

use futures_util::future::{BoxFuture, FutureExt};
use std::sync::Arc;
use std::time::Instant;

use crate::context::{RenderingMode, RequestContext, ResponseContext, ResponseContextBuilder};
use crate::observability::{AnalyticsSink, DataPoint};
use crate::versions::Counter;

use super::{ChainError, Tier};

/// Ordered tiers plus the collaborators every tier result needs.
#[derive(Clone)]
pub struct HandlerChain {
    tiers: Vec<Arc<dyn Tier>>,
    counter: Arc<dyn Counter>,
    analytics: Arc<dyn AnalyticsSink>,
}

impl HandlerChain {
    pub fn new(
        tiers: Vec<Arc<dyn Tier>>,
        counter: Arc<dyn Counter>,
        analytics: Arc<dyn AnalyticsSink>,
    ) -> Self {
        Self {
            tiers,
            counter,
            analytics,
        }
    }

    pub fn tiers(&self) -> &[Arc<dyn Tier>] {
        &self.tiers
    }

    /// Run the request through the chain from the first tier.
    pub fn handle<'a>(
        &'a self,
        ctx: &'a RequestContext,
    ) -> BoxFuture<'a, Result<Option<ResponseContext>, ChainError>> {
        self.handle_from(0, ctx)
    }

    fn handle_from<'a>(
        &'a self,
        index: usize,
        ctx: &'a RequestContext,
    ) -> BoxFuture<'a, Result<Option<ResponseContext>, ChainError>> {
        async move {
            let Some(tier) = self.tiers.get(index) else {
                return Ok(None);
            };
            let level = tier.level();

            let mut response = self.fetch(tier.as_ref(), ctx).await?;
            if let Some(found) = &response {
                tracing::debug!(
                    request_id = %ctx.request_id,
                    tier = %level,
                    attempt = ctx.attempt,
                    resource = %ctx.request.resource(),
                    status = found.status(),
                    mode = %found.rendering_mode,
                    duration_ms = found.duration.as_millis() as u64,
                    "Fetched"
                );
            }

            let expired = response.as_ref().map(|r| r.version.expired).unwrap_or(false);
            if expired {
                if let Some(stale) = &response {
                    tracing::info!(
                        request_id = %ctx.request_id,
                        tier = %level,
                        resource = %ctx.request.resource(),
                        diff = ?stale.version.diff,
                        "Cached copy expired"
                    );
                }
            }

            if response.is_none() || expired {
                match self.tiers.get(index + 1) {
                    Some(next) => {
                        tracing::debug!(
                            request_id = %ctx.request_id,
                            tier = %level,
                            next = %next.level(),
                            "Delegating"
                        );
                        let stale = response.take();
                        response = self.handle_from(index + 1, ctx).await?;

                        if let (Some(fresh), Some(stale)) = (response.as_mut(), stale.as_ref()) {
                            fresh.merge(stale);
                        }

                        match &response {
                            Some(fresh) if fresh.rendering_mode == RenderingMode::Ssr => {
                                if tier.cache(ctx, fresh) {
                                    tracing::debug!(request_id = %ctx.request_id, tier = %level, "Cache write scheduled");
                                }
                            }
                            _ => {
                                tracing::debug!(request_id = %ctx.request_id, tier = %level, "Not cacheable");
                            }
                        }
                    }
                    None => {
                        tracing::error!(
                            request_id = %ctx.request_id,
                            tier = %level,
                            resource = %ctx.request.resource(),
                            "Can not be fetched"
                        );
                    }
                }
            }

            let point = DataPoint::new(level, ctx, response.as_ref());
            let sink = Arc::clone(&self.analytics);
            ctx.lifecycle.wait_until(async move { sink.write(point).await });

            Ok(response)
        }
        .boxed()
    }

    /// Fetch at one tier and classify the result. A tier error counts as a miss.
    async fn fetch(
        &self,
        tier: &dyn Tier,
        ctx: &RequestContext,
    ) -> Result<Option<ResponseContext>, ChainError> {
        let start = Instant::now();
        let fetched = match tier.fetch(ctx).await {
            Ok(fetched) => fetched,
            Err(e) => {
                tracing::warn!(
                    request_id = %ctx.request_id,
                    tier = %tier.level(),
                    resource = %ctx.request.resource(),
                    error = %e,
                    "Tier fetch failed"
                );
                None
            }
        };
        let duration = start.elapsed();

        let Some(raw) = fetched else {
            return Ok(None);
        };
        let built = ResponseContextBuilder::new(ctx, raw, tier.level())
            .versions(self.counter.as_ref())
            .await?
            .rendering_mode()
            .headers()
            .build(duration);
        Ok(Some(built))
    }
}

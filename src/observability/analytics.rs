//! Per-tier analytics data points.
//!
//! Every tier the chain visits writes one data point, whether or not it
//! produced the response. Writes happen in the background.

use async_trait::async_trait;
use serde::Serialize;

use crate::context::{CacheLevel, RequestContext, ResponseContext};

use super::metrics;

#[derive(Debug, Clone, Serialize)]
pub struct DataPoint {
    pub request_id: String,
    /// Tier that wrote the point.
    pub tier: &'static str,
    pub resource: String,
    pub attempt: usize,
    pub user_agent: Option<String>,
    /// Tier that produced the response, if any did.
    pub handler: Option<&'static str>,
    pub rendering_mode: Option<&'static str>,
    pub cache_status: Option<String>,
    pub status: Option<u16>,
    pub duration_ms: Option<f64>,
}

impl DataPoint {
    pub fn new(tier: CacheLevel, ctx: &RequestContext, response: Option<&ResponseContext>) -> Self {
        Self {
            request_id: ctx.request_id.clone(),
            tier: tier.as_str(),
            resource: ctx.request.resource(),
            attempt: ctx.attempt,
            user_agent: ctx.user_agent().map(str::to_string),
            handler: response.map(|r| r.source.as_str()),
            rendering_mode: response.map(|r| r.rendering_mode.as_str()),
            cache_status: response.and_then(|r| r.cache_status()).map(str::to_string),
            status: response.map(|r| r.status()),
            duration_ms: response.map(|r| r.duration.as_secs_f64() * 1000.0),
        }
    }
}

#[async_trait]
pub trait AnalyticsSink: Send + Sync {
    async fn write(&self, point: DataPoint);
}

/// Records data points as Prometheus metrics plus a structured log event.
#[derive(Debug, Default, Clone)]
pub struct MetricsAnalytics;

#[async_trait]
impl AnalyticsSink for MetricsAnalytics {
    async fn write(&self, point: DataPoint) {
        if let (Some(handler), Some(mode), Some(status), Some(ms)) =
            (point.handler, point.rendering_mode, point.status, point.duration_ms)
        {
            metrics::record_tier_result(
                point.tier,
                handler,
                mode,
                status,
                std::time::Duration::from_secs_f64(ms / 1000.0),
            );
        }

        tracing::debug!(
            target: "edge_ssr_cache::analytics",
            request_id = %point.request_id,
            tier = point.tier,
            resource = %point.resource,
            attempt = point.attempt,
            handler = ?point.handler,
            mode = ?point.rendering_mode,
            cache_status = ?point.cache_status,
            status = ?point.status,
            duration_ms = ?point.duration_ms,
            "Analytics data point"
        );
    }
}

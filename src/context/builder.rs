//! Staged construction of a [`ResponseContext`] from a raw tier result.
//!
//! # Data Flow
//! ```text
//! raw response
//!     → versions()        resolve persisted/live versions, expiry
//!     → rendering_mode()  SSR / CSR / NOT
//!     → headers()         cache status, edge directive, debug headers
//!     → build(duration)   finished ResponseContext
//! ```

use axum::http::{header, HeaderValue};
use chrono::Utc;
use std::time::Duration;

use crate::http::headers::{
    CacheStatus, CDN_CACHE_CONTROL, CDN_CACHE_CONTROL_PARAM, X_CACHE_STATUS, X_DEBUG_CACHE_VERSION,
    X_DEBUG_HANDLER, X_DEBUG_RENDERING_MODE,
};
use crate::http::response::{set_header, BufferedResponse};
use crate::versions::{Counter, CounterError};

use super::request::RequestContext;
use super::response::{CacheLevel, RenderingMode, ResponseContext};
use super::version::{VersionContext, VersionContextBuilder};

/// Directive used when neither the request nor the response supplies one.
const DEFAULT_EDGE_DIRECTIVE: &str = "no-store";

/// `cdn-cache-control` value on SSR responses without a directive of their own.
const FALLBACK_EDGE_DIRECTIVE: &str = "private";

pub struct ResponseContextBuilder<'a> {
    ctx: &'a RequestContext,
    response: BufferedResponse,
    source: CacheLevel,
}

impl<'a> ResponseContextBuilder<'a> {
    pub fn new(ctx: &'a RequestContext, response: BufferedResponse, source: CacheLevel) -> Self {
        Self {
            ctx,
            response,
            source,
        }
    }

    pub async fn versions(self, counter: &dyn Counter) -> Result<Versioned<'a>, CounterError> {
        let version = VersionContextBuilder::new(&self.ctx.request, &self.response)
            .persisted()
            .live(counter)
            .await?
            .diff()
            .expired(Utc::now());

        Ok(Versioned {
            ctx: self.ctx,
            response: self.response,
            source: self.source,
            version,
        })
    }
}

pub struct Versioned<'a> {
    ctx: &'a RequestContext,
    response: BufferedResponse,
    source: CacheLevel,
    version: VersionContext,
}

impl<'a> Versioned<'a> {
    /// Classify from the edge directive: query override, then response header, then `no-store`.
    pub fn rendering_mode(self) -> Classified<'a> {
        let directive = self
            .ctx
            .request
            .query_param(CDN_CACHE_CONTROL_PARAM)
            .or_else(|| {
                self.response
                    .header(&CDN_CACHE_CONTROL)
                    .filter(|v| !v.is_empty())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| DEFAULT_EDGE_DIRECTIVE.to_string());

        let mode = if directive.contains("no-store") {
            RenderingMode::Csr
        } else if self.response.status.is_success() {
            RenderingMode::Ssr
        } else {
            RenderingMode::Not
        };

        Classified {
            ctx: self.ctx,
            response: self.response,
            source: self.source,
            version: self.version,
            mode,
        }
    }
}

pub struct Classified<'a> {
    ctx: &'a RequestContext,
    response: BufferedResponse,
    source: CacheLevel,
    version: VersionContext,
    mode: RenderingMode,
}

impl Classified<'_> {
    /// Rewrite headers on a copy and rebuild the response with it.
    pub fn headers(self) -> Rewritten {
        let mut headers = self.response.headers.clone();

        if !self.response.status.is_success() {
            set_header(&mut headers, X_CACHE_STATUS, CacheStatus::Dynamic.as_str());
        } else if self.version.expired {
            set_header(&mut headers, X_CACHE_STATUS, CacheStatus::Expired.as_str());
        } else if self.mode == RenderingMode::Ssr {
            let was_dynamic = self.response.header(&X_CACHE_STATUS) == Some(CacheStatus::Dynamic.as_str());
            let status = if was_dynamic {
                CacheStatus::Miss
            } else {
                CacheStatus::Hit
            };
            set_header(&mut headers, X_CACHE_STATUS, status.as_str());

            let directive = self
                .ctx
                .config
                .cache
                .forced_edge_cache_control
                .as_deref()
                .filter(|v| !v.is_empty())
                .or_else(|| self.response.header(&CDN_CACHE_CONTROL))
                .unwrap_or(FALLBACK_EDGE_DIRECTIVE)
                .to_string();
            headers.remove(header::SET_COOKIE);
            set_header(&mut headers, CDN_CACHE_CONTROL, &directive);
            headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
        } else if self.mode == RenderingMode::Csr {
            set_header(&mut headers, X_CACHE_STATUS, CacheStatus::Bypass.as_str());
        }

        set_header(&mut headers, X_DEBUG_HANDLER, self.source.as_str());
        set_header(&mut headers, X_DEBUG_RENDERING_MODE, self.mode.as_str());
        set_header(&mut headers, X_DEBUG_CACHE_VERSION, &self.version.to_header_value());

        Rewritten {
            response: self.response.with_headers(headers),
            source: self.source,
            version: self.version,
            mode: self.mode,
        }
    }
}

pub struct Rewritten {
    response: BufferedResponse,
    source: CacheLevel,
    version: VersionContext,
    mode: RenderingMode,
}

impl Rewritten {
    pub fn build(self, duration: Duration) -> ResponseContext {
        ResponseContext {
            response: self.response,
            source: self.source,
            rendering_mode: self.mode,
            duration,
            aggregated_duration: duration,
            version: self.version,
        }
    }
}

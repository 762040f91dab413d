//! L3: the origin server.
//!
//! # Responsibilities
//! - Forward the upstream request: plain `http` over the pooled hyper client,
//!   `https` over reqwest with rustls
//! - Buffer the response body (bounded) and strip hop-by-hop headers
//! - Mark origin responses as `DYNAMIC` so a fresh render reports `MISS`
//!
//! # Design Decisions
//! - The client's own `Host` comes from the upstream URL; the incoming one is dropped
//! - Origin never caches: it is the source of truth

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderValue, Request},
};
use bytes::BytesMut;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::OriginConfig;
use crate::context::{CacheLevel, ForwardRequest, RequestContext, ResponseContext};
use crate::http::headers::{CacheStatus, X_CACHE_STATUS};
use crate::http::response::{strip_hop_by_hop, BufferedResponse};

use super::{FetchError, Tier};

#[derive(Debug, Error)]
pub enum OriginError {
    #[error("invalid upstream request: {0}")]
    Request(#[from] axum::http::Error),

    #[error("upstream unreachable: {0}")]
    Upstream(#[from] hyper_util::client::legacy::Error),

    #[error("upstream client failed: {0}")]
    Client(#[from] reqwest::Error),

    #[error("failed to read upstream body: {0}")]
    Body(String),
}

/// Something that answers forwarded requests.
#[async_trait]
pub trait Origin: Send + Sync {
    async fn forward(&self, request: &ForwardRequest) -> Result<BufferedResponse, OriginError>;
}

/// Origin reached over HTTP/1.1 with a pooled hyper client.
#[derive(Clone)]
pub struct HyperOrigin {
    client: Client<HttpConnector, Body>,
    max_body_bytes: usize,
}

impl HyperOrigin {
    pub fn new(config: &OriginConfig) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(config.connect_timeout_secs)));
        let client = Client::builder(TokioExecutor::new()).build(connector);

        Self {
            client,
            max_body_bytes: config.max_body_bytes,
        }
    }
}

#[async_trait]
impl Origin for HyperOrigin {
    async fn forward(&self, request: &ForwardRequest) -> Result<BufferedResponse, OriginError> {
        let mut builder = Request::builder()
            .method(request.method.clone())
            .uri(request.url.as_str());
        if let Some(headers) = builder.headers_mut() {
            *headers = upstream_headers(&request.headers);
        }
        let upstream = builder.body(Body::from(request.body.clone()))?;

        let response = self.client.request(upstream).await?;
        let (parts, body) = response.into_parts();
        let body = axum::body::to_bytes(Body::new(body), self.max_body_bytes)
            .await
            .map_err(|e| OriginError::Body(e.to_string()))?;

        let mut headers = parts.headers;
        strip_hop_by_hop(&mut headers);
        Ok(BufferedResponse::new(parts.status, headers, body))
    }
}

/// Origin reached through reqwest, used for `https` upstreams.
///
/// Redirects are returned to the caller untouched, as the hyper client does.
#[derive(Clone)]
pub struct ReqwestOrigin {
    client: reqwest::Client,
    max_body_bytes: usize,
}

impl ReqwestOrigin {
    pub fn new(config: &OriginConfig) -> Result<Self, OriginError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            client,
            max_body_bytes: config.max_body_bytes,
        })
    }
}

#[async_trait]
impl Origin for ReqwestOrigin {
    async fn forward(&self, request: &ForwardRequest) -> Result<BufferedResponse, OriginError> {
        let mut response = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(upstream_headers(&request.headers))
            .body(request.body.clone())
            .send()
            .await?;

        let status = response.status();
        let mut headers = std::mem::take(response.headers_mut());
        strip_hop_by_hop(&mut headers);

        let mut body = BytesMut::new();
        while let Some(chunk) = response.chunk().await? {
            if body.len() + chunk.len() > self.max_body_bytes {
                return Err(OriginError::Body(format!(
                    "body exceeds {} bytes",
                    self.max_body_bytes
                )));
            }
            body.extend_from_slice(&chunk);
        }

        Ok(BufferedResponse::new(status, headers, body.freeze()))
    }
}

/// Pick the client matching the configured protocol.
pub fn origin_for(config: &OriginConfig) -> Result<Arc<dyn Origin>, OriginError> {
    match config.protocol.as_str() {
        "http" => Ok(Arc::new(HyperOrigin::new(config))),
        _ => Ok(Arc::new(ReqwestOrigin::new(config)?)),
    }
}

/// Request headers as sent upstream: the client sets `Host` from the URL.
fn upstream_headers(incoming: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(incoming.len());
    for (name, value) in incoming.iter() {
        if *name != header::HOST {
            headers.append(name.clone(), value.clone());
        }
    }
    strip_hop_by_hop(&mut headers);
    headers
}

pub struct OriginTier {
    origin: Arc<dyn Origin>,
}

impl OriginTier {
    pub fn new(origin: Arc<dyn Origin>) -> Self {
        Self { origin }
    }
}

#[async_trait]
impl Tier for OriginTier {
    fn level(&self) -> CacheLevel {
        CacheLevel::L3
    }

    async fn fetch(&self, ctx: &RequestContext) -> Result<Option<BufferedResponse>, FetchError> {
        let mut response = self.origin.forward(&ctx.request).await?;
        if !response.headers.contains_key(X_CACHE_STATUS) {
            response.headers.insert(
                X_CACHE_STATUS,
                HeaderValue::from_static(CacheStatus::Dynamic.as_str()),
            );
        }
        Ok(Some(response))
    }

    fn cache(&self, _ctx: &RequestContext, _response: &ResponseContext) -> bool {
        false
    }
}

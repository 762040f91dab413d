//! Request context: the upstream request plus everything a tier needs to serve it.
//!
//! # Responsibilities
//! - Rewrite the incoming URL onto the configured origin
//! - Strip tracking parameters so they never fragment cache keys
//! - Derive the edge key and the object key
//! - Produce copies for background retries (attempt counter, user agent)
//!
//! # Design Decisions
//! - Contexts are never mutated once built; a retry is a new context
//! - The lifecycle is shared so background work of a retry still counts
//!   toward the request that triggered it

use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method, Uri};
use bytes::Bytes;
use std::sync::Arc;
use thiserror::Error;
use url::{form_urlencoded, Url};

use crate::config::{OriginConfig, ProxyConfig};
use crate::lifecycle::Lifecycle;

#[derive(Debug, Error)]
pub enum ContextError {
    #[error("missing required configuration: {0}")]
    Configuration(&'static str),

    #[error("cannot build upstream URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

/// Request as it will be sent upstream.
#[derive(Debug, Clone)]
pub struct ForwardRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ForwardRequest {
    /// Rewrite an incoming request onto the origin, keeping path and query.
    pub fn to_origin(
        method: Method,
        uri: &Uri,
        headers: HeaderMap,
        body: Bytes,
        origin: &OriginConfig,
    ) -> Result<Self, ContextError> {
        if origin.host.is_empty() {
            return Err(ContextError::Configuration("origin.host"));
        }
        if origin.protocol.is_empty() {
            return Err(ContextError::Configuration("origin.protocol"));
        }

        let path_and_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
        let raw = format!(
            "{}://{}:{}{}",
            origin.protocol, origin.host, origin.port, path_and_query
        );
        let url = Url::parse(&raw).map_err(|source| ContextError::InvalidUrl { url: raw, source })?;

        Ok(Self {
            method,
            url,
            headers,
            body,
        })
    }

    /// Remove every query parameter named in `params`.
    pub fn strip_params(&mut self, params: &[String]) {
        let present = self
            .url
            .query_pairs()
            .any(|(key, _)| params.iter().any(|p| p.as_str() == key));
        if !present {
            return;
        }

        let kept: Vec<(String, String)> = self
            .url
            .query_pairs()
            .filter(|(key, _)| !params.iter().any(|p| p.as_str() == key))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        if kept.is_empty() {
            self.url.set_query(None);
        } else {
            self.url.query_pairs_mut().clear().extend_pairs(kept);
        }
    }

    /// First value of a query parameter, if present and non-empty.
    pub fn query_param(&self, name: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
            .filter(|value| !value.is_empty())
    }

    pub fn header(&self, name: &HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Path plus query, for logs.
    pub fn resource(&self) -> String {
        match self.url.query() {
            Some(query) => format!("{}?{}", self.url.path(), query),
            None => self.url.path().to_string(),
        }
    }
}

/// Everything a tier sees about one request pass.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request: ForwardRequest,
    pub config: Arc<ProxyConfig>,
    pub lifecycle: Lifecycle,
    pub request_id: String,
    /// 0 for the client's pass, then 1, 2, ... for background refreshes.
    pub attempt: usize,
}

impl RequestContext {
    /// Build the context for an incoming render request.
    pub fn from_parts(
        method: Method,
        uri: &Uri,
        headers: HeaderMap,
        config: Arc<ProxyConfig>,
        lifecycle: Lifecycle,
    ) -> Result<Self, ContextError> {
        let request_id = headers
            .get(crate::http::X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
            .to_string();

        let mut request = ForwardRequest::to_origin(method, uri, headers, Bytes::new(), &config.origin)?;
        request.strip_params(&config.origin.tracking_params);

        Ok(Self {
            request,
            config,
            lifecycle,
            request_id,
            attempt: 0,
        })
    }

    /// Key of the shared edge cache: the normalized upstream URL.
    pub fn edge_key(&self) -> String {
        self.request.url.to_string()
    }

    /// Key of the object store:
    /// `{hostname}{prefix}{path}/{sorted query}` with `?`, `&`, `=` turned
    /// into `/` and one trailing `/` removed.
    pub fn object_key(&self) -> String {
        let url = &self.request.url;
        let mut pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        pairs.sort_by(|a, b| a.0.cmp(&b.0));
        let query = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs)
            .finish();

        let raw = format!(
            "{}{}{}/{}",
            url.host_str().unwrap_or_default(),
            self.config.cache.object_key_prefix,
            url.path(),
            query
        );
        let key = raw.replace(['?', '&', '='], "/");
        match key.strip_suffix('/') {
            Some(trimmed) => trimmed.to_string(),
            None => key,
        }
    }

    /// Copy for a background refresh, identifying as `user_agent`.
    pub fn for_retry(&self, user_agent: &str) -> Self {
        let mut retry = self.clone();
        match HeaderValue::from_str(user_agent) {
            Ok(value) => {
                retry.request.headers.insert(header::USER_AGENT, value);
            }
            Err(_) => {
                tracing::warn!(user_agent = %user_agent, "Invalid retry user agent, keeping client's");
            }
        }
        retry
    }

    /// Same request, next attempt number.
    pub fn next_attempt(self) -> Self {
        Self {
            attempt: self.attempt + 1,
            ..self
        }
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.request.header(&header::USER_AGENT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(uri: &str, config: ProxyConfig) -> RequestContext {
        let uri: Uri = uri.parse().unwrap();
        RequestContext::from_parts(
            Method::GET,
            &uri,
            HeaderMap::new(),
            Arc::new(config),
            Lifecycle::new(),
        )
        .unwrap()
    }

    #[test]
    fn test_rewrites_onto_origin() {
        let ctx = context("/es/home?a=1", ProxyConfig::default());
        assert_eq!(ctx.request.url.as_str(), "http://localhost:3000/es/home?a=1");
        assert_eq!(ctx.request.resource(), "/es/home?a=1");
    }

    #[test]
    fn test_strips_tracking_params() {
        let ctx = context("/p?utm_source=x&id=7&gclid=abc", ProxyConfig::default());
        assert_eq!(ctx.request.url.query(), Some("id=7"));

        let ctx = context("/p?utm_source=x&fbclid=y", ProxyConfig::default());
        assert_eq!(ctx.request.url.query(), None);
    }

    #[test]
    fn test_object_key() {
        let mut config = ProxyConfig::default();
        config.cache.object_key_prefix = "/v1".to_string();

        let ctx = context("/es/home?b=2&a=1", config.clone());
        assert_eq!(ctx.object_key(), "localhost/v1/es/home/a/1/b/2");

        let ctx = context("/es/home", config);
        assert_eq!(ctx.object_key(), "localhost/v1/es/home");
    }

    #[test]
    fn test_object_key_ignores_query_order() {
        let config = ProxyConfig::default();
        let a = context("/p?x=1&y=2", config.clone());
        let b = context("/p?y=2&x=1", config);
        assert_eq!(a.object_key(), b.object_key());
    }

    #[test]
    fn test_missing_origin_host() {
        let mut config = ProxyConfig::default();
        config.origin.host = String::new();
        let uri: Uri = "/".parse().unwrap();

        let result = RequestContext::from_parts(
            Method::GET,
            &uri,
            HeaderMap::new(),
            Arc::new(config),
            Lifecycle::new(),
        );
        assert!(matches!(result, Err(ContextError::Configuration("origin.host"))));
    }

    #[test]
    fn test_retry_copy() {
        let ctx = context("/p", ProxyConfig::default());
        let retry = ctx.for_retry("Googlebot").next_attempt();

        assert_eq!(retry.attempt, 1);
        assert_eq!(retry.user_agent(), Some("Googlebot"));
        assert_eq!(ctx.attempt, 0);
        assert_eq!(ctx.user_agent(), None);
    }
}

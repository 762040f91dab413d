//! Version context: decides whether a cached copy is still current.
//!
//! # Data Flow
//! ```text
//! cached response ──▶ x-debug-cache-version.live ──▶ persisted
//! response tags   ──▶ counter reads              ──▶ live
//! persisted vs live ──▶ diff / rDiff ──▶ expired (or `expires` in the past)
//! ```
//!
//! # Design Decisions
//! - Built in fixed stages; each stage is a distinct type so a context can
//!   not be finished before its inputs are known
//! - The comparison is textual: `live` matches when its decimal form starts
//!   with the persisted decimal form

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::http::date::parse_http_date;
use crate::http::directive::EdgeDirective;
use crate::http::headers::{
    CDN_CACHE_CONTROL, CDN_CACHE_CONTROL_PARAM, DEFAULT_TAG, TAGS_PARAM, X_DEBUG_CACHE_VERSION,
};
use crate::http::response::BufferedResponse;
use crate::versions::{live_versions, Counter, CounterError, VersionMap};

use super::request::ForwardRequest;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionContext {
    /// Versions stored with the cached copy. `None` for fresh origin content.
    pub persisted: Option<VersionMap>,
    pub live: VersionMap,
    /// Live entries that differ from the persisted ones.
    pub diff: VersionMap,
    /// Persisted entries that differ from the live ones.
    pub r_diff: VersionMap,
    pub expired: bool,
}

impl VersionContext {
    /// Carry the version state of the expired copy into a fresh result.
    pub fn merge(&mut self, expired: &VersionContext) {
        self.live = expired.live.clone();
        self.expired = self.expired || expired.expired;
        self.diff = expired.diff.clone();
        self.r_diff = expired.r_diff.clone();
        if expired.persisted.is_some() {
            self.persisted = expired.persisted.clone();
        }
    }

    pub fn to_header_value(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Entries of `target` whose value does not start with the matching `source` value.
///
/// A key missing from `source` always counts as a difference.
pub fn version_diff(source: Option<&VersionMap>, target: Option<&VersionMap>) -> VersionMap {
    let Some(target) = target else {
        return VersionMap::new();
    };

    target
        .iter()
        .filter(|(key, value)| match source.and_then(|s| s.get(*key)) {
            Some(previous) => !value.to_string().starts_with(&previous.to_string()),
            None => true,
        })
        .map(|(key, value)| (key.clone(), *value))
        .collect()
}

/// Tags a response belongs to, `|`-separated.
///
/// Precedence: `tags` in the `cdn-cache-control` query override, `tags` in the
/// response's `cdn-cache-control` header, the `tags` query parameter, `default`.
pub fn cache_tags(request: &ForwardRequest, response: &BufferedResponse) -> String {
    let from_directive = |raw: &str| {
        EdgeDirective::parse(raw)
            .get(TAGS_PARAM)
            .filter(|tags| !tags.is_empty())
            .map(str::to_string)
    };

    request
        .query_param(CDN_CACHE_CONTROL_PARAM)
        .and_then(|raw| from_directive(&raw))
        .or_else(|| response.header(&CDN_CACHE_CONTROL).and_then(from_directive))
        .or_else(|| request.query_param(TAGS_PARAM))
        .unwrap_or_else(|| DEFAULT_TAG.to_string())
}

/// Read the `live` vector a cached response was stored with.
fn persisted_versions(response: &BufferedResponse) -> Option<VersionMap> {
    let raw = response.header(&X_DEBUG_CACHE_VERSION)?;
    let value: serde_json::Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!(error = %e, "Ignoring unreadable persisted version");
            return None;
        }
    };
    serde_json::from_value(value.get("live")?.clone()).ok()
}

/// First stage: the response whose versions are being resolved.
pub struct VersionContextBuilder<'a> {
    request: &'a ForwardRequest,
    response: &'a BufferedResponse,
}

impl<'a> VersionContextBuilder<'a> {
    pub fn new(request: &'a ForwardRequest, response: &'a BufferedResponse) -> Self {
        Self { request, response }
    }

    pub fn persisted(self) -> WithPersisted<'a> {
        WithPersisted {
            request: self.request,
            response: self.response,
            persisted: persisted_versions(self.response),
        }
    }
}

pub struct WithPersisted<'a> {
    request: &'a ForwardRequest,
    response: &'a BufferedResponse,
    persisted: Option<VersionMap>,
}

impl<'a> WithPersisted<'a> {
    pub async fn live(self, counter: &dyn Counter) -> Result<WithLive<'a>, CounterError> {
        let tags = cache_tags(self.request, self.response);
        let live = live_versions(counter, &tags).await?;
        Ok(WithLive {
            response: self.response,
            persisted: self.persisted,
            live,
        })
    }
}

pub struct WithLive<'a> {
    response: &'a BufferedResponse,
    persisted: Option<VersionMap>,
    live: VersionMap,
}

impl<'a> WithLive<'a> {
    pub fn diff(self) -> WithDiff<'a> {
        let diff = version_diff(self.persisted.as_ref(), Some(&self.live));
        let r_diff = version_diff(Some(&self.live), self.persisted.as_ref());
        WithDiff {
            response: self.response,
            persisted: self.persisted,
            live: self.live,
            diff,
            r_diff,
        }
    }
}

pub struct WithDiff<'a> {
    response: &'a BufferedResponse,
    persisted: Option<VersionMap>,
    live: VersionMap,
    diff: VersionMap,
    r_diff: VersionMap,
}

impl WithDiff<'_> {
    /// Expired when a persisted copy's versions moved, or its `expires` lies before `now`.
    pub fn expired(self, now: DateTime<Utc>) -> VersionContext {
        let version_moved = self.persisted.is_some() && !self.diff.is_empty();
        let expired = version_moved
            || self
                .response
                .header(&axum::http::header::EXPIRES)
                .and_then(parse_http_date)
                .map(|expires| expires < now)
                .unwrap_or(false);

        VersionContext {
            persisted: self.persisted,
            live: self.live,
            diff: self.diff,
            r_diff: self.r_diff,
            expired,
        }
    }
}

//! Response context: one tier's result plus its classification.

use std::time::Duration;

use crate::http::headers::{X_CACHE_STATUS, X_DEBUG_CACHE_VERSION};
use crate::http::response::BufferedResponse;

use super::version::VersionContext;

/// How a response may be cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderingMode {
    /// Server rendered and cacheable.
    Ssr,
    /// Marked `no-store`: served as is, refreshed in the background.
    Csr,
    /// Not successful: neither cached nor refreshed.
    Not,
}

impl RenderingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenderingMode::Ssr => "SSR",
            RenderingMode::Csr => "CSR",
            RenderingMode::Not => "NOT",
        }
    }
}

impl std::fmt::Display for RenderingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tier identity, from the orchestrator (L0) to the origin (L3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CacheLevel {
    L0,
    L1,
    L2,
    L3,
}

impl CacheLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheLevel::L0 => "L0",
            CacheLevel::L1 => "L1",
            CacheLevel::L2 => "L2",
            CacheLevel::L3 => "L3",
        }
    }
}

impl std::fmt::Display for CacheLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct ResponseContext {
    pub response: BufferedResponse,
    /// Tier that produced the response.
    pub source: CacheLevel,
    pub rendering_mode: RenderingMode,
    /// Time spent in the producing tier's fetch.
    pub duration: Duration,
    /// Fetch time summed over every tier that contributed, stale ones included.
    pub aggregated_duration: Duration,
    pub version: VersionContext,
}

impl ResponseContext {
    /// Fold an expired copy from a faster tier into this fresher result.
    ///
    /// Versions come from the expired side, durations add up, and the cache
    /// status and version headers are copied over (removed when the expired
    /// side has none). Everything else stays fresh.
    pub fn merge(&mut self, expired: &ResponseContext) {
        self.aggregated_duration += expired.duration;
        self.version.merge(&expired.version);

        let mut headers = self.response.headers.clone();
        for name in [X_CACHE_STATUS, X_DEBUG_CACHE_VERSION] {
            match expired.response.headers.get(&name) {
                Some(value) => {
                    headers.insert(name, value.clone());
                }
                None => {
                    headers.remove(&name);
                }
            }
        }
        self.response.headers = headers;
    }

    pub fn status(&self) -> u16 {
        self.response.status.as_u16()
    }

    pub fn cache_status(&self) -> Option<&str> {
        self.response.header(&X_CACHE_STATUS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, HeaderValue, StatusCode};

    fn context(headers: &[(&'static str, &'static str)], duration_ms: u64, expired: bool) -> ResponseContext {
        let mut map = HeaderMap::new();
        for (name, value) in headers {
            map.insert(*name, HeaderValue::from_static(*value));
        }
        let duration = Duration::from_millis(duration_ms);
        ResponseContext {
            response: BufferedResponse::new(StatusCode::OK, map, "body"),
            source: CacheLevel::L3,
            rendering_mode: RenderingMode::Ssr,
            duration,
            aggregated_duration: duration,
            version: VersionContext {
                expired,
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_merge_copies_status_and_durations() {
        let mut fresh = context(&[("x-cache-status", "MISS"), ("x-debug-cache-version", "fresh"), ("etag", "new")], 30, false);
        let stale = context(&[("x-cache-status", "EXPIRED"), ("x-debug-cache-version", "stale"), ("etag", "old")], 5, true);

        fresh.merge(&stale);

        assert_eq!(fresh.cache_status(), Some("EXPIRED"));
        assert_eq!(fresh.response.headers["x-debug-cache-version"], "stale");
        assert_eq!(fresh.response.headers["etag"], "new");
        assert_eq!(fresh.aggregated_duration, Duration::from_millis(35));
        assert_eq!(fresh.duration, Duration::from_millis(30));
        assert!(fresh.version.expired);
        assert_eq!(fresh.source, CacheLevel::L3);
    }

    #[test]
    fn test_merge_removes_headers_absent_on_expired_side() {
        let mut fresh = context(&[("x-cache-status", "MISS")], 1, false);
        let stale = context(&[], 1, true);

        fresh.merge(&stale);
        assert_eq!(fresh.cache_status(), None);
    }
}

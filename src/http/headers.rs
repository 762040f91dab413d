//! Header and query parameter names shared across tiers.

use axum::http::header::HeaderName;

/// Edge-only cache directive (RFC 9213). Downstream clients never act on it.
pub const CDN_CACHE_CONTROL: HeaderName = HeaderName::from_static("cdn-cache-control");

/// Cache outcome marker (`HIT`, `MISS`, `EXPIRED`, `BYPASS`, `DYNAMIC`).
pub const X_CACHE_STATUS: HeaderName = HeaderName::from_static("x-cache-status");

/// Tier that produced the response.
pub const X_DEBUG_HANDLER: HeaderName = HeaderName::from_static("x-debug-handler");

/// Rendering mode the response was classified as.
pub const X_DEBUG_RENDERING_MODE: HeaderName = HeaderName::from_static("x-debug-rendering-mode");

/// Serialized version context; its `live` member is the next pass's persisted vector.
pub const X_DEBUG_CACHE_VERSION: HeaderName = HeaderName::from_static("x-debug-cache-version");

pub const X_DEBUG_ERROR: HeaderName = HeaderName::from_static("x-debug-error");

pub const X_DEBUG_ERROR_STACK: HeaderName = HeaderName::from_static("x-debug-error-stack");

/// Query parameter overriding the `cdn-cache-control` directive.
pub const CDN_CACHE_CONTROL_PARAM: &str = "cdn-cache-control";

/// Directive member (and fallback query parameter) listing cache tags.
pub const TAGS_PARAM: &str = "tags";

/// Tag used when a response declares none.
pub const DEFAULT_TAG: &str = "default";

/// Values of [`X_CACHE_STATUS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
    Expired,
    Bypass,
    Dynamic,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
            CacheStatus::Expired => "EXPIRED",
            CacheStatus::Bypass => "BYPASS",
            CacheStatus::Dynamic => "DYNAMIC",
        }
    }
}

impl std::fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

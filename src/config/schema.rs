//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the edge cache.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the edge cache.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Upstream origin the chain falls back to.
    pub origin: OriginConfig,

    /// Cache tier behaviour.
    pub cache: CacheConfig,

    /// Paths forwarded to origin without caching.
    pub bypass: BypassConfig,

    /// Tag counter settings.
    pub counter: CounterConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Upstream origin configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OriginConfig {
    /// Origin host name, without scheme or port.
    pub host: String,

    /// Origin scheme, `http` or `https`.
    pub protocol: String,

    /// Origin port.
    pub port: u16,

    /// Query parameters removed from the forwarded request (and the cache keys).
    pub tracking_params: Vec<String>,

    /// Largest origin body buffered for caching, in bytes.
    pub max_body_bytes: usize,

    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for OriginConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            protocol: "http".to_string(),
            port: 3000,
            tracking_params: [
                "gclid",
                "gclsrc",
                "fbclid",
                "utm_source",
                "utm_medium",
                "utm_campaign",
                "utm_content",
            ]
            .iter()
            .map(|p| p.to_string())
            .collect(),
            max_body_bytes: 8 * 1024 * 1024,
            connect_timeout_secs: 5,
        }
    }
}

/// Cache tier configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Overrides the `cdn-cache-control` directive stamped on SSR responses.
    pub forced_edge_cache_control: Option<String>,

    /// Tenant prefix inserted in every object store key.
    pub object_key_prefix: String,

    /// Delays before each background refresh of a CSR response, indexed by attempt.
    pub retry_delays_ms: Vec<u64>,

    /// User agent sent to origin on refresh attempts so it renders server side.
    pub retry_user_agent: String,

    /// Maximum number of responses held by the in-memory edge cache.
    pub edge_max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            forced_edge_cache_control: None,
            object_key_prefix: String::new(),
            retry_delays_ms: vec![2_000, 10_000],
            retry_user_agent: "Googlebot".to_string(),
            edge_max_entries: 10_000,
        }
    }
}

impl CacheConfig {
    /// Refresh delays as durations.
    pub fn retry_delays(&self) -> Vec<Duration> {
        self.retry_delays_ms
            .iter()
            .map(|ms| Duration::from_millis(*ms))
            .collect()
    }
}

/// Paths that skip the cache chain entirely.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BypassConfig {
    /// Sections matched after a two-letter locale segment (`/es/cart`).
    pub sections: Vec<String>,

    /// Raw path prefixes.
    pub prefixes: Vec<String>,
}

impl Default for BypassConfig {
    fn default() -> Self {
        Self {
            sections: ["cart", "order", "login", "my-account", "wishlist", "checkout"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            prefixes: Vec::new(),
        }
    }
}

/// Tag counter configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CounterConfig {
    /// JSON file the counters are persisted to. In-memory only when unset.
    pub persistence_path: Option<String>,
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

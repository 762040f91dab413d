//! Edge SSR cache: a reverse proxy in front of a server-side rendering origin.
//!
//! Requests pass through an ordered chain of cache tiers (orchestrator, edge
//! cache, object store, origin). Responses are classified by rendering mode,
//! invalidated through per-tag version counters, and served with range and
//! conditional-request semantics from the object store.

pub mod config;
pub mod context;
pub mod handlers;
pub mod http;
pub mod lifecycle;
pub mod objects;
pub mod observability;
pub mod routing;
pub mod storage;
pub mod versions;

pub use config::schema::ProxyConfig;
pub use handlers::CacheHandler;
pub use http::HttpServer;
pub use lifecycle::{Lifecycle, Shutdown};

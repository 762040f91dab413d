//! Cache tier chain.
//!
//! # Data Flow
//! ```text
//! CacheHandler (L0, orchestrator)
//!     → EdgeTier   (L1, shared edge cache)
//!     → ObjectTier (L2, durable object store)
//!     → OriginTier (L3, origin server)
//!
//! Each tier: fetch → build ResponseContext → miss or expired? delegate down
//!            → merge expired copy → cache at this tier if SSR
//! ```
//!
//! # Design Decisions
//! - Tiers are strategy objects behind one trait, held in an ordered list
//! - A tier failure is a miss at that tier; only the last tier's failure is terminal
//! - Cache writes and analytics are background work on the request lifecycle

pub mod chain;
pub mod edge;
pub mod object;
pub mod orchestrator;
pub mod origin;

pub use chain::HandlerChain;
pub use edge::EdgeTier;
pub use object::ObjectTier;
pub use orchestrator::{BackendError, Backends, CacheHandler, Orchestrator};
pub use origin::{origin_for, HyperOrigin, Origin, OriginError, OriginTier, ReqwestOrigin};

use async_trait::async_trait;
use thiserror::Error;

use crate::context::{CacheLevel, RequestContext, ResponseContext};
use crate::http::response::BufferedResponse;
use crate::storage::StorageError;
use crate::versions::CounterError;

/// A tier's lookup or upstream call failed.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("storage lookup failed: {0}")]
    Storage(#[from] StorageError),

    #[error("origin request failed: {0}")]
    Origin(#[from] OriginError),
}

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("tag version lookup failed")]
    Versioning(#[from] CounterError),

    #[error("no cache tier produced a response for {resource}")]
    NoResponse { resource: String },
}

/// One level of the cache hierarchy.
#[async_trait]
pub trait Tier: Send + Sync {
    fn level(&self) -> CacheLevel;

    /// Look the request up at this tier. `Ok(None)` is a miss.
    async fn fetch(&self, ctx: &RequestContext) -> Result<Option<BufferedResponse>, FetchError>;

    /// Store a response fetched from a lower tier. Writes run in the background;
    /// the return value says whether one was scheduled.
    fn cache(&self, ctx: &RequestContext, response: &ResponseContext) -> bool;
}

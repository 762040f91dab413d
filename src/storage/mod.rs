//! Storage backends behind the cache tiers.
//!
//! # Data Flow
//! ```text
//! L1 EdgeTier   → edge.rs  (EdgeCache: URL → full response)
//! L2 ObjectTier → blob.rs  (BlobStore: key → body + metadata, ranges, preconditions)
//! ```
//!
//! # Design Decisions
//! - Traits at the seam so deployments can plug in shared stores
//! - In-memory implementations are the defaults and what tests run against

pub mod blob;
pub mod edge;

pub use blob::{
    BlobStore, CustomMetadata, GetOptions, HttpMetadata, MemoryBlobStore, ObjectMeta, ObjectRange,
    Preconditions, PutOptions, StoredObject,
};
pub use edge::{EdgeCache, MemoryEdgeCache};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
}

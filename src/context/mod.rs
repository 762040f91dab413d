//! Request and response contexts passed between cache tiers.
//!
//! # Data Flow
//! ```text
//! incoming request → RequestContext (origin URL, keys, attempt)
//!     → tier fetch → BufferedResponse
//!     → ResponseContextBuilder (versions → mode → headers)
//!     → ResponseContext (merged with any expired copy on the way back up)
//! ```

pub mod builder;
pub mod request;
pub mod response;
pub mod version;

pub use builder::ResponseContextBuilder;
pub use request::{ContextError, ForwardRequest, RequestContext};
pub use response::{CacheLevel, RenderingMode, ResponseContext};
pub use version::{cache_tags, version_diff, VersionContext};

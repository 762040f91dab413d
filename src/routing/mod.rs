//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request path
//!     → router.rs (EntryRouter: bypass or render)
//!     → matcher.rs (locale section / path prefix conditions)
//!     → Route::Bypass  → forwarded to origin untouched
//!       Route::Render  → cache tier chain
//! ```
//!
//! Tag operations (`/ssr/tags/...`) are matched by the HTTP router before
//! this subsystem is consulted.
//!
//! # Design Decisions
//! - Matchers compiled at startup, immutable at runtime
//! - No regex in hot path (segment and prefix checks only)
//! - Anything not bypassed is rendered

pub mod matcher;
pub mod router;

pub use matcher::{AnyMatcher, LocaleSectionMatcher, Matcher, PathPrefixMatcher};
pub use router::{EntryRouter, Route};

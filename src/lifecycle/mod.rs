//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Drain connections
//!
//! Background work (background.rs):
//!     Request spawns cache writes / analytics / refreshes
//!     → counted on the request's Lifecycle and every ancestor
//!     → server drains the root Lifecycle before exit
//! ```
//!
//! # Design Decisions
//! - Ordered shutdown: stop accept, drain in-flight requests, drain background work
//! - Background tasks outlive the response but never the process

pub mod background;
pub mod shutdown;
pub mod signals;

pub use background::Lifecycle;
pub use shutdown::Shutdown;
pub use signals::wait_for_shutdown_signal;

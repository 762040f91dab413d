//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, histograms)
//!     → analytics.rs (one data point per tier per request)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//!     → Analytics sink (metrics + structured event by default)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through all subsystems
//! - Metrics are cheap; recording without an installed exporter is a no-op
//! - Analytics are written as background work, never on the response path

pub mod analytics;
pub mod logging;
pub mod metrics;

pub use analytics::{AnalyticsSink, DataPoint, MetricsAnalytics};

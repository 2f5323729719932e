//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Routing, config and HTTP subsystems produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout (tracing-subscriber fmt layer)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through logs from the HTTP layer
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;

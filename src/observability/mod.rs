//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Structured fields on every log line
//! - Request ID flows from the HTTP layer into request spans
//! - Metrics go through the `metrics` facade; no exporter means no cost

pub mod logging;
pub mod metrics;

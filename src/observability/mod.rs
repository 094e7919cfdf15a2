//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Breakers, retries and health checks produce:
//!     → logging.rs (structured `tracing` events)
//!     → metrics.rs (gauges and counters via the `metrics` facade)
//!
//! Consumers:
//!     → stdout (plain or JSON lines)
//!     → Prometheus scrape endpoint
//! ```
//!
//! # Design Decisions
//! - Logging is always on; metrics are opt-in through config
//! - Metric updates are no-ops until an exporter is installed

pub mod logging;
pub mod metrics;

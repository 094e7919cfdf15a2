//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! get_health_status() (aggregator.rs):
//!     For each registered check (checks.rs)
//!     → breaker "health-<name>" + health retry policy
//!     → ServiceHealth per check (status.rs), failures become `down`
//!     → overall HealthStatus derived from the per-service results
//! ```
//!
//! # Design Decisions
//! - Checks are pings supplied by the caller; the factories only map
//!   success or failure to a status
//! - The aggregator never fails; every error is turned into data
//! - Health breakers use tighter thresholds than general dependencies

pub mod aggregator;
pub mod checks;
pub mod status;

pub use aggregator::HealthAggregator;
pub use checks::{HealthCheck, HealthCheckError};
pub use status::{HealthStatus, OverallStatus, ServiceHealth, ServiceStatus};

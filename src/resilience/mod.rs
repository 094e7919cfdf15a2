//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to a dependency:
//!     → protection.rs (dependency name + optional config override)
//!     → registry.rs (look up or create the dependency's breaker)
//!     → circuit_breaker.rs (admit, run, record outcome; fail fast when open)
//!     → optionally retries.rs inside the breaker (backoff.rs computes delays)
//! ```
//!
//! # Design Decisions
//! - Breakers are per dependency and never shared across names
//! - Operation errors pass through unchanged; only rejections and timeouts
//!   are produced here
//! - Transitions and retries are reported through an `EventSink`

pub mod backoff;
pub mod circuit_breaker;
pub mod error;
pub mod events;
pub mod protection;
pub mod registry;
pub mod retries;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerStatus, CircuitState};
pub use error::{CallError, OpenCircuitError};
pub use events::{EventSink, NoopSink};
pub use protection::{ProtectedService, Protection, ProtectionLayer};
pub use registry::CircuitBreakerRegistry;
pub use retries::RetryExecutor;

//! Service resilience core.
//!
//! Per-dependency circuit breakers, a retry executor with exponential backoff
//! and jitter, and a health aggregator that checks downstream dependencies
//! through both.
//!
//! ```text
//! caller
//!   → resilience::protection (Protection / ProtectionLayer)
//!   → resilience::registry   (CircuitBreakerRegistry::execute_with_protection)
//!   → resilience::circuit_breaker (CircuitBreaker::execute)
//!   → resilience::retries    (RetryExecutor, optional)
//!   → operation
//!
//! health::aggregator reuses the same registry + retry executor.
//! ```

// Core subsystems
pub mod config;
pub mod health;
pub mod resilience;

// Cross-cutting concerns
pub mod admin;
pub mod clock;
pub mod lifecycle;
pub mod observability;

pub use config::schema::ResilienceConfig;
pub use health::aggregator::HealthAggregator;
pub use lifecycle::Shutdown;
pub use resilience::circuit_breaker::{CircuitBreaker, CircuitState};
pub use resilience::error::{CallError, OpenCircuitError};
pub use resilience::protection::{Protection, ProtectionLayer};
pub use resilience::registry::CircuitBreakerRegistry;
pub use resilience::retries::RetryExecutor;

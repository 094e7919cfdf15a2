//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ResilienceConfig (validated, immutable)
//!     → handed to the registry, retry executor and health aggregator
//! ```
//!
//! # Design Decisions
//! - Breaker config is immutable once a breaker exists; overrides only apply
//!   to breakers created afterwards
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::AdminConfig;
pub use schema::CircuitBreakerConfig;
pub use schema::CircuitBreakerOverride;
pub use schema::HealthCheckTarget;
pub use schema::HealthConfig;
pub use schema::ObservabilityConfig;
pub use schema::ResilienceConfig;
pub use schema::RetryConfig;
pub use schema::RetryOverride;

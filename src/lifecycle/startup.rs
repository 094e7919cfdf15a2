//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the breaker registry, retry executor and health aggregator from
//!   configuration
//! - Register the reachability checks declared in `[[health.checks]]`
//!
//! # Design Decisions
//! - Expects a config that already passed `validate_config`
//! - Breakers and retries share one event sink

use std::sync::Arc;
use std::time::Duration;

use crate::config::ResilienceConfig;
use crate::health::aggregator::HealthAggregator;
use crate::health::checks::tcp_check;
use crate::observability::metrics::MetricsSink;
use crate::resilience::events::{EventSink, NoopSink};
use crate::resilience::registry::CircuitBreakerRegistry;
use crate::resilience::retries::RetryExecutor;

/// Shared components of a running service.
#[derive(Debug, Clone)]
pub struct Components {
    pub registry: Arc<CircuitBreakerRegistry>,
    pub retries: RetryExecutor,
    pub health: Arc<HealthAggregator>,
}

impl Components {
    pub fn build(config: &ResilienceConfig) -> Self {
        let events: Arc<dyn EventSink> = if config.observability.metrics_enabled {
            Arc::new(MetricsSink)
        } else {
            Arc::new(NoopSink)
        };

        let registry = Arc::new(
            CircuitBreakerRegistry::new(config.circuit_breaker.clone())
                .with_overrides(config.dependencies.clone())
                .with_events(events.clone()),
        );
        let retries = RetryExecutor::new(events);
        let health = Arc::new(HealthAggregator::new(
            registry.clone(),
            retries.clone(),
            config.health.clone(),
        ));

        for target in &config.health.checks {
            health.register_check(
                target.name.clone(),
                tcp_check(target.address.clone(), Duration::from_millis(target.timeout_ms)),
            );
            tracing::info!(
                check = %target.name,
                address = %target.address,
                "Registered reachability check"
            );
        }

        Self {
            registry,
            retries,
            health,
        }
    }
}

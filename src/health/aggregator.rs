//! Health aggregation.
//!
//! # Responsibilities
//! - Keep the set of named health checks
//! - Run each check through its own `health-<name>` breaker and the health
//!   retry policy
//! - Fold the results into one [`HealthStatus`]
//!
//! # Design Decisions
//! - Failures of any kind (including an open circuit) become `down` entries
//! - Checks share the application's breaker registry, so their breakers show
//!   up in status queries and admin actions

use futures_util::future::join_all;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use tokio::time::Instant;

use crate::clock::{millis, now_millis};
use crate::config::HealthConfig;
use crate::health::checks::HealthCheck;
use crate::health::status::{derive_overall, HealthStatus, ServiceHealth};
use crate::observability::metrics;
use crate::resilience::registry::CircuitBreakerRegistry;
use crate::resilience::retries::RetryExecutor;

/// Prefix of the breaker name each check runs under.
pub const BREAKER_PREFIX: &str = "health-";

pub struct HealthAggregator {
    checks: RwLock<BTreeMap<String, HealthCheck>>,
    registry: Arc<CircuitBreakerRegistry>,
    retries: RetryExecutor,
    config: HealthConfig,
    started_at: Instant,
}

impl HealthAggregator {
    pub fn new(
        registry: Arc<CircuitBreakerRegistry>,
        retries: RetryExecutor,
        config: HealthConfig,
    ) -> Self {
        Self {
            checks: RwLock::new(BTreeMap::new()),
            registry,
            retries,
            config,
            started_at: Instant::now(),
        }
    }

    /// Register `check` under `name`, replacing any previous check.
    pub fn register_check(&self, name: impl Into<String>, check: HealthCheck) {
        let name = name.into();
        let replaced = self
            .checks
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .insert(name.clone(), check)
            .is_some();
        tracing::debug!(check = %name, replaced, "Health check registered");
    }

    /// Remove the check named `name`. Returns `false` if it was not registered.
    pub fn unregister_check(&self, name: &str) -> bool {
        self.checks
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .remove(name)
            .is_some()
    }

    /// Registered check names, sorted.
    pub fn check_names(&self) -> Vec<String> {
        self.checks
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .keys()
            .cloned()
            .collect()
    }

    pub fn registry(&self) -> &Arc<CircuitBreakerRegistry> {
        &self.registry
    }

    /// Run every registered check and derive the overall status.
    pub async fn get_health_status(&self) -> HealthStatus {
        let checks: Vec<(String, HealthCheck)> = self
            .checks
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .iter()
            .map(|(name, check)| (name.clone(), check.clone()))
            .collect();

        let services: BTreeMap<String, ServiceHealth> = if self.config.concurrent {
            join_all(checks.into_iter().map(|(name, check)| async move {
                let health = self.run_check(&name, &check).await;
                (name, health)
            }))
            .await
            .into_iter()
            .collect()
        } else {
            let mut services = BTreeMap::new();
            for (name, check) in checks {
                let health = self.run_check(&name, &check).await;
                services.insert(name, health);
            }
            services
        };

        let status = derive_overall(services.values());
        metrics::record_health_status(status, &services);

        HealthStatus {
            status,
            services,
            timestamp: now_millis(),
            uptime: self.started_at.elapsed(),
        }
    }

    async fn run_check(&self, name: &str, check: &HealthCheck) -> ServiceHealth {
        let breaker_name = format!("{BREAKER_PREFIX}{name}");
        let started = Instant::now();

        let result = self
            .registry
            .execute_with_protection(
                &breaker_name,
                || {
                    self.retries
                        .execute_with_retry(|| (check.as_ref())(), &self.config.retry)
                },
                Some(&self.config.breaker),
            )
            .await;

        let response_time = started.elapsed();
        let breaker_state = self.registry.get(&breaker_name).map(|b| b.state());

        match result {
            Ok(health) => ServiceHealth {
                response_time: Some(response_time),
                circuit_breaker_state: breaker_state,
                last_check: now_millis(),
                ..health
            },
            Err(e) => {
                tracing::warn!(
                    check = %name,
                    error = %e,
                    response_time_ms = millis(response_time),
                    "Health check failed"
                );
                ServiceHealth {
                    circuit_breaker_state: breaker_state,
                    ..ServiceHealth::down(e.to_string())
                }
            }
        }
    }
}

impl std::fmt::Debug for HealthAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthAggregator")
            .field("checks", &self.check_names())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::checks::{check_fn, ping_check, HealthCheckError};
    use crate::health::status::{OverallStatus, ServiceStatus};
    use crate::resilience::circuit_breaker::CircuitState;
    use std::io;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn aggregator() -> HealthAggregator {
        HealthAggregator::new(
            Arc::new(CircuitBreakerRegistry::default()),
            RetryExecutor::default(),
            HealthConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_empty_is_healthy() {
        let health = aggregator().get_health_status().await;
        assert_eq!(health.status, OverallStatus::Healthy);
        assert!(health.services.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_down_is_degraded() {
        let agg = aggregator();
        agg.register_check("db", ping_check(|| async { Ok::<_, io::Error>(()) }));
        agg.register_check(
            "cache",
            ping_check(|| async { Err::<(), _>(io::Error::other("ECONNREFUSED")) }),
        );

        let health = agg.get_health_status().await;
        assert_eq!(health.status, OverallStatus::Degraded);
        assert_eq!(health.services["db"].status, ServiceStatus::Up);
        assert_eq!(health.services["db"].circuit_breaker_state, Some(CircuitState::Closed));
        assert!(health.services["db"].response_time.is_some());

        let cache = &health.services["cache"];
        assert_eq!(cache.status, ServiceStatus::Down);
        assert_eq!(cache.error.as_deref(), Some("ECONNREFUSED"));
        assert_eq!(cache.circuit_breaker_state, Some(CircuitState::Closed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_check_retried_then_breaker_opens() {
        let agg = aggregator();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        agg.register_check(
            "search",
            ping_check(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(io::Error::other("Service Unavailable")) }
            }),
        );

        for _ in 0..3 {
            agg.get_health_status().await;
        }
        // Two attempts per run, three runs reach the health threshold.
        assert_eq!(calls.load(Ordering::SeqCst), 6);

        let health = agg.get_health_status().await;
        let search = &health.services["search"];
        assert_eq!(health.status, OverallStatus::Unhealthy);
        assert_eq!(search.circuit_breaker_state, Some(CircuitState::Open));
        assert!(search.error.as_deref().unwrap().contains("health-search"));
        assert_eq!(calls.load(Ordering::SeqCst), 6);

        let breaker = agg.registry().get("health-search").unwrap();
        assert_eq!(breaker.config().failure_threshold, 3);
        assert_eq!(breaker.config().recovery_timeout, Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_register_overwrites_and_unregister() {
        let agg = aggregator();
        agg.register_check(
            "queue",
            check_fn(|| async { Err(HealthCheckError::new("nope")) }),
        );
        agg.register_check(
            "queue",
            check_fn(|| async { Ok(ServiceHealth::degraded("lagging")) }),
        );
        assert_eq!(agg.check_names(), vec!["queue"]);

        let health = agg.get_health_status().await;
        assert_eq!(health.services["queue"].status, ServiceStatus::Degraded);
        assert_eq!(health.status, OverallStatus::Degraded);

        assert!(agg.unregister_check("queue"));
        assert!(!agg.unregister_check("queue"));
        assert!(agg.check_names().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sequential_mode() {
        let agg = HealthAggregator::new(
            Arc::new(CircuitBreakerRegistry::default()),
            RetryExecutor::default(),
            HealthConfig {
                concurrent: false,
                ..HealthConfig::default()
            },
        );
        agg.register_check(
            "slow",
            check_fn(|| async {
                tokio::time::sleep(Duration::from_millis(100)).await;
                Ok(ServiceHealth::up())
            }),
        );
        agg.register_check(
            "slower",
            check_fn(|| async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok(ServiceHealth::up())
            }),
        );

        let start = Instant::now();
        let health = agg.get_health_status().await;
        assert!(start.elapsed() >= Duration::from_millis(300));
        let slower = health.services["slower"].response_time.unwrap();
        assert!(slower >= Duration::from_millis(200) && slower <= Duration::from_millis(205));
        assert_eq!(health.status, OverallStatus::Healthy);
    }
}

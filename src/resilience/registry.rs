//! Circuit breaker registry.
//!
//! # Responsibilities
//! - Own one breaker per dependency name, created on first use
//! - Resolve per-dependency config (explicit > configured override > default)
//! - Route protected calls and administrative actions by name
//!
//! # Design Decisions
//! - Explicitly owned and shared via `Arc`, never a global
//! - Entries are never evicted
//! - `DashMap::entry` serializes concurrent first use of the same name

use dashmap::DashMap;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;

use crate::config::{CircuitBreakerConfig, CircuitBreakerOverride};
use crate::resilience::circuit_breaker::{CircuitBreaker, CircuitBreakerStatus};
use crate::resilience::error::CallError;
use crate::resilience::events::{EventSink, NoopSink};

/// Keyed collection of circuit breakers.
pub struct CircuitBreakerRegistry {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    default_config: CircuitBreakerConfig,
    overrides: HashMap<String, CircuitBreakerOverride>,
    events: Arc<dyn EventSink>,
}

impl CircuitBreakerRegistry {
    /// Create an empty registry using `default_config` for new breakers.
    pub fn new(default_config: CircuitBreakerConfig) -> Self {
        Self {
            breakers: DashMap::new(),
            default_config,
            overrides: HashMap::new(),
            events: Arc::new(NoopSink),
        }
    }

    /// Per-dependency overrides applied when a breaker is first created.
    pub fn with_overrides(mut self, overrides: HashMap<String, CircuitBreakerOverride>) -> Self {
        self.overrides = overrides;
        self
    }

    /// Sink handed to every breaker created from now on.
    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Config a new breaker named `name` would get without an explicit one.
    pub fn config_for(&self, name: &str) -> CircuitBreakerConfig {
        match self.overrides.get(name) {
            Some(over) => self.default_config.apply_override(over),
            None => self.default_config.clone(),
        }
    }

    /// Return the breaker for `name`, creating it with `config` (or the
    /// resolved default) if it does not exist yet. `config` is ignored for
    /// existing breakers.
    pub fn get_or_create(
        &self,
        name: &str,
        config: Option<&CircuitBreakerConfig>,
    ) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.get(name) {
            return existing.value().clone();
        }

        self.breakers
            .entry(name.to_string())
            .or_insert_with(|| {
                let config = config.cloned().unwrap_or_else(|| self.config_for(name));
                tracing::info!(
                    dependency = %name,
                    failure_threshold = config.failure_threshold,
                    recovery_timeout_ms = crate::clock::millis(config.recovery_timeout),
                    "Circuit breaker created"
                );
                Arc::new(CircuitBreaker::with_events(name, config, self.events.clone()))
            })
            .value()
            .clone()
    }

    /// Existing breaker for `name`, if any.
    pub fn get(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(name).map(|entry| entry.value().clone())
    }

    /// Run `operation` through the breaker for `name`.
    pub async fn execute_with_protection<F, Fut, T, E>(
        &self,
        name: &str,
        operation: F,
        config: Option<&CircuitBreakerConfig>,
    ) -> Result<T, CallError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let breaker = self.get_or_create(name, config);
        breaker.execute(operation).await
    }

    /// Status snapshot of every known breaker, sorted by name.
    pub fn get_all_status(&self) -> BTreeMap<String, CircuitBreakerStatus> {
        self.breakers
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().status()))
            .collect()
    }

    /// Reset the named breaker. Returns `false` for unknown names.
    pub fn reset(&self, name: &str) -> bool {
        match self.get(name) {
            Some(breaker) => {
                breaker.reset();
                true
            }
            None => false,
        }
    }

    /// Force the named breaker open. Returns `false` for unknown names.
    pub fn force_open(&self, name: &str) -> bool {
        match self.get(name) {
            Some(breaker) => {
                breaker.force_open();
                true
            }
            None => false,
        }
    }

    /// Names of all known breakers, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.breakers.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }
}

impl Default for CircuitBreakerRegistry {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

impl std::fmt::Debug for CircuitBreakerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreakerRegistry")
            .field("breakers", &self.names())
            .field("default_config", &self.default_config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::circuit_breaker::CircuitState;
    use std::io;
    use std::time::Duration;

    #[test]
    fn test_get_or_create_is_idempotent() {
        let registry = CircuitBreakerRegistry::default();
        let a = registry.get_or_create("db", None);
        let b = registry.get_or_create(
            "db",
            Some(&CircuitBreakerConfig {
                failure_threshold: 1,
                ..Default::default()
            }),
        );
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(b.config().failure_threshold, 5);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_override_applies_to_new_breakers() {
        let mut overrides = HashMap::new();
        overrides.insert(
            "postgres".to_string(),
            CircuitBreakerOverride {
                failure_threshold: Some(10),
                ..Default::default()
            },
        );
        let registry = CircuitBreakerRegistry::default().with_overrides(overrides);

        assert_eq!(registry.get_or_create("postgres", None).config().failure_threshold, 10);
        assert_eq!(registry.get_or_create("redis", None).config().failure_threshold, 5);
    }

    #[test]
    fn test_reset_and_force_open_unknown_name() {
        let registry = CircuitBreakerRegistry::default();
        assert!(!registry.reset("missing"));
        assert!(!registry.force_open("missing"));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_admin_actions_on_known_breaker() {
        let registry = CircuitBreakerRegistry::default();
        registry.get_or_create("cache", None);

        assert!(registry.force_open("cache"));
        assert_eq!(registry.get("cache").unwrap().state(), CircuitState::Open);

        let result = registry
            .execute_with_protection("cache", || async { Ok::<_, io::Error>(1) }, None)
            .await;
        assert!(result.unwrap_err().is_open());

        assert!(registry.reset("cache"));
        let value = registry
            .execute_with_protection("cache", || async { Ok::<_, io::Error>(1) }, None)
            .await
            .unwrap();
        assert_eq!(value, 1);
    }

    #[tokio::test]
    async fn test_get_all_status() {
        let registry = CircuitBreakerRegistry::default();
        let _ = registry
            .execute_with_protection(
                "broker",
                || async { Err::<(), _>(io::Error::other("ETIMEDOUT")) },
                None,
            )
            .await;
        registry.get_or_create("auth", None);

        let all = registry.get_all_status();
        assert_eq!(all.keys().collect::<Vec<_>>(), vec!["auth", "broker"]);
        assert_eq!(all["broker"].failure_count, 1);
        assert_eq!(all["broker"].service_name, "broker");
        assert_eq!(all["auth"].state, CircuitState::Closed);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_use_creates_one_breaker() {
        let registry = Arc::new(CircuitBreakerRegistry::default());
        let mut handles = Vec::new();
        for _ in 0..32 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move { registry.get_or_create("rpc", None) }));
        }

        let mut breakers = Vec::new();
        for handle in handles {
            breakers.push(handle.await.unwrap());
        }
        assert_eq!(registry.len(), 1);
        assert!(breakers.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_failures_are_not_lost() {
        let registry = Arc::new(CircuitBreakerRegistry::new(CircuitBreakerConfig {
            failure_threshold: 1000,
            recovery_timeout: Duration::from_secs(30),
            ..Default::default()
        }));

        let mut handles = Vec::new();
        for _ in 0..64 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                registry
                    .execute_with_protection(
                        "rpc",
                        || async {
                            tokio::task::yield_now().await;
                            Err::<(), _>(io::Error::other("Service Unavailable"))
                        },
                        None,
                    )
                    .await
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().is_err());
        }
        assert_eq!(registry.get("rpc").unwrap().status().failure_count, 64);
    }
}

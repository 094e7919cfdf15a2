//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the
//! resilience core. All types derive Serde traits for deserialization from
//! config files. Durations are written in milliseconds (`*_ms` keys).

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::clock::{serde_millis, serde_millis_opt};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ResilienceConfig {
    /// Defaults for every breaker the registry creates.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Default retry policy for protected calls.
    pub retries: RetryConfig,

    /// Health aggregation settings.
    pub health: HealthConfig,

    /// Per-dependency breaker overrides, keyed by dependency name.
    pub dependencies: HashMap<String, CircuitBreakerOverride>,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin API settings.
    pub admin: AdminConfig,
}

/// Circuit breaker configuration. Immutable once a breaker is created.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Failures (without an intervening success) before the circuit opens.
    pub failure_threshold: u32,

    /// How long the circuit stays open before a trial call is allowed.
    #[serde(rename = "recovery_timeout_ms", with = "serde_millis")]
    pub recovery_timeout: Duration,

    /// Observation window reported to dashboards.
    #[serde(rename = "monitoring_period_ms", with = "serde_millis")]
    pub monitoring_period: Duration,

    /// Error rate the dependency is expected to tolerate (0.0 to 1.0).
    pub expected_error_rate: f64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(30),
            monitoring_period: Duration::from_secs(60),
            expected_error_rate: 0.1,
        }
    }
}

impl CircuitBreakerConfig {
    /// Tighter thresholds used for health checks.
    pub fn for_health_checks() -> Self {
        Self {
            failure_threshold: 3,
            recovery_timeout: Duration::from_secs(10),
            monitoring_period: Duration::from_secs(30),
            expected_error_rate: 0.2,
        }
    }

    /// Merge a partial override on top of this config.
    pub fn apply_override(&self, over: &CircuitBreakerOverride) -> Self {
        Self {
            failure_threshold: over.failure_threshold.unwrap_or(self.failure_threshold),
            recovery_timeout: over
                .recovery_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(self.recovery_timeout),
            monitoring_period: over
                .monitoring_period_ms
                .map(Duration::from_millis)
                .unwrap_or(self.monitoring_period),
            expected_error_rate: over.expected_error_rate.unwrap_or(self.expected_error_rate),
        }
    }
}

/// Partial breaker configuration declared at a call site or per dependency.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerOverride {
    pub failure_threshold: Option<u32>,
    pub recovery_timeout_ms: Option<u64>,
    pub monitoring_period_ms: Option<u64>,
    pub expected_error_rate: Option<f64>,
}

impl CircuitBreakerOverride {
    /// Returns true when no key is overridden.
    pub fn is_empty(&self) -> bool {
        self.failure_threshold.is_none()
            && self.recovery_timeout_ms.is_none()
            && self.monitoring_period_ms.is_none()
            && self.expected_error_rate.is_none()
    }
}

/// Retry configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts including the first one.
    pub max_attempts: u32,

    /// Delay before the second attempt.
    #[serde(rename = "base_delay_ms", with = "serde_millis")]
    pub base_delay: Duration,

    /// Upper bound for any single delay.
    #[serde(rename = "max_delay_ms", with = "serde_millis")]
    pub max_delay: Duration,

    /// Growth factor between consecutive delays.
    pub backoff_multiplier: f64,

    /// Perturb each delay by up to ±25%.
    pub jitter: bool,

    /// Message fragments that mark an error as transient (case-insensitive).
    pub retryable_markers: Vec<String>,

    /// Stop retrying once the next delay would overrun this budget.
    #[serde(
        rename = "max_elapsed_ms",
        with = "serde_millis_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_elapsed: Option<Duration>,
}

/// Error message fragments treated as transient by default.
pub const DEFAULT_RETRYABLE_MARKERS: &[&str] = &[
    "ECONNREFUSED",
    "ETIMEDOUT",
    "ENOTFOUND",
    "Service Unavailable",
    "Internal Server Error",
    "connection refused",
    "timed out",
];

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30_000),
            backoff_multiplier: 2.0,
            jitter: true,
            retryable_markers: DEFAULT_RETRYABLE_MARKERS
                .iter()
                .map(|m| m.to_string())
                .collect(),
            max_elapsed: None,
        }
    }
}

impl RetryConfig {
    /// Policy used by the health aggregator.
    pub fn for_health_checks() -> Self {
        Self {
            max_attempts: 2,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_millis(2000),
            ..Self::default()
        }
    }

    /// A single attempt, no retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Merge a partial override on top of this policy.
    pub fn apply_override(&self, over: &RetryOverride) -> Self {
        Self {
            max_attempts: over.max_attempts.unwrap_or(self.max_attempts),
            base_delay: over
                .base_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(self.base_delay),
            max_delay: over
                .max_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(self.max_delay),
            backoff_multiplier: over.backoff_multiplier.unwrap_or(self.backoff_multiplier),
            jitter: over.jitter.unwrap_or(self.jitter),
            retryable_markers: over
                .retryable_markers
                .clone()
                .unwrap_or_else(|| self.retryable_markers.clone()),
            max_elapsed: over
                .max_elapsed_ms
                .map(Duration::from_millis)
                .or(self.max_elapsed),
        }
    }
}

/// Partial retry policy; unset keys keep the base policy's values.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryOverride {
    pub max_attempts: Option<u32>,
    pub base_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
    pub backoff_multiplier: Option<f64>,
    pub jitter: Option<bool>,
    pub retryable_markers: Option<Vec<String>>,
    pub max_elapsed_ms: Option<u64>,
}

/// Health aggregation configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Breaker settings for `health-<name>` breakers. Keys left out of the
    /// table keep the health defaults, not the general breaker defaults.
    #[serde(
        default = "CircuitBreakerConfig::for_health_checks",
        deserialize_with = "health_breaker"
    )]
    pub breaker: CircuitBreakerConfig,

    /// Retry policy wrapped around each check, merged the same way.
    #[serde(
        default = "RetryConfig::for_health_checks",
        deserialize_with = "health_retry"
    )]
    pub retry: RetryConfig,

    /// Run checks concurrently instead of one at a time.
    pub concurrent: bool,

    /// TCP reachability checks registered at startup.
    pub checks: Vec<HealthCheckTarget>,
}

fn health_breaker<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<CircuitBreakerConfig, D::Error> {
    let over = CircuitBreakerOverride::deserialize(deserializer)?;
    Ok(CircuitBreakerConfig::for_health_checks().apply_override(&over))
}

fn health_retry<'de, D: Deserializer<'de>>(deserializer: D) -> Result<RetryConfig, D::Error> {
    let over = RetryOverride::deserialize(deserializer)?;
    Ok(RetryConfig::for_health_checks().apply_override(&over))
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            breaker: CircuitBreakerConfig::for_health_checks(),
            retry: RetryConfig::for_health_checks(),
            concurrent: true,
            checks: Vec::new(),
        }
    }
}

/// A TCP reachability check declared in the config file.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HealthCheckTarget {
    /// Dependency name reported in the health output.
    pub name: String,

    /// Address to connect to (e.g., "127.0.0.1:5432").
    pub address: String,

    /// Connect timeout in milliseconds.
    #[serde(default = "default_check_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_check_timeout_ms() -> u64 {
    2000
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of the human-readable format.
    pub json_logs: bool,

    /// Enable the Prometheus scrape endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Serve the admin API.
    pub enabled: bool,

    /// Admin API bind address.
    pub bind_address: String,

    /// Bearer token required for `/admin/*` routes. Unset disables auth.
    pub api_key: Option<String>,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: "127.0.0.1:8081".to_string(),
            api_key: None,
        }
    }
}

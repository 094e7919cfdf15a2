//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (thresholds ≥ 1, rates in [0, 1], delays ordered)
//! - Check bind addresses parse

use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::{CircuitBreakerConfig, ResilienceConfig, RetryConfig};

/// A single semantic problem found in a config file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Validate a loaded configuration, collecting every problem found.
pub fn validate_config(config: &ResilienceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    validate_breaker("circuit_breaker", &config.circuit_breaker, &mut errors);
    validate_breaker("health.breaker", &config.health.breaker, &mut errors);
    validate_retry("retries", &config.retries, &mut errors);
    validate_retry("health.retry", &config.health.retry, &mut errors);

    for (name, over) in &config.dependencies {
        let merged = config.circuit_breaker.apply_override(over);
        validate_breaker(&format!("dependencies.{}", name), &merged, &mut errors);
    }

    for (i, check) in config.health.checks.iter().enumerate() {
        if check.name.trim().is_empty() {
            errors.push(ValidationError::new(
                format!("health.checks[{}].name", i),
                "must not be empty",
            ));
        }
        if check.timeout_ms == 0 {
            errors.push(ValidationError::new(
                format!("health.checks[{}].timeout_ms", i),
                "must be greater than 0",
            ));
        }
    }

    if config.admin.enabled && config.admin.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "admin.bind_address",
            format!("'{}' is not a socket address", config.admin.bind_address),
        ));
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_breaker(prefix: &str, config: &CircuitBreakerConfig, errors: &mut Vec<ValidationError>) {
    if config.failure_threshold == 0 {
        errors.push(ValidationError::new(
            format!("{}.failure_threshold", prefix),
            "must be at least 1",
        ));
    }
    if !(0.0..=1.0).contains(&config.expected_error_rate) {
        errors.push(ValidationError::new(
            format!("{}.expected_error_rate", prefix),
            "must be between 0.0 and 1.0",
        ));
    }
}

fn validate_retry(prefix: &str, config: &RetryConfig, errors: &mut Vec<ValidationError>) {
    if config.max_attempts == 0 {
        errors.push(ValidationError::new(
            format!("{}.max_attempts", prefix),
            "must be at least 1",
        ));
    }
    if !config.backoff_multiplier.is_finite() || config.backoff_multiplier < 1.0 {
        errors.push(ValidationError::new(
            format!("{}.backoff_multiplier", prefix),
            "must be a finite number >= 1.0",
        ));
    }
    if config.base_delay > config.max_delay {
        errors.push(ValidationError::new(
            format!("{}.base_delay_ms", prefix),
            "must not exceed max_delay_ms",
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::CircuitBreakerOverride;
    use std::time::Duration;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&ResilienceConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = ResilienceConfig::default();
        config.circuit_breaker.failure_threshold = 0;
        config.retries.max_attempts = 0;
        config.retries.base_delay = Duration::from_secs(10);
        config.retries.max_delay = Duration::from_secs(1);

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"circuit_breaker.failure_threshold"));
        assert!(fields.contains(&"retries.max_attempts"));
        assert!(fields.contains(&"retries.base_delay_ms"));
    }

    #[test]
    fn test_dependency_override_is_validated() {
        let mut config = ResilienceConfig::default();
        config.dependencies.insert(
            "broker".to_string(),
            CircuitBreakerOverride {
                expected_error_rate: Some(1.5),
                ..Default::default()
            },
        );

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "dependencies.broker.expected_error_rate");
    }

    #[test]
    fn test_bad_bind_address() {
        let mut config = ResilienceConfig::default();
        config.admin.bind_address = "not-an-address".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "admin.bind_address");
    }
}

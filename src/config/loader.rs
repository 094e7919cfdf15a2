//! Configuration loading from disk.

use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::config::schema::ResilienceConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<ResilienceConfig, ConfigError> {
    let config: ResilienceConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ResilienceConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_missing_file() {
        let err = load_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_parse_error() {
        let err = parse_config("circuit_breaker = 12").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_sample_config_parses() {
        let config = parse_config(include_str!("../../resilience.toml")).unwrap();
        assert_eq!(config.dependencies["postgres"].failure_threshold, Some(3));
        assert_eq!(config.health.checks.len(), 2);
        assert_eq!(config.health.checks[1].timeout_ms, 2000);
        assert_eq!(config.health.retry.max_attempts, 2);
        assert!(config.admin.api_key.is_none());
    }

    #[test]
    fn test_partial_health_tables_keep_health_defaults() {
        let config = parse_config(
            "[health.breaker]\nfailure_threshold = 4\n[health.retry]\nmax_attempts = 3\n",
        )
        .unwrap();

        let breaker = &config.health.breaker;
        assert_eq!(breaker.failure_threshold, 4);
        assert_eq!(breaker.recovery_timeout, Duration::from_secs(10));
        assert_eq!(breaker.monitoring_period, Duration::from_secs(30));
        assert_eq!(breaker.expected_error_rate, 0.2);

        let retry = &config.health.retry;
        assert_eq!(retry.max_attempts, 3);
        assert_eq!(retry.base_delay, Duration::from_millis(500));
        assert_eq!(retry.max_delay, Duration::from_millis(2000));

        // Only the general sections fall back to the general defaults.
        assert_eq!(config.circuit_breaker.recovery_timeout, Duration::from_secs(30));
        assert_eq!(config.retries.base_delay, Duration::from_millis(1000));
    }

    #[test]
    fn test_health_section_without_tables() {
        let config = parse_config("[health]\nconcurrent = false\n").unwrap();
        assert!(!config.health.concurrent);
        assert_eq!(config.health.breaker, crate::config::CircuitBreakerConfig::for_health_checks());
        assert_eq!(config.health.retry, crate::config::RetryConfig::for_health_checks());
    }

    #[test]
    fn test_validation_error_message() {
        let err = parse_config("[retries]\nmax_attempts = 0\n").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Validation failed: retries.max_attempts: must be at least 1"
        );
    }
}

//! Health result types and overall status derivation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use crate::clock::{now_millis, serde_millis, serde_millis_opt};
use crate::resilience::circuit_breaker::CircuitState;

/// Status of a single dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Up,
    Down,
    Degraded,
}

/// Status of the whole service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl OverallStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Unhealthy => "unhealthy",
        }
    }

    /// Gauge value: 1 healthy, 0.5 degraded, 0 unhealthy.
    pub fn as_metric_value(self) -> f64 {
        match self {
            Self::Healthy => 1.0,
            Self::Degraded => 0.5,
            Self::Unhealthy => 0.0,
        }
    }
}

impl fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one health check run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceHealth {
    pub status: ServiceStatus,

    #[serde(
        default,
        with = "serde_millis_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub response_time: Option<Duration>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub circuit_breaker_state: Option<CircuitState>,

    /// Unix epoch milliseconds.
    pub last_check: u64,
}

impl ServiceHealth {
    pub fn up() -> Self {
        Self::with_status(ServiceStatus::Up, None)
    }

    pub fn degraded(reason: impl Into<String>) -> Self {
        Self::with_status(ServiceStatus::Degraded, Some(reason.into()))
    }

    pub fn down(error: impl Into<String>) -> Self {
        Self::with_status(ServiceStatus::Down, Some(error.into()))
    }

    fn with_status(status: ServiceStatus, error: Option<String>) -> Self {
        Self {
            status,
            response_time: None,
            error,
            circuit_breaker_state: None,
            last_check: now_millis(),
        }
    }
}

/// Aggregated health of all registered checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub status: OverallStatus,
    pub services: BTreeMap<String, ServiceHealth>,
    /// Unix epoch milliseconds.
    pub timestamp: u64,
    #[serde(with = "serde_millis")]
    pub uptime: Duration,
}

impl HealthStatus {
    pub fn is_unhealthy(&self) -> bool {
        self.status == OverallStatus::Unhealthy
    }
}

/// Fold per-service results into an overall status.
///
/// More than half down is unhealthy; exactly half is only degraded.
pub fn derive_overall<'a, I>(services: I) -> OverallStatus
where
    I: IntoIterator<Item = &'a ServiceHealth>,
{
    let (mut total, mut down, mut degraded) = (0usize, 0usize, 0usize);
    for health in services {
        total += 1;
        match health.status {
            ServiceStatus::Down => down += 1,
            ServiceStatus::Degraded => degraded += 1,
            ServiceStatus::Up => {}
        }
    }

    if total == 0 {
        OverallStatus::Healthy
    } else if down * 2 > total {
        OverallStatus::Unhealthy
    } else if down > 0 || degraded > 0 {
        OverallStatus::Degraded
    } else {
        OverallStatus::Healthy
    }
}

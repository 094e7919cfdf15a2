//! Metrics collection and exposition.
//!
//! # Metrics
//! - `resilience_circuit_state` (gauge): 0=closed, 1=open, 2=half-open, per dependency
//! - `resilience_calls_total` (counter): protected calls by dependency and outcome
//! - `resilience_rejected_total` (counter): fast failures by dependency
//! - `resilience_retries_total` (counter): scheduled retries
//! - `resilience_health_status` (gauge): 1=healthy, 0.5=degraded, 0=unhealthy
//! - `resilience_service_status` (gauge): 1=up, 0.5=degraded, 0=down, per check

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::Duration;

use crate::health::status::{OverallStatus, ServiceHealth, ServiceStatus};
use crate::resilience::circuit_breaker::CircuitState;
use crate::resilience::events::EventSink;

/// Install the Prometheus recorder and serve `/metrics` on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// [`EventSink`] that records breaker and retry activity as metrics.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsSink;

impl EventSink for MetricsSink {
    fn state_changed(&self, dependency: &str, _from: CircuitState, to: CircuitState) {
        metrics::gauge!("resilience_circuit_state", "dependency" => dependency.to_string())
            .set(to.as_metric_value());
    }

    fn call_rejected(&self, dependency: &str) {
        metrics::counter!("resilience_rejected_total", "dependency" => dependency.to_string())
            .increment(1);
    }

    fn call_completed(&self, dependency: &str, success: bool) {
        let outcome = if success { "success" } else { "failure" };
        metrics::counter!(
            "resilience_calls_total",
            "dependency" => dependency.to_string(),
            "outcome" => outcome
        )
        .increment(1);
    }

    fn retry_scheduled(&self, _attempt: u32, _delay: Duration, _error: &str) {
        metrics::counter!("resilience_retries_total").increment(1);
    }
}

/// Record the result of a health aggregation run.
pub fn record_health_status(status: OverallStatus, services: &BTreeMap<String, ServiceHealth>) {
    metrics::gauge!("resilience_health_status").set(status.as_metric_value());

    for (name, health) in services {
        let value = match health.status {
            ServiceStatus::Up => 1.0,
            ServiceStatus::Degraded => 0.5,
            ServiceStatus::Down => 0.0,
        };
        metrics::gauge!("resilience_service_status", "service" => name.clone()).set(value);
    }
}

//! Notification hooks for breaker transitions and retries.
//!
//! The core logs through `tracing` unconditionally; an `EventSink` is the
//! optional side channel for metrics or dashboards. Every method defaults to
//! a no-op so sinks implement only what they care about.

use std::time::Duration;

use crate::resilience::circuit_breaker::CircuitState;

pub trait EventSink: Send + Sync {
    /// A breaker moved between states.
    fn state_changed(&self, _dependency: &str, _from: CircuitState, _to: CircuitState) {}

    /// A call was rejected without running.
    fn call_rejected(&self, _dependency: &str) {}

    /// A protected call finished.
    fn call_completed(&self, _dependency: &str, _success: bool) {}

    /// A retry was scheduled after `attempt` failed.
    fn retry_scheduled(&self, _attempt: u32, _delay: Duration, _error: &str) {}
}

/// Sink that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl EventSink for NoopSink {}

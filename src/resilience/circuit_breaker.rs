//! Circuit breaker for dependency protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: dependency assumed down, calls fail fast
//! - Half-Open: a single trial call tests whether it recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: failure_count >= failure_threshold
//! Open → Half-Open: first call after next_attempt_time
//! Half-Open → Closed: trial call succeeds
//! Half-Open → Open: trial call fails
//! ```
//!
//! # Design Decisions
//! - Per-dependency circuit breaker (not global)
//! - Fail fast in Open state (operation is never invoked)
//! - Single trial in Half-Open: concurrent callers are rejected until the
//!   trial settles; a dropped trial releases its slot
//! - State lives behind one mutex that is never held across an await

use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

use crate::clock::{millis, ClockAnchor};
use crate::config::CircuitBreakerConfig;
use crate::resilience::error::{CallError, OpenCircuitError};
use crate::resilience::events::{EventSink, NoopSink};

/// Circuit breaker state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(self) -> &'static str {
        match self {
            CircuitState::Closed => "CLOSED",
            CircuitState::Open => "OPEN",
            CircuitState::HalfOpen => "HALF_OPEN",
        }
    }

    /// Gauge value (0=Closed, 1=Open, 2=HalfOpen).
    pub fn as_metric_value(self) -> f64 {
        match self {
            CircuitState::Closed => 0.0,
            CircuitState::Open => 1.0,
            CircuitState::HalfOpen => 2.0,
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of a breaker, serialized for status queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitBreakerStatus {
    pub service_name: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u64,
    /// Epoch milliseconds.
    pub last_failure_time: Option<u64>,
    /// Epoch milliseconds; only set while open.
    pub next_attempt_time: Option<u64>,
    pub is_available: bool,
}

struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    success_count: u64,
    last_failure_time: Option<Instant>,
    next_attempt_time: Option<Instant>,
    trial_in_flight: bool,
}

impl BreakerState {
    fn closed() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            last_failure_time: None,
            next_attempt_time: None,
            trial_in_flight: false,
        }
    }
}

type Transition = Option<(CircuitState, CircuitState)>;

/// A state machine guarding calls to one named dependency.
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    state: Mutex<BreakerState>,
    events: Arc<dyn EventSink>,
    anchor: ClockAnchor,
}

impl CircuitBreaker {
    /// Creates a closed breaker for `name`.
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self::with_events(name, config, Arc::new(NoopSink))
    }

    /// Creates a closed breaker that reports to `events`.
    pub fn with_events(
        name: impl Into<String>,
        config: CircuitBreakerConfig,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            name: name.into(),
            config,
            state: Mutex::new(BreakerState::closed()),
            events,
            anchor: ClockAnchor::now(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Current state without side effects.
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Run `operation` under breaker protection.
    ///
    /// Returns `CallError::Open` without invoking `operation` while the
    /// circuit is open, otherwise the operation's result with its error
    /// wrapped unchanged in `CallError::Operation`.
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> Result<T, CallError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let permit = self.admit()?;
        match operation().await {
            Ok(value) => {
                permit.succeed();
                Ok(value)
            }
            Err(e) => {
                permit.fail();
                Err(CallError::Operation(e))
            }
        }
    }

    /// Like [`execute`](Self::execute), but abandons the operation after
    /// `timeout`. A timeout counts as a failure.
    pub async fn execute_with_timeout<F, Fut, T, E>(
        &self,
        operation: F,
        timeout: Duration,
    ) -> Result<T, CallError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let permit = self.admit()?;
        match tokio::time::timeout(timeout, operation()).await {
            Ok(Ok(value)) => {
                permit.succeed();
                Ok(value)
            }
            Ok(Err(e)) => {
                permit.fail();
                Err(CallError::Operation(e))
            }
            Err(_) => {
                tracing::warn!(
                    dependency = %self.name,
                    timeout_ms = millis(timeout),
                    "Protected call timed out"
                );
                permit.fail();
                Err(CallError::Timeout {
                    dependency: self.name.clone(),
                    after: timeout,
                })
            }
        }
    }

    /// Immutable snapshot of the breaker.
    pub fn status(&self) -> CircuitBreakerStatus {
        let inner = self.lock();
        let now = Instant::now();
        let is_available = inner.state != CircuitState::Open
            || inner.next_attempt_time.map_or(true, |at| now >= at);

        CircuitBreakerStatus {
            service_name: self.name.clone(),
            state: inner.state,
            failure_count: inner.failure_count,
            success_count: inner.success_count,
            last_failure_time: inner.last_failure_time.map(|at| self.anchor.unix_millis(at)),
            next_attempt_time: inner.next_attempt_time.map(|at| self.anchor.unix_millis(at)),
            is_available,
        }
    }

    /// Force the circuit closed and clear all counters and timestamps.
    pub fn reset(&self) {
        let transition = {
            let mut inner = self.lock();
            let from = inner.state;
            *inner = BreakerState::closed();
            changed(from, CircuitState::Closed)
        };
        tracing::info!(dependency = %self.name, "Circuit breaker reset");
        self.notify(transition);
    }

    /// Force the circuit open for one recovery timeout.
    pub fn force_open(&self) {
        let transition = {
            let mut inner = self.lock();
            let from = inner.state;
            inner.state = CircuitState::Open;
            inner.next_attempt_time = Some(Instant::now() + self.config.recovery_timeout);
            inner.trial_in_flight = false;
            changed(from, CircuitState::Open)
        };
        tracing::warn!(
            dependency = %self.name,
            recovery_timeout_ms = millis(self.config.recovery_timeout),
            "Circuit breaker forced open"
        );
        self.notify(transition);
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn notify(&self, transition: Transition) {
        if let Some((from, to)) = transition {
            self.events.state_changed(&self.name, from, to);
        }
    }

    /// Decide whether a call may run. The Open → Half-Open check and
    /// transition happen under one lock acquisition.
    fn admit(&self) -> Result<Permit<'_>, OpenCircuitError> {
        let mut inner = self.lock();
        let now = Instant::now();

        // Ok((trial, opened_to_half_open)) or Err(retry_in)
        let admitted = match inner.state {
            CircuitState::Closed => Ok((false, false)),
            CircuitState::Open => match inner.next_attempt_time {
                Some(at) if now < at => Err(Some(at - now)),
                _ => {
                    inner.state = CircuitState::HalfOpen;
                    inner.next_attempt_time = None;
                    inner.trial_in_flight = true;
                    Ok((true, true))
                }
            },
            CircuitState::HalfOpen => {
                if inner.trial_in_flight {
                    Err(None)
                } else {
                    inner.trial_in_flight = true;
                    Ok((true, false))
                }
            }
        };
        drop(inner);

        match admitted {
            Ok((trial, transitioned)) => {
                if transitioned {
                    tracing::info!(dependency = %self.name, "Circuit breaker half-open, admitting trial call");
                    self.notify(Some((CircuitState::Open, CircuitState::HalfOpen)));
                }
                Ok(Permit {
                    breaker: self,
                    trial,
                    settled: false,
                })
            }
            Err(retry_in) => {
                tracing::debug!(dependency = %self.name, "Circuit open, rejecting call");
                self.events.call_rejected(&self.name);
                Err(OpenCircuitError {
                    dependency: self.name.clone(),
                    retry_in,
                })
            }
        }
    }

    fn record_success(&self) {
        let transition = {
            let mut inner = self.lock();
            inner.failure_count = 0;
            inner.success_count += 1;
            if inner.state == CircuitState::HalfOpen {
                inner.state = CircuitState::Closed;
                inner.trial_in_flight = false;
                Some((CircuitState::HalfOpen, CircuitState::Closed))
            } else {
                None
            }
        };

        if transition.is_some() {
            tracing::info!(dependency = %self.name, "Circuit breaker closed, dependency recovered");
        }
        self.events.call_completed(&self.name, true);
        self.notify(transition);
    }

    fn record_failure(&self) {
        let (transition, failures) = {
            let mut inner = self.lock();
            let now = Instant::now();
            inner.failure_count = inner.failure_count.saturating_add(1);
            inner.last_failure_time = Some(now);

            let from = inner.state;
            let trips = match from {
                CircuitState::HalfOpen => true,
                CircuitState::Closed => inner.failure_count >= self.config.failure_threshold,
                // Late completion of a call admitted before the circuit opened:
                // stays open, but the wait restarts from this failure.
                CircuitState::Open => {
                    if inner.failure_count >= self.config.failure_threshold {
                        inner.next_attempt_time = Some(now + self.config.recovery_timeout);
                    }
                    false
                }
            };
            if trips {
                inner.state = CircuitState::Open;
                inner.next_attempt_time = Some(now + self.config.recovery_timeout);
                inner.trial_in_flight = false;
            }
            (trips.then_some((from, CircuitState::Open)), inner.failure_count)
        };

        if let Some((from, _)) = transition {
            tracing::warn!(
                dependency = %self.name,
                failures,
                from = %from,
                recovery_timeout_ms = millis(self.config.recovery_timeout),
                "Circuit breaker opened"
            );
        }
        self.events.call_completed(&self.name, false);
        self.notify(transition);
    }

    /// A trial that never reported back frees its slot for the next caller.
    fn release_trial(&self) {
        let mut inner = self.lock();
        if inner.state == CircuitState::HalfOpen {
            inner.trial_in_flight = false;
        }
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("state", &self.state())
            .field("config", &self.config)
            .finish()
    }
}

fn changed(from: CircuitState, to: CircuitState) -> Transition {
    (from != to).then_some((from, to))
}

/// Admission ticket for one call; settles the outcome exactly once.
struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    trial: bool,
    settled: bool,
}

impl Permit<'_> {
    fn succeed(mut self) {
        self.settled = true;
        self.breaker.record_success();
    }

    fn fail(mut self) {
        self.settled = true;
        self.breaker.record_failure();
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if self.trial && !self.settled {
            self.breaker.release_trial();
        }
    }
}

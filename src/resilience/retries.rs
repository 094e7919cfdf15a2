//! Retry logic.
//!
//! # Responsibilities
//! - Classify errors as transient or permanent
//! - Execute retries with exponential backoff + jitter
//! - Enforce an optional total time budget
//!
//! # Design Decisions
//! - Errors are returned unchanged; exhaustion does not wrap the last error
//! - Permanent errors abort immediately without consuming attempts
//! - Delays are `tokio::time::sleep`, so waiting never blocks a worker

use futures_util::future::BoxFuture;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use tokio::time::Instant;

use crate::clock::millis;
use crate::config::RetryConfig;
use crate::resilience::backoff::calculate_backoff;
use crate::resilience::events::{EventSink, NoopSink};

/// Returns `true` if `message` contains any of `markers` (case-insensitive).
pub fn is_transient(message: &str, markers: &[String]) -> bool {
    let message = message.to_lowercase();
    markers
        .iter()
        .any(|marker| message.contains(&marker.to_lowercase()))
}

/// Stateless retry policy runner.
#[derive(Clone)]
pub struct RetryExecutor {
    events: Arc<dyn EventSink>,
}

impl RetryExecutor {
    pub fn new(events: Arc<dyn EventSink>) -> Self {
        Self { events }
    }

    /// Retry `operation` per `config`, treating errors whose message contains
    /// one of `config.retryable_markers` as transient.
    pub async fn execute_with_retry<F, Fut, T, E>(
        &self,
        operation: F,
        config: &RetryConfig,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let markers = &config.retryable_markers;
        self.execute_with_retry_if(operation, config, |e: &E| {
            is_transient(&e.to_string(), markers)
        })
        .await
    }

    /// Retry `operation` per `config`, asking `should_retry` about each error.
    pub async fn execute_with_retry_if<F, Fut, T, E, P>(
        &self,
        mut operation: F,
        config: &RetryConfig,
        mut should_retry: P,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
        P: FnMut(&E) -> bool,
    {
        let max_attempts = config.max_attempts.max(1);
        let started = Instant::now();
        let mut attempt = 1;

        loop {
            let error = match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::debug!(attempt, "Operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) => e,
            };

            if attempt >= max_attempts {
                tracing::debug!(attempt, max_attempts, error = %error, "Retry attempts exhausted");
                return Err(error);
            }
            if !should_retry(&error) {
                tracing::debug!(attempt, error = %error, "Error is not retryable");
                return Err(error);
            }

            let delay = calculate_backoff(config, attempt);
            if let Some(budget) = config.max_elapsed {
                if started.elapsed() + delay > budget {
                    tracing::debug!(
                        attempt,
                        budget_ms = millis(budget),
                        "Retry budget exhausted"
                    );
                    return Err(error);
                }
            }

            let message = error.to_string();
            self.events.retry_scheduled(attempt, delay, &message);
            tracing::debug!(
                attempt,
                max_attempts,
                delay_ms = millis(delay),
                error = %message,
                "Retrying operation"
            );
            drop(error);

            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// Wrap `operation` so every invocation is retried per `config`.
    ///
    /// The returned closure has the same zero-argument shape and output type
    /// as `operation`, so it can replace it at existing call sites.
    pub fn create_wrapper<F, Fut, T, E>(
        &self,
        operation: F,
        config: RetryConfig,
    ) -> impl Fn() -> BoxFuture<'static, Result<T, E>> + Clone + Send + Sync + 'static
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Display + Send + 'static,
    {
        let operation = Arc::new(operation);
        let config = Arc::new(config);
        let executor = self.clone();

        move || {
            let operation = operation.clone();
            let config = config.clone();
            let executor = executor.clone();
            Box::pin(async move {
                executor
                    .execute_with_retry(|| (operation.as_ref())(), &config)
                    .await
            })
        }
    }
}

impl Default for RetryExecutor {
    fn default() -> Self {
        Self::new(Arc::new(NoopSink))
    }
}

impl std::fmt::Debug for RetryExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryExecutor").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingSink {
        delays: Mutex<Vec<Duration>>,
    }

    impl EventSink for RecordingSink {
        fn retry_scheduled(&self, _attempt: u32, delay: Duration, _error: &str) {
            self.delays.lock().unwrap().push(delay);
        }
    }

    fn fixed(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30_000),
            backoff_multiplier: 2.0,
            jitter: false,
            ..RetryConfig::default()
        }
    }

    #[test]
    fn test_default_markers() {
        let markers = RetryConfig::default().retryable_markers;
        assert!(is_transient("ECONNREFUSED: x", &markers));
        assert!(is_transient("getaddrinfo ENOTFOUND db.internal", &markers));
        assert!(is_transient("503 Service Unavailable", &markers));
        assert!(is_transient("Connection refused (os error 111)", &markers));
        assert!(!is_transient("ValidationError: bad input", &markers));
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_timing_without_jitter() {
        let sink = Arc::new(RecordingSink::default());
        let executor = RetryExecutor::new(sink.clone());
        let attempts = Mutex::new(Vec::new());
        let start = Instant::now();

        let err = executor
            .execute_with_retry(
                || {
                    attempts.lock().unwrap().push(start.elapsed());
                    async { Err::<(), _>(io::Error::other("ECONNREFUSED: x")) }
                },
                &fixed(3),
            )
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "ECONNREFUSED: x");
        let attempts = attempts.lock().unwrap().clone();
        assert_eq!(attempts.len(), 3);
        for (actual, expected_ms) in attempts.iter().zip([0u64, 1000, 3000]) {
            let expected = Duration::from_millis(expected_ms);
            assert!(
                *actual >= expected && *actual <= expected + Duration::from_millis(5),
                "attempt at {:?}, expected ~{:?}",
                actual,
                expected
            );
        }
        assert_eq!(
            *sink.delays.lock().unwrap(),
            vec![Duration::from_millis(1000), Duration::from_millis(2000)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_aborts_immediately() {
        let calls = AtomicU32::new(0);
        let err = RetryExecutor::default()
            .execute_with_retry(
                || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(io::Error::new(io::ErrorKind::InvalidInput, "ValidationError: bad input"))
                },
                &fixed(5),
            )
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let value = RetryExecutor::default()
            .execute_with_retry(
                || async {
                    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(io::Error::other("ETIMEDOUT"))
                    } else {
                        Ok(42)
                    }
                },
                &fixed(3),
            )
            .await
            .unwrap();

        assert_eq!(value, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_predicate() {
        let calls = AtomicU32::new(0);
        let result = RetryExecutor::default()
            .execute_with_retry_if(
                || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(io::Error::other("ValidationError: bad input"))
                },
                &fixed(4),
                |_: &io::Error| true,
            )
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_max_elapsed_stops_early() {
        let calls = AtomicU32::new(0);
        let config = RetryConfig {
            max_elapsed: Some(Duration::from_millis(2500)),
            ..fixed(10)
        };
        let _ = RetryExecutor::default()
            .execute_with_retry(
                || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(io::Error::other("Internal Server Error"))
                },
                &config,
            )
            .await;

        // t=0, t=1000; the next delay (2000ms) would end at 3000ms > 2500ms.
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_wrapper() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let wrapped = RetryExecutor::default().create_wrapper(
            move || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) % 2 == 0 {
                        Err(io::Error::other("Service Unavailable"))
                    } else {
                        Ok("pong")
                    }
                }
            },
            fixed(2),
        );

        assert_eq!(wrapped().await.unwrap(), "pong");
        assert_eq!(wrapped().await.unwrap(), "pong");
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }
}

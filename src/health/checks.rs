//! Health check factories.
//!
//! A check is a shared, zero-argument async function producing a
//! [`ServiceHealth`]. The factories adapt caller-supplied pings: a ping
//! that succeeds yields `up`, a ping that fails yields an error so the
//! aggregator's breaker and retry policy observe the failure.

use futures_util::future::BoxFuture;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;

use crate::health::status::ServiceHealth;

/// A failed health check.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct HealthCheckError {
    pub message: String,
}

impl HealthCheckError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

pub type CheckFuture = BoxFuture<'static, Result<ServiceHealth, HealthCheckError>>;

/// Registered form of a health check.
pub type HealthCheck = Arc<dyn Fn() -> CheckFuture + Send + Sync>;

/// Box an async function as a [`HealthCheck`].
pub fn check_fn<F, Fut>(check: F) -> HealthCheck
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ServiceHealth, HealthCheckError>> + Send + 'static,
{
    Arc::new(move || Box::pin(check()) as CheckFuture)
}

/// `up` if `ping` succeeds, a failure carrying its message otherwise.
pub fn ping_check<F, Fut, T, E>(ping: F) -> HealthCheck
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: 'static,
    E: Display + 'static,
{
    check_fn(move || {
        let ping = ping();
        async move {
            ping
                .await
                .map(|_| ServiceHealth::up())
                .map_err(|e| HealthCheckError::new(e.to_string()))
        }
    })
}

/// Same mapping as [`ping_check`]; `ping` is typically a trivial query.
pub fn database_check<F, Fut, T, E>(ping: F) -> HealthCheck
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: 'static,
    E: Display + 'static,
{
    ping_check(ping)
}

/// `up` only if `ping` replies `PONG`.
pub fn redis_check<F, Fut, R, E>(ping: F) -> HealthCheck
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
    R: AsRef<str> + 'static,
    E: Display + 'static,
{
    check_fn(move || {
        let ping = ping();
        async move {
            let reply = ping.await.map_err(|e| HealthCheckError::new(e.to_string()))?;
            match reply.as_ref() {
                "PONG" => Ok(ServiceHealth::up()),
                other => Err(HealthCheckError::new(format!(
                    "unexpected PING reply: {other:?}"
                ))),
            }
        }
    })
}

/// `up` if a TCP connection to `address` is accepted within `timeout`.
pub fn tcp_check(address: impl Into<String>, timeout: Duration) -> HealthCheck {
    let address: Arc<str> = Arc::from(address.into());
    ping_check(move || {
        let address = address.clone();
        async move {
            match tokio::time::timeout(timeout, TcpStream::connect(address.as_ref())).await {
                Ok(Ok(_stream)) => Ok(()),
                Ok(Err(e)) => Err(HealthCheckError::new(format!("{address}: {e}"))),
                Err(_) => Err(HealthCheckError::new(format!(
                    "{address}: connect timed out after {timeout:?}"
                ))),
            }
        }
    })
}

//! Error types surfaced by protected calls.

use std::time::Duration;
use thiserror::Error;

/// Raised when a call is rejected because the dependency's circuit is open.
///
/// The wrapped operation was not invoked.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("circuit breaker is open for dependency '{dependency}'")]
pub struct OpenCircuitError {
    /// Dependency the breaker guards.
    pub dependency: String,
    /// Time left until a trial call is allowed, if known.
    pub retry_in: Option<Duration>,
}

/// Outcome of a call routed through a circuit breaker.
#[derive(Debug, Error)]
pub enum CallError<E> {
    /// Fast failure; the operation never ran.
    #[error(transparent)]
    Open(#[from] OpenCircuitError),

    /// The operation ran past its deadline and was abandoned.
    #[error("call to dependency '{dependency}' timed out after {after:?}")]
    Timeout { dependency: String, after: Duration },

    /// The operation's own error, unchanged.
    #[error(transparent)]
    Operation(E),
}

impl<E> CallError<E> {
    /// Returns `true` if the call was rejected without running.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open(_))
    }

    /// Returns `true` if the call hit its deadline.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Borrow the operation's error, if that is what failed.
    pub fn operation(&self) -> Option<&E> {
        match self {
            Self::Operation(e) => Some(e),
            _ => None,
        }
    }

    /// Take the operation's error, if that is what failed.
    pub fn into_operation(self) -> Option<E> {
        match self {
            Self::Operation(e) => Some(e),
            _ => None,
        }
    }
}

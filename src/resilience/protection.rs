//! Call-site protection.
//!
//! # Responsibilities
//! - Associate a dependency name and optional config override with a call
//! - Route the call through the registry (and optionally a retry policy)
//! - Offer the same routing as a `tower::Layer` for service stacks
//!
//! # Design Decisions
//! - Plain values passed at the call site instead of attached metadata
//! - The override is merged with the registry's resolved config only when the
//!   breaker is first created; later overrides do not mutate it

use futures_util::future::BoxFuture;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};

use crate::config::{CircuitBreakerConfig, CircuitBreakerOverride, RetryConfig};
use crate::resilience::error::CallError;
use crate::resilience::registry::CircuitBreakerRegistry;
use crate::resilience::retries::RetryExecutor;

/// Declared protection for calls to one dependency.
#[derive(Debug, Clone, PartialEq)]
pub struct Protection {
    dependency: String,
    config_override: Option<CircuitBreakerOverride>,
}

impl Protection {
    pub fn new(dependency: impl Into<String>) -> Self {
        Self {
            dependency: dependency.into(),
            config_override: None,
        }
    }

    pub fn with_override(mut self, config_override: CircuitBreakerOverride) -> Self {
        self.config_override = Some(config_override);
        self
    }

    pub fn dependency(&self) -> &str {
        &self.dependency
    }

    pub fn config_override(&self) -> Option<&CircuitBreakerOverride> {
        self.config_override.as_ref()
    }

    /// Config to create the breaker with, if this protection overrides it.
    pub fn resolve_config(&self, registry: &CircuitBreakerRegistry) -> Option<CircuitBreakerConfig> {
        self.config_override
            .as_ref()
            .filter(|over| !over.is_empty())
            .map(|over| registry.config_for(&self.dependency).apply_override(over))
    }

    /// Run `operation` through the dependency's breaker.
    pub async fn call<F, Fut, T, E>(
        &self,
        registry: &CircuitBreakerRegistry,
        operation: F,
    ) -> Result<T, CallError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let config = self.resolve_config(registry);
        registry
            .execute_with_protection(&self.dependency, operation, config.as_ref())
            .await
    }

    /// Run `operation` with retries inside the dependency's breaker.
    ///
    /// The breaker sees one outcome for the whole retry sequence.
    pub async fn call_with_retry<F, Fut, T, E>(
        &self,
        registry: &CircuitBreakerRegistry,
        retries: &RetryExecutor,
        retry_config: &RetryConfig,
        operation: F,
    ) -> Result<T, CallError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        self.call(registry, || retries.execute_with_retry(operation, retry_config))
            .await
    }
}

/// Applies a [`Protection`] to every request of the wrapped service.
#[derive(Debug, Clone)]
pub struct ProtectionLayer {
    registry: Arc<CircuitBreakerRegistry>,
    protection: Protection,
}

impl ProtectionLayer {
    pub fn new(registry: Arc<CircuitBreakerRegistry>, protection: Protection) -> Self {
        Self {
            registry,
            protection,
        }
    }
}

impl<S> Layer<S> for ProtectionLayer {
    type Service = ProtectedService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ProtectedService {
            inner,
            registry: self.registry.clone(),
            protection: self.protection.clone(),
        }
    }
}

/// Service produced by [`ProtectionLayer`].
#[derive(Debug, Clone)]
pub struct ProtectedService<S> {
    inner: S,
    registry: Arc<CircuitBreakerRegistry>,
    protection: Protection,
}

impl<S, Req> Service<Req> for ProtectedService<S>
where
    S: Service<Req> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Response: Send + 'static,
    S::Error: Send + 'static,
    Req: Send + 'static,
{
    type Response = S::Response;
    type Error = CallError<S::Error>;
    type Future = BoxFuture<'static, Result<S::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(CallError::Operation)
    }

    fn call(&mut self, request: Req) -> Self::Future {
        // The ready service is taken; its clone stays behind for the next call.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let registry = self.registry.clone();
        let protection = self.protection.clone();

        Box::pin(async move {
            protection
                .call(&registry, move || inner.call(request))
                .await
        })
    }
}

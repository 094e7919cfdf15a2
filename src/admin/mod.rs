//! Admin HTTP surface.
//!
//! # Routes
//! - `GET /health`: aggregated health, 503 when unhealthy (never authenticated)
//! - `GET /admin/circuit-breakers`: status of every breaker
//! - `POST /admin/circuit-breakers/{name}/reset`
//! - `POST /admin/circuit-breakers/{name}/force-open`
//!
//! `/admin/*` requires `Authorization: Bearer <api_key>` when a key is configured.

pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::health::aggregator::HealthAggregator;
use crate::lifecycle::shutdown::Shutdown;
use crate::resilience::registry::CircuitBreakerRegistry;
use self::auth::admin_auth_middleware;
use self::handlers::*;

/// State shared by admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub registry: Arc<CircuitBreakerRegistry>,
    pub health: Arc<HealthAggregator>,
    pub api_key: Option<Arc<str>>,
}

impl AdminState {
    pub fn new(
        registry: Arc<CircuitBreakerRegistry>,
        health: Arc<HealthAggregator>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            registry,
            health,
            api_key: api_key.filter(|k| !k.is_empty()).map(Arc::from),
        }
    }
}

pub fn setup_admin_router(state: AdminState) -> Router {
    let protected = Router::new()
        .route("/admin/circuit-breakers", get(get_breakers))
        .route("/admin/circuit-breakers/{name}/reset", post(reset_breaker))
        .route("/admin/circuit-breakers/{name}/force-open", post(force_open_breaker))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            admin_auth_middleware,
        ));

    Router::new()
        .route("/health", get(get_health))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve `router` on `listener` until `shutdown` fires.
pub async fn serve(listener: TcpListener, router: Router, shutdown: Shutdown) -> std::io::Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!(address = %addr, "Admin server starting");

    let mut rx = shutdown.subscribe();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = rx.recv().await;
        })
        .await?;

    tracing::info!("Admin server stopped");
    Ok(())
}

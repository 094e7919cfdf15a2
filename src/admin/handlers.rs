use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::admin::AdminState;
use crate::health::status::HealthStatus;
use crate::resilience::circuit_breaker::CircuitBreakerStatus;

#[derive(Debug, Serialize, Deserialize)]
pub struct ActionResult {
    pub success: bool,
}

pub async fn get_breakers(
    State(state): State<AdminState>,
) -> Json<BTreeMap<String, CircuitBreakerStatus>> {
    Json(state.registry.get_all_status())
}

pub async fn reset_breaker(
    State(state): State<AdminState>,
    Path(name): Path<String>,
) -> (StatusCode, Json<ActionResult>) {
    let success = state.registry.reset(&name);
    tracing::info!(dependency = %name, success, "Admin reset requested");
    action_response(success)
}

pub async fn force_open_breaker(
    State(state): State<AdminState>,
    Path(name): Path<String>,
) -> (StatusCode, Json<ActionResult>) {
    let success = state.registry.force_open(&name);
    tracing::info!(dependency = %name, success, "Admin force-open requested");
    action_response(success)
}

pub async fn get_health(State(state): State<AdminState>) -> (StatusCode, Json<HealthStatus>) {
    let health = state.health.get_health_status().await;
    let code = if health.is_unhealthy() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    (code, Json(health))
}

fn action_response(success: bool) -> (StatusCode, Json<ActionResult>) {
    let code = if success {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    };
    (code, Json(ActionResult { success }))
}

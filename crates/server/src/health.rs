use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use pumpfit_agent::RecommendationEngine;
use serde::Serialize;

#[derive(Clone)]
pub struct HealthState {
    engine: Arc<RecommendationEngine>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub ai_enabled: bool,
    pub provider: &'static str,
    pub checked_at: String,
}

pub fn router(engine: Arc<RecommendationEngine>) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { engine })
}

/// The rules-only path needs nothing external, so the service reports ready even
/// without a reasoning provider.
pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let payload = HealthResponse {
        status: "ready",
        ai_enabled: state.engine.ai_enabled(),
        provider: state.engine.provider_name(),
        checked_at: Utc::now().to_rfc3339(),
    };
    (StatusCode::OK, Json(payload))
}

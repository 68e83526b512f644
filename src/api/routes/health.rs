//! Health endpoint

use axum::{extract::State, Json};

use crate::api::dto::HealthResponse;
use crate::api::state::AppState;

/// Liveness check.
pub async fn healthz(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        hello: "proof chain server".to_string(),
        version: state.config.version.clone(),
    })
}

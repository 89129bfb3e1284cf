//! Health check handlers

use axum::{extract::State, Json};
use serde::Serialize;

use crate::store::ShortfallPolicy;
use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub environment: String,
    pub shortfall_policy: ShortfallPolicy,
}

/// Health check endpoint handler
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        environment: state.config.environment.clone(),
        shortfall_policy: state.store.shortfall_policy(),
    })
}

//! Health route.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(health))
}

/// Runs a fresh cycle; 503 when no model answered.
async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<Value>) {
    let report = state.broadcaster.refresh_health().await;
    let status = if report.is_degraded() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    (
        status,
        Json(json!({
            "serverStatus": "online",
            "timestamp": report.timestamp,
            "models": report.models,
            "availableModels": report.available_models,
        })),
    )
}

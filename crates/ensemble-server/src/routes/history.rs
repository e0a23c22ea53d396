use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use ensemble_realtime::PredictionRecord;

use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/history", get(list_history))
}

/// Recent predictions, newest first.
async fn list_history(State(state): State<Arc<AppState>>) -> Json<Vec<PredictionRecord>> {
    Json(state.history.snapshot())
}

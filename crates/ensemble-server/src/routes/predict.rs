//! Prediction and training routes.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use ensemble_runtime::Dataset;
use serde_json::{json, Value};
use tracing::info;

use crate::error::ApiResult;
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/predict", post(predict))
        .route("/train", post(train))
}

fn decode(body: Value) -> ApiResult<Dataset> {
    let dataset = Dataset::from_value(body)?;
    dataset.validate()?;
    Ok(dataset)
}

async fn predict(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let dataset = decode(body)?;
    info!("Prediction request with {} {}", dataset.len(), dataset.kind());

    let result = state.broadcaster.predict(&dataset).await?;

    match &result.voting.decision {
        Some(class) => Ok((
            StatusCode::OK,
            Json(json!({
                "message": "Prediction completed",
                "class": class,
                "confidence": result.voting.confidence,
                "details": result,
            })),
        )),
        None => Ok((
            StatusCode::CONFLICT,
            Json(json!({
                "message": "Unable to reach a clear prediction",
                "result": result,
            })),
        )),
    }
}

async fn train(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> ApiResult<Json<Value>> {
    let dataset = decode(body)?;
    info!("Training request with {} {}", dataset.len(), dataset.kind());

    let summary = state.orchestrator.train_models(&dataset).await?;
    Ok(Json(json!({
        "message": "Training dispatched",
        "details": summary,
    })))
}

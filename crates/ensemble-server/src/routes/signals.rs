//! Sensor file parsing route.

use std::collections::HashMap;
use std::sync::Arc;

use axum::routing::post;
use axum::{Json, Router};
use ensemble_core::Error;
use ensemble_runtime::{parse_sensor_files, SensorFile};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::error::{parse_body, ApiResult};
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/signals/parse", post(parse_signals))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ParseRequest {
    files: Vec<SensorFile>,
    #[serde(default)]
    anomaly_times: HashMap<String, f64>,
}

async fn parse_signals(Json(body): Json<Value>) -> ApiResult<Json<Value>> {
    let req: ParseRequest = parse_body(body)?;
    if req.files.is_empty() {
        return Err(Error::InvalidFormat("at least one file is required".into()).into());
    }

    let signals = parse_sensor_files(&req.files, &req.anomaly_times);
    info!("Parsed {} sensor files", signals.len());
    Ok(Json(json!({ "signals": signals })))
}

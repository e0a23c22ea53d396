//! Registry configuration routes.
//!
//! Every successful mutation answers with the full model list and announces
//! the new enabled flags to realtime observers.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use ensemble_runtime::{EndpointUrls, ModelEndpoint, UrlKind};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{parse_body, ApiResult};
use crate::state::AppState;

// ---------------------------------------------------------------
// Route builder
// ---------------------------------------------------------------

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/config", get(get_config))
        .route("/config/model", post(set_enabled))
        .route("/config/url", post(set_url))
        .route("/config/name", post(set_display_name))
        .route("/config/add", post(add_model))
        .route("/config/delete", post(delete_model))
}

// ---------------------------------------------------------------
// Request/response types
// ---------------------------------------------------------------

/// Public view of an endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelView {
    pub name: String,
    pub display_name: String,
    pub enabled: bool,
    pub url: String,
    pub training_url: String,
    pub health_url: String,
}

impl From<ModelEndpoint> for ModelView {
    fn from(e: ModelEndpoint) -> Self {
        Self {
            name: e.key,
            display_name: e.display_name,
            enabled: e.enabled,
            url: e.predict_url,
            training_url: e.train_url,
            health_url: e.health_url,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnableRequest {
    model_name: String,
    enabled: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UrlRequest {
    model_name: String,
    url: String,
    #[serde(default, rename = "type")]
    kind: UrlKind,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NameRequest {
    model_name: String,
    display_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddRequest {
    name: String,
    url: String,
    training_url: String,
    health_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeleteRequest {
    model_name: String,
}

// ---------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------

fn models(state: &AppState) -> Vec<ModelView> {
    state
        .registry
        .get_all()
        .into_iter()
        .map(ModelView::from)
        .collect()
}

/// Reply after a committed mutation.
fn changed(state: &AppState, message: String) -> Json<Value> {
    state.broadcaster.publish_config();
    Json(json!({
        "message": message,
        "models": models(state),
    }))
}

async fn get_config(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "models": models(&state),
        "timeout": state.config.model_timeout.as_millis() as u64,
    }))
}

async fn set_enabled(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> ApiResult<Json<Value>> {
    let req: EnableRequest = parse_body(body)?;
    state.registry.set_enabled(&req.model_name, req.enabled)?;

    let verb = if req.enabled { "enabled" } else { "disabled" };
    Ok(changed(&state, format!("Model '{}' {}", req.model_name, verb)))
}

async fn set_url(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> ApiResult<Json<Value>> {
    let req: UrlRequest = parse_body(body)?;
    state.registry.set_url(&req.model_name, req.kind, &req.url)?;

    Ok(changed(
        &state,
        format!("{} URL of model '{}' updated", req.kind, req.model_name),
    ))
}

async fn set_display_name(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> ApiResult<Json<Value>> {
    let req: NameRequest = parse_body(body)?;
    state
        .registry
        .set_display_name(&req.model_name, &req.display_name)?;

    Ok(changed(&state, format!("Name of model '{}' updated", req.model_name)))
}

async fn add_model(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> ApiResult<Json<Value>> {
    let req: AddRequest = parse_body(body)?;
    let key = state.registry.add(
        &req.name,
        EndpointUrls {
            predict_url: req.url,
            train_url: req.training_url,
            health_url: req.health_url,
        },
    )?;
    state.health.resync();

    state.broadcaster.publish_config();
    Ok(Json(json!({
        "message": format!("Model '{}' added", req.name),
        "key": key,
        "models": models(&state),
    })))
}

async fn delete_model(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> ApiResult<Json<Value>> {
    let req: DeleteRequest = parse_body(body)?;
    state.registry.remove(&req.model_name)?;
    state.health.resync();

    Ok(changed(&state, format!("Model '{}' removed", req.model_name)))
}

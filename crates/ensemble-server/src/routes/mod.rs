//! HTTP route handlers.

pub mod config;
pub mod health;
pub mod history;
pub mod predict;
pub mod signals;
pub mod ws;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the main Axum router with all routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    let body_limit = state.config.body_limit;
    Router::new()
        .nest("/api", api_routes())
        .route("/ws", get(ws::upgrade))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(predict::routes())
        .merge(health::routes())
        .merge(config::routes())
        .merge(history::routes())
        .merge(signals::routes())
}

//! Health / heartbeat endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};
use utoipa::OpenApi;

use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(get_health))]
pub struct HealthApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(get_health))
}

/// Heartbeat endpoint.
///
/// Always answers 200 while the server is up; `ollama` reports whether the
/// completion service is reachable right now.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Server is healthy", body = Value)
    )
)]
pub async fn get_health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let ollama = if state.ollama.probe().await {
        "reachable"
    } else {
        "unreachable"
    };
    Json(json!({
        "status":  "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "ollama":  ollama,
    }))
}

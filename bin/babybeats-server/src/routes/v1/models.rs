//! Configured model catalog.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::schemas::v1::models::ModelResponse;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(list_models), components(schemas(ModelResponse)))]
pub struct ModelsApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/models", get(list_models))
}

/// Models in fallback order.
#[utoipa::path(
    get,
    path = "/v1/models",
    tag = "models",
    responses(
        (status = 200, description = "Configured models", body = [ModelResponse]),
    )
)]
pub async fn list_models(State(state): State<Arc<AppState>>) -> Json<Vec<ModelResponse>> {
    let default_model = state.default_model();
    Json(
        state
            .manager
            .config()
            .models
            .iter()
            .map(|m| ModelResponse::new(m, default_model.as_deref()))
            .collect(),
    )
}

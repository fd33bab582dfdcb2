pub mod models;
pub mod names;
pub mod tasks;

use std::sync::Arc;

use axum::Router;
use utoipa::OpenApi;

use crate::state::AppState;

/// Routes nested under `/v1`.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .merge(models::router())
        .merge(names::router())
        .merge(tasks::router())
}

pub fn api_docs() -> utoipa::openapi::OpenApi {
    let mut doc = models::ModelsApi::openapi();
    doc.merge(names::NamesApi::openapi());
    doc.merge(tasks::TasksApi::openapi());
    doc
}

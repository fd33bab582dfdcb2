//! Baby-name generation tasks.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use babybeats_core::new_task_id;
use tracing::info;
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::schemas::v1::names::{CreateNamesRequest, GenderParam};
use crate::schemas::v1::task::TaskResponse;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(create_names),
    components(schemas(CreateNamesRequest, GenderParam))
)]
pub struct NamesApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/names", post(create_names))
}

/// Start a background naming task.
///
/// Returns immediately; poll `GET /v1/tasks/{id}` or block on
/// `GET /v1/tasks/{id}/wait` for the outcome.
#[utoipa::path(
    post,
    path = "/v1/names",
    tag = "names",
    request_body = CreateNamesRequest,
    responses(
        (status = 202, description = "Task started", body = TaskResponse),
        (status = 400, description = "Invalid request"),
        (status = 409, description = "A task with this id is still running"),
    )
)]
pub async fn create_names(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateNamesRequest>,
) -> Result<(StatusCode, Json<TaskResponse>), ServerError> {
    req.validate()?;

    let preferred = req
        .model
        .clone()
        .or_else(|| state.default_model())
        .ok_or_else(|| ServerError::BadRequest("no model configured".to_owned()))?;
    let candidates = req
        .candidates
        .clone()
        .unwrap_or_else(|| state.manager.config().model_names());
    let id = req.id.clone().unwrap_or_else(new_task_id);

    let record = state
        .manager
        .start(id, req.naming_request(), preferred, candidates)
        .await?;

    info!(task_id = %record.id, "naming task accepted");
    Ok((StatusCode::ACCEPTED, Json(TaskResponse::from(&record))))
}

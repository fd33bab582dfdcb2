//! Task status, waiting, cancellation and removal.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::schemas::v1::task::{TaskResponse, WaitQuery};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(list_tasks, get_task, wait_task, cancel_task, delete_task),
    components(schemas(TaskResponse, WaitQuery))
)]
pub struct TasksApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tasks", get(list_tasks))
        .route("/tasks/{id}", get(get_task).delete(delete_task))
        .route("/tasks/{id}/wait", get(wait_task))
        .route("/tasks/{id}/cancel", post(cancel_task))
}

#[utoipa::path(
    get,
    path = "/v1/tasks",
    tag = "tasks",
    responses(
        (status = 200, description = "All tasks, newest first", body = [TaskResponse]),
    )
)]
pub async fn list_tasks(State(state): State<Arc<AppState>>) -> Json<Vec<TaskResponse>> {
    let records = state.manager.list().await;
    Json(records.iter().map(TaskResponse::from).collect())
}

#[utoipa::path(
    get,
    path = "/v1/tasks/{id}",
    tag = "tasks",
    params(("id" = String, Path, description = "Task id")),
    responses(
        (status = 200, description = "Task retrieved", body = TaskResponse),
        (status = 404, description = "Task not found"),
    )
)]
pub async fn get_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<TaskResponse>, ServerError> {
    let record = state.manager.status(&id).await?;
    Ok(Json(TaskResponse::from(&record)))
}

/// Block until the task is completed or failed.
#[utoipa::path(
    get,
    path = "/v1/tasks/{id}/wait",
    tag = "tasks",
    params(("id" = String, Path, description = "Task id"), WaitQuery),
    responses(
        (status = 200, description = "Task reached a terminal state", body = TaskResponse),
        (status = 404, description = "Task not found or removed while waiting"),
        (status = 504, description = "Still running when the wait ended"),
    )
)]
pub async fn wait_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(q): Query<WaitQuery>,
) -> Result<Json<TaskResponse>, ServerError> {
    let ceiling = q
        .timeout_secs
        .map(Duration::from_secs)
        .map_or(state.config.wait_ceiling, |t| t.min(state.config.wait_ceiling));
    let record = state.manager.wait(&id, ceiling).await?;
    Ok(Json(TaskResponse::from(&record)))
}

/// Cancel a running task. Cancelling a finished task returns it unchanged.
#[utoipa::path(
    post,
    path = "/v1/tasks/{id}/cancel",
    tag = "tasks",
    params(("id" = String, Path, description = "Task id")),
    responses(
        (status = 200, description = "Task after cancellation", body = TaskResponse),
        (status = 404, description = "Task not found"),
    )
)]
pub async fn cancel_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<TaskResponse>, ServerError> {
    let record = state.manager.cancel(&id).await?;
    Ok(Json(TaskResponse::from(&record)))
}

/// Remove a task record. A running task's outcome is discarded.
#[utoipa::path(
    delete,
    path = "/v1/tasks/{id}",
    tag = "tasks",
    params(("id" = String, Path, description = "Task id")),
    responses(
        (status = 200, description = "Removed record", body = TaskResponse),
        (status = 404, description = "Task not found"),
    )
)]
pub async fn delete_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<TaskResponse>, ServerError> {
    let record = state.manager.clear(&id).await?;
    Ok(Json(TaskResponse::from(&record)))
}

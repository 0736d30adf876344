//! Task queue CRUD surface: enqueue, list, and fetch a single task.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::Deserialize;

use omnihost_core::model::{NewTask, Task, TaskStatus};
use omnihost_core::storage::task_repo;

use crate::apierror::ApiError;
use crate::state::AppState;

#[utoipa::path(post, path = "/tasks", request_body = NewTask, responses((status = 201, description = "Task enqueued", body = Task)))]
pub async fn enqueue(State(state): State<AppState>, Json(body): Json<NewTask>) -> Result<(StatusCode, Json<Task>), ApiError> {
    let task = task_repo::enqueue(&state.pool, &body).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct ListQuery {
    zone_name: Option<String>,
    status: Option<String>,
    limit: Option<i64>,
    offset: Option<i64>,
}

#[utoipa::path(get, path = "/tasks", params(ListQuery), responses((status = 200, description = "Task queue entries", body = [Task])))]
pub async fn list(State(state): State<AppState>, Query(q): Query<ListQuery>) -> Result<Json<Vec<Task>>, ApiError> {
    let status = q.status.as_deref().map(|s| TaskStatus::parse(s).ok_or_else(|| ApiError::bad_request(format!("unknown status '{s}'")))).transpose()?;
    let tasks = task_repo::list(&state.pool, q.zone_name.as_deref(), status, q.limit.unwrap_or(100).clamp(1, 1000), q.offset.unwrap_or(0).max(0)).await?;
    Ok(Json(tasks))
}

#[utoipa::path(get, path = "/tasks/{id}", responses((status = 200, description = "A single task", body = Task), (status = 404, description = "No task with that id")))]
pub async fn get(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<Task>, ApiError> {
    task_repo::get(&state.pool, id).await?.map(Json).ok_or_else(|| ApiError::not_found(format!("no task with id {id}")))
}

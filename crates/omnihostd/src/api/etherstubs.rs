//! `/network/etherstubs[/{name}]` — CRUD via the task queue (§6). Creation
//! and deletion enqueue `etherstub_create`/`etherstub_delete` tasks for the
//! worker to shell out to `dladm`; listing reads the last collected state.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::Deserialize;
use std::time::Instant;

use omnihost_core::model::{LinkClass, NetworkInterface, NewTask, Task};
use omnihost_core::storage::network_repo;
use omnihost_core::storage::query::QueryResponse;
use omnihost_core::storage::task_repo;

use crate::apierror::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct HostFilter {
    host: Option<String>,
}

#[utoipa::path(get, path = "/network/etherstubs", params(HostFilter), responses((status = 200, description = "Currently known etherstubs")))]
pub async fn list(State(state): State<AppState>, Query(q): Query<HostFilter>) -> Result<Json<QueryResponse<NetworkInterface>>, ApiError> {
    let started = Instant::now();
    let host = q.host.as_deref().unwrap_or(&state.host);
    let rows = network_repo::list_interfaces(&state.pool, host).await?;
    let etherstubs = rows.into_iter().filter(|i| i.class == LinkClass::Etherstub).collect();
    Ok(Json(QueryResponse::current_state(etherstubs, started)))
}

#[utoipa::path(post, path = "/network/etherstubs/{name}", responses((status = 202, description = "Create enqueued", body = Task)))]
pub async fn create(State(state): State<AppState>, Path(name): Path<String>) -> Result<(StatusCode, Json<Task>), ApiError> {
    let task = task_repo::enqueue(
        &state.pool,
        &NewTask { zone_name: None, operation: "etherstub_create".into(), priority: 0, created_by: None, metadata: serde_json::json!({ "name": name }) },
    )
    .await?;
    Ok((StatusCode::ACCEPTED, Json(task)))
}

#[utoipa::path(delete, path = "/network/etherstubs/{name}", responses((status = 202, description = "Delete enqueued", body = Task)))]
pub async fn delete(State(state): State<AppState>, Path(name): Path<String>) -> Result<(StatusCode, Json<Task>), ApiError> {
    let task = task_repo::enqueue(
        &state.pool,
        &NewTask { zone_name: None, operation: "etherstub_delete".into(), priority: 0, created_by: None, metadata: serde_json::json!({ "name": name }) },
    )
    .await?;
    Ok((StatusCode::ACCEPTED, Json(task)))
}

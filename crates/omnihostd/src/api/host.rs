//! `/monitoring/host*` and the on-demand collection trigger.

use std::time::Instant;

use axum::extract::{Query, State};
use axum::response::Json;
use serde::{Deserialize, Serialize};

use omnihost_core::model::HostInfo;
use omnihost_core::scheduler::CollectorKind;
use omnihost_core::storage::{host_repo, query::QueryResponse};

use crate::apierror::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct HostQuery {
    host: Option<String>,
}

#[utoipa::path(
    get,
    path = "/monitoring/host",
    params(HostQuery),
    responses((status = 200, description = "Current host identity/uname record"))
)]
pub async fn get_host(State(state): State<AppState>, Query(q): Query<HostQuery>) -> Result<Json<QueryResponse<HostInfo>>, ApiError> {
    let started = Instant::now();
    let host = q.host.as_deref().unwrap_or(&state.host);
    let info = host_repo::get(&state.pool, host).await?;
    Ok(Json(QueryResponse::current_state(info.into_iter().collect(), started)))
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub feature_flags: serde_json::Value,
    pub error_counts: serde_json::Value,
    pub last_error_message: Option<String>,
}

#[utoipa::path(
    get,
    path = "/monitoring/host/health",
    responses((status = 200, description = "Aggregate collector health", body = HealthResponse))
)]
pub async fn get_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = match state.host_state.aggregate_health() {
        omnihost_core::model::HostHealth::Healthy => "healthy",
        omnihost_core::model::HostHealth::Degraded => "degraded",
        omnihost_core::model::HostHealth::Faulted => "faulted",
        omnihost_core::model::HostHealth::Critical => "critical",
        omnihost_core::model::HostHealth::Stopped => "stopped",
        omnihost_core::model::HostHealth::Error => "error",
    };
    Json(HealthResponse {
        status,
        feature_flags: state.host_state.feature_flags(),
        error_counts: state.host_state.error_counts_json(),
        last_error_message: state.host_state.last_error_message(),
    })
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct CollectRequest {
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct CollectResponse {
    results: std::collections::HashMap<String, bool>,
}

/// `POST /monitoring/collect` — body `{"type": "network|storage|all"}`.
#[utoipa::path(
    post,
    path = "/monitoring/collect",
    request_body = CollectRequest,
    responses((status = 200, description = "Per-collector trigger results", body = CollectResponse))
)]
pub async fn trigger_collect(State(state): State<AppState>, Json(body): Json<CollectRequest>) -> Result<Json<CollectResponse>, ApiError> {
    let kind = match body.kind.as_str() {
        "network" => CollectorKind::NetworkConfig,
        "storage" => CollectorKind::Storage,
        "all" => CollectorKind::All,
        other => return Err(ApiError::bad_request(format!("unknown collect type '{other}'"))),
    };
    let results = state.scheduler.trigger_collection(kind).await;
    Ok(Json(CollectResponse { results }))
}

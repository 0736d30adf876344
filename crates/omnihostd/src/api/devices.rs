//! `/monitoring/devices` — PCI device enumeration, latest scan per address.

use std::time::Instant;

use axum::extract::{Query, State};
use axum::response::Json;
use serde::Deserialize;

use omnihost_core::model::PciDevice;
use omnihost_core::storage::device_repo;
use omnihost_core::storage::query::QueryResponse;

use crate::apierror::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct HostFilter {
    host: Option<String>,
}

#[utoipa::path(get, path = "/monitoring/devices", params(HostFilter), responses((status = 200, description = "Latest PCI device enumeration")))]
pub async fn list(State(state): State<AppState>, Query(q): Query<HostFilter>) -> Result<Json<QueryResponse<PciDevice>>, ApiError> {
    let started = Instant::now();
    let host = q.host.as_deref().unwrap_or(&state.host);
    let rows = device_repo::list_latest(&state.pool, host).await?;
    Ok(Json(QueryResponse::current_state(rows, started)))
}

//! `/monitoring/system/*` — CPU/memory current state and time series, plus
//! a `load` view projecting just the load-average fields.

use std::time::Instant;

use axum::extract::{Query, State};
use axum::response::Json;
use serde::{Deserialize, Serialize};

use omnihost_core::model::{CpuStats, MemoryStats};
use omnihost_core::storage::query::{QueryResponse, SamplingMeta};
use omnihost_core::storage::system_repo;

use crate::apierror::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct SeriesQuery {
    host: Option<String>,
    since: Option<chrono::DateTime<chrono::Utc>>,
}

fn default_since(since: Option<chrono::DateTime<chrono::Utc>>) -> chrono::DateTime<chrono::Utc> {
    since.unwrap_or_else(|| chrono::Utc::now() - chrono::Duration::hours(1))
}

#[utoipa::path(get, path = "/monitoring/system/cpu", params(SeriesQuery), responses((status = 200, description = "CPU stats, current or time series")))]
pub async fn cpu(State(state): State<AppState>, Query(q): Query<SeriesQuery>) -> Result<Json<QueryResponse<CpuStats>>, ApiError> {
    let started = Instant::now();
    let host = q.host.as_deref().unwrap_or(&state.host);
    let rows = match q.since {
        Some(since) => system_repo::list_cpu_stats_since(&state.pool, host, since).await?,
        None => system_repo::latest_cpu_stats(&state.pool, host).await?.into_iter().collect(),
    };
    if q.since.is_some() {
        Ok(Json(QueryResponse::time_series(
            rows,
            SamplingMeta { strategy: "unsampled".into(), bucket_count: None, entity_count: None, query_time_ms: started.elapsed().as_millis() as u64 },
        )))
    } else {
        Ok(Json(QueryResponse::current_state(rows, started)))
    }
}

#[utoipa::path(get, path = "/monitoring/system/memory", params(SeriesQuery), responses((status = 200, description = "Memory stats, current or time series")))]
pub async fn memory(State(state): State<AppState>, Query(q): Query<SeriesQuery>) -> Result<Json<QueryResponse<MemoryStats>>, ApiError> {
    let started = Instant::now();
    let host = q.host.as_deref().unwrap_or(&state.host);
    let rows = match q.since {
        Some(since) => system_repo::list_memory_stats_since(&state.pool, host, since).await?,
        None => system_repo::latest_memory_stats(&state.pool, host).await?.into_iter().collect(),
    };
    if q.since.is_some() {
        Ok(Json(QueryResponse::time_series(
            rows,
            SamplingMeta { strategy: "unsampled".into(), bucket_count: None, entity_count: None, query_time_ms: started.elapsed().as_millis() as u64 },
        )))
    } else {
        Ok(Json(QueryResponse::current_state(rows, started)))
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct LoadAverage {
    pub host: String,
    pub scan_timestamp: chrono::DateTime<chrono::Utc>,
    pub load_avg_1: Option<f64>,
    pub load_avg_5: Option<f64>,
    pub load_avg_15: Option<f64>,
}

#[utoipa::path(get, path = "/monitoring/system/load", params(SeriesQuery), responses((status = 200, description = "Load average, projected from the latest CPU stats row")))]
pub async fn load(State(state): State<AppState>, Query(q): Query<SeriesQuery>) -> Result<Json<QueryResponse<LoadAverage>>, ApiError> {
    let started = Instant::now();
    let host = q.host.as_deref().unwrap_or(&state.host);
    let latest = system_repo::latest_cpu_stats(&state.pool, host).await?;
    let data = latest
        .map(|c| LoadAverage { host: c.host, scan_timestamp: c.scan_timestamp, load_avg_1: c.load_avg_1, load_avg_5: c.load_avg_5, load_avg_15: c.load_avg_15 })
        .into_iter()
        .collect();
    Ok(Json(QueryResponse::current_state(data, started)))
}

//! `/monitoring/storage/*` — ZFS pools/datasets/disks current state plus
//! disk-io/pool-io/ARC time series.

use std::time::Instant;

use axum::extract::{Query, State};
use axum::response::Json;
use serde::Deserialize;

use omnihost_core::model::{ArcStats, Disk, DiskIoStats, PoolIoStats, ZfsDataset, ZfsPool};
use omnihost_core::storage::query::{even_sample_indices, QueryResponse, SamplingMeta};
use omnihost_core::storage::storage_repo;

use crate::apierror::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct HostFilter {
    host: Option<String>,
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct SeriesQuery {
    host: Option<String>,
    since: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct PoolSeriesQuery {
    host: Option<String>,
    pool: Option<String>,
    since: Option<chrono::DateTime<chrono::Utc>>,
    limit: Option<i64>,
    #[serde(default = "default_true")]
    per_pool: bool,
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct DeviceSeriesQuery {
    host: Option<String>,
    device: Option<String>,
    since: Option<chrono::DateTime<chrono::Utc>>,
    limit: Option<i64>,
    #[serde(default = "default_true")]
    per_device: bool,
}

fn default_true() -> bool {
    true
}

fn default_since(since: Option<chrono::DateTime<chrono::Utc>>) -> chrono::DateTime<chrono::Utc> {
    since.unwrap_or_else(|| chrono::Utc::now() - chrono::Duration::hours(1))
}

#[utoipa::path(get, path = "/monitoring/storage/pools", params(HostFilter), responses((status = 200, description = "Current ZFS pool state")))]
pub async fn pools(State(state): State<AppState>, Query(q): Query<HostFilter>) -> Result<Json<QueryResponse<ZfsPool>>, ApiError> {
    let started = Instant::now();
    let host = q.host.as_deref().unwrap_or(&state.host);
    let rows = storage_repo::list_pools_latest(&state.pool, host).await?;
    Ok(Json(QueryResponse::current_state(rows, started)))
}

#[utoipa::path(get, path = "/monitoring/storage/datasets", params(HostFilter), responses((status = 200, description = "Current ZFS dataset state")))]
pub async fn datasets(State(state): State<AppState>, Query(q): Query<HostFilter>) -> Result<Json<QueryResponse<ZfsDataset>>, ApiError> {
    let started = Instant::now();
    let host = q.host.as_deref().unwrap_or(&state.host);
    let rows = storage_repo::list_datasets_latest(&state.pool, host).await?;
    Ok(Json(QueryResponse::current_state(rows, started)))
}

#[utoipa::path(get, path = "/monitoring/storage/disks", params(HostFilter), responses((status = 200, description = "Current physical disk state")))]
pub async fn disks(State(state): State<AppState>, Query(q): Query<HostFilter>) -> Result<Json<QueryResponse<Disk>>, ApiError> {
    let started = Instant::now();
    let host = q.host.as_deref().unwrap_or(&state.host);
    let rows = storage_repo::list_disks(&state.pool, host).await?;
    Ok(Json(QueryResponse::current_state(rows, started)))
}

/// §4.7 sampling rules, `device_name` as the entity: `per_device` (default
/// true) with no `since` returns the latest row per device; `per_device`
/// with `since` samples each device's rows evenly in app code (seed
/// scenario S4); `per_device=false` is the plain desc/limit read.
#[utoipa::path(get, path = "/monitoring/storage/disk-io", params(DeviceSeriesQuery), responses((status = 200, description = "Disk I/O, current or sampled time series")))]
pub async fn disk_io(State(state): State<AppState>, Query(q): Query<DeviceSeriesQuery>) -> Result<Json<QueryResponse<DiskIoStats>>, ApiError> {
    let started = Instant::now();
    let host = q.host.as_deref().unwrap_or(&state.host).to_string();

    if !q.per_device {
        let rows = storage_repo::list_disk_io_since(&state.pool, &host, default_since(q.since)).await?;
        let rows = match &q.device {
            Some(d) => rows.into_iter().filter(|r| &r.device_name == d).collect(),
            None => rows,
        };
        return Ok(Json(QueryResponse::time_series(
            rows,
            SamplingMeta { strategy: "unsampled".into(), bucket_count: None, entity_count: None, query_time_ms: started.elapsed().as_millis() as u64 },
        )));
    }

    let Some(since) = q.since else {
        let rows = storage_repo::latest_disk_io_per_device(&state.pool, &host).await?;
        let rows = match &q.device {
            Some(d) => rows.into_iter().filter(|r| &r.device_name == d).collect(),
            None => rows,
        };
        return Ok(Json(QueryResponse::current_state(rows, started)));
    };

    let samples = q.limit.unwrap_or(100);
    let devices = match q.device.clone() {
        Some(d) => vec![d],
        None => storage_repo::distinct_devices(&state.pool, &host).await?,
    };
    let entity_count = devices.len() as i64;

    let mut out = Vec::new();
    for device in devices {
        let rows = storage_repo::list_disk_io_for_device_since(&state.pool, &host, &device, since).await?;
        let indices = even_sample_indices(rows.len(), samples as usize);
        out.extend(indices.into_iter().map(|i| rows[i].clone()));
    }
    Ok(Json(QueryResponse::time_series(
        out,
        SamplingMeta {
            strategy: "javascript-time-sampling".into(),
            bucket_count: Some(samples),
            entity_count: Some(entity_count),
            query_time_ms: started.elapsed().as_millis() as u64,
        },
    )))
}

/// Same §4.7 per-entity sampling as [`disk_io`], keyed on `pool` instead of
/// `device_name` (seed scenario S4).
#[utoipa::path(get, path = "/monitoring/storage/pool-io", params(PoolSeriesQuery), responses((status = 200, description = "Pool I/O, current or sampled time series")))]
pub async fn pool_io(State(state): State<AppState>, Query(q): Query<PoolSeriesQuery>) -> Result<Json<QueryResponse<PoolIoStats>>, ApiError> {
    let started = Instant::now();
    let host = q.host.as_deref().unwrap_or(&state.host).to_string();

    if !q.per_pool {
        let rows = storage_repo::list_pool_io_since(&state.pool, &host, default_since(q.since)).await?;
        let rows = match &q.pool {
            Some(p) => rows.into_iter().filter(|r| &r.pool == p).collect(),
            None => rows,
        };
        return Ok(Json(QueryResponse::time_series(
            rows,
            SamplingMeta { strategy: "unsampled".into(), bucket_count: None, entity_count: None, query_time_ms: started.elapsed().as_millis() as u64 },
        )));
    }

    let Some(since) = q.since else {
        let rows = storage_repo::latest_pool_io_per_pool(&state.pool, &host).await?;
        let rows = match &q.pool {
            Some(p) => rows.into_iter().filter(|r| &r.pool == p).collect(),
            None => rows,
        };
        return Ok(Json(QueryResponse::current_state(rows, started)));
    };

    let samples = q.limit.unwrap_or(100);
    let pools = match q.pool.clone() {
        Some(p) => vec![p],
        None => storage_repo::distinct_pools(&state.pool, &host).await?,
    };
    let entity_count = pools.len() as i64;

    let mut out = Vec::new();
    for pool_name in pools {
        let rows = storage_repo::list_pool_io_for_pool_since(&state.pool, &host, &pool_name, since).await?;
        let indices = even_sample_indices(rows.len(), samples as usize);
        out.extend(indices.into_iter().map(|i| rows[i].clone()));
    }
    Ok(Json(QueryResponse::time_series(
        out,
        SamplingMeta {
            strategy: "javascript-time-sampling".into(),
            bucket_count: Some(samples),
            entity_count: Some(entity_count),
            query_time_ms: started.elapsed().as_millis() as u64,
        },
    )))
}

/// ARC stats are host-wide, not per-entity, so this stays a plain
/// since/limit read regardless of the other series endpoints' sampling.
#[utoipa::path(get, path = "/monitoring/storage/arc", params(SeriesQuery), responses((status = 200, description = "ARC stats time series")))]
pub async fn arc(State(state): State<AppState>, Query(q): Query<SeriesQuery>) -> Result<Json<QueryResponse<ArcStats>>, ApiError> {
    let started = Instant::now();
    let host = q.host.as_deref().unwrap_or(&state.host);
    let rows = storage_repo::list_arc_stats_since(&state.pool, host, default_since(q.since)).await?;
    Ok(Json(QueryResponse::time_series(
        rows,
        SamplingMeta { strategy: "unsampled".into(), bucket_count: None, entity_count: None, query_time_ms: started.elapsed().as_millis() as u64 },
    )))
}

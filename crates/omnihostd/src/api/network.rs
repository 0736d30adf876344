//! `/monitoring/network/*` — current-state reads plus §4.7's sampled
//! usage time series.

use std::time::Instant;

use axum::extract::{Query, State};
use axum::response::Json;
use futures_util::future::join_all;
use serde::Deserialize;

use omnihost_core::model::{IpAddress, NetworkInterface, NetworkUsage, Route};
use omnihost_core::storage::query::{even_sample_indices, QueryResponse, SamplingMeta};
use omnihost_core::storage::network_repo;

use crate::apierror::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct HostFilter {
    host: Option<String>,
}

#[utoipa::path(get, path = "/monitoring/network/interfaces", params(HostFilter), responses((status = 200, description = "Current network interfaces")))]
pub async fn interfaces(State(state): State<AppState>, Query(q): Query<HostFilter>) -> Result<Json<QueryResponse<NetworkInterface>>, ApiError> {
    let started = Instant::now();
    let host = q.host.as_deref().unwrap_or(&state.host);
    let rows = network_repo::list_interfaces(&state.pool, host).await?;
    Ok(Json(QueryResponse::current_state(rows, started)))
}

#[utoipa::path(get, path = "/monitoring/network/ipaddresses", params(HostFilter), responses((status = 200, description = "Current IP addresses")))]
pub async fn ip_addresses(State(state): State<AppState>, Query(q): Query<HostFilter>) -> Result<Json<QueryResponse<IpAddress>>, ApiError> {
    let started = Instant::now();
    let host = q.host.as_deref().unwrap_or(&state.host);
    let rows = network_repo::list_ip_addresses(&state.pool, host).await?;
    Ok(Json(QueryResponse::current_state(rows, started)))
}

#[utoipa::path(get, path = "/monitoring/network/routes", params(HostFilter), responses((status = 200, description = "Current routing table")))]
pub async fn routes(State(state): State<AppState>, Query(q): Query<HostFilter>) -> Result<Json<QueryResponse<Route>>, ApiError> {
    let started = Instant::now();
    let host = q.host.as_deref().unwrap_or(&state.host);
    let rows = network_repo::list_routes(&state.pool, host).await?;
    Ok(Json(QueryResponse::current_state(rows, started)))
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct UsageQuery {
    host: Option<String>,
    link: Option<String>,
    since: Option<chrono::DateTime<chrono::Utc>>,
    samples: Option<i64>,
    #[serde(default = "default_true")]
    per_interface: bool,
    limit: Option<i64>,
}

fn default_true() -> bool {
    true
}

/// §4.7 sampling rules: latest-per-link when `per_interface` and no `since`,
/// NTILE-bucketed (falling back to parallel per-link even-sampling) when
/// `per_interface` and `since` is given, plain desc/limit otherwise.
#[utoipa::path(get, path = "/monitoring/network/usage", params(UsageQuery), responses((status = 200, description = "Network usage, current or sampled time series")))]
pub async fn usage(State(state): State<AppState>, Query(q): Query<UsageQuery>) -> Result<Json<QueryResponse<NetworkUsage>>, ApiError> {
    let started = Instant::now();
    let host = q.host.as_deref().unwrap_or(&state.host).to_string();
    let samples = q.samples.unwrap_or(100);

    if !q.per_interface {
        let rows = network_repo::list_usage_recent(&state.pool, &host, q.link.as_deref(), q.limit.unwrap_or(100)).await?;
        return Ok(Json(QueryResponse::current_state(rows, started)));
    }

    let Some(since) = q.since else {
        let rows = network_repo::latest_usage_per_link(&state.pool, &host).await?;
        let rows = match &q.link {
            Some(link) => rows.into_iter().filter(|r| &r.link == link).collect(),
            None => rows,
        };
        return Ok(Json(QueryResponse::current_state(rows, started)));
    };

    match network_repo::list_usage_ntile_sampled(&state.pool, &host, q.link.as_deref(), since, samples).await {
        Ok(rows) => Ok(Json(QueryResponse::time_series(
            rows,
            SamplingMeta { strategy: "ntile".into(), bucket_count: Some(samples), entity_count: None, query_time_ms: started.elapsed().as_millis() as u64 },
        ))),
        Err(e) => {
            tracing::debug!(error = %e, "network usage: NTILE unavailable, falling back to per-link even sampling");
            let links = match q.link.clone() {
                Some(l) => vec![l],
                None => network_repo::distinct_usage_links(&state.pool, &host).await?,
            };
            let pool = state.pool.clone();
            let futures = links.into_iter().map(|link| {
                let pool = pool.clone();
                let host = host.clone();
                async move { network_repo::list_usage_since(&pool, &host, &link, since).await }
            });
            let per_link_results = join_all(futures).await;

            let mut out = Vec::new();
            for result in per_link_results {
                let rows = result?;
                let indices = even_sample_indices(rows.len(), samples as usize);
                out.extend(indices.into_iter().map(|i| rows[i].clone()));
            }
            Ok(Json(QueryResponse::time_series(
                out,
                SamplingMeta { strategy: "even_sample_fallback".into(), bucket_count: Some(samples), entity_count: None, query_time_ms: started.elapsed().as_millis() as u64 },
            )))
        }
    }
}

//! Generic filter/pagination/sampling helpers shared by every repo module.
//!
//! Handlers build a [`Filter`] from query-string params and a [`Page`] from
//! `limit`/`offset`; [`select_current_state`] and [`sample_time_series`] turn
//! those into `sqlx::QueryBuilder`-composed SQL, mirroring the teacher's
//! preference for explicit query construction over macros (no fixed schema
//! at compile time means `sqlx::query!` isn't an option anyway).

use std::time::Instant;

use serde::Serialize;
use sqlx::sqlite::Sqlite;
use sqlx::QueryBuilder;
use sqlx::Row;
use sqlx::SqlitePool;

use crate::error::PersistError;

/// A single `column = value` equality filter collected from query params.
#[derive(Debug, Clone)]
pub struct Filter {
    pub column: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Page {
    pub const DEFAULT_LIMIT: i64 = 100;

    pub fn new(limit: Option<i64>, offset: Option<i64>) -> Self {
        Self {
            limit: limit.unwrap_or(Self::DEFAULT_LIMIT).clamp(1, 1000),
            offset: offset.unwrap_or(0).max(0),
        }
    }
}

/// Sampling strategy metadata returned alongside time-series responses.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "api", derive(utoipa::ToSchema))]
pub struct SamplingMeta {
    pub strategy: String,
    pub bucket_count: Option<i64>,
    /// Number of distinct entities (pools, devices, links, ...) the sample
    /// was spread across. `None` for host-wide or unsampled responses.
    pub entity_count: Option<i64>,
    pub query_time_ms: u64,
}

/// Uniform response envelope for every Query API handler.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "api", derive(utoipa::ToSchema))]
pub struct QueryResponse<T> {
    pub data: Vec<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampling: Option<SamplingMeta>,
    pub query_time_ms: u64,
}

impl<T> QueryResponse<T> {
    pub fn current_state(data: Vec<T>, started: Instant) -> Self {
        Self {
            data,
            sampling: None,
            query_time_ms: started.elapsed().as_millis() as u64,
        }
    }

    pub fn time_series(data: Vec<T>, sampling: SamplingMeta) -> Self {
        let query_time_ms = sampling.query_time_ms;
        Self {
            data,
            sampling: Some(sampling),
            query_time_ms,
        }
    }
}

/// Builds `SELECT {columns} FROM {table} WHERE host = ? [AND filters] ORDER
/// BY {order_by} LIMIT ? OFFSET ?` and projects each row through `map_row`.
/// Used for current-state tables (IP addresses, routes, interfaces, disks).
pub async fn select_current_state<T, F>(
    pool: &SqlitePool,
    table: &str,
    columns: &str,
    host: &str,
    filters: &[Filter],
    order_by: &str,
    page: Page,
    map_row: F,
) -> Result<Vec<T>, PersistError>
where
    F: Fn(sqlx::sqlite::SqliteRow) -> T,
{
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!("SELECT {columns} FROM {table} WHERE host = "));
    qb.push_bind(host.to_string());
    for f in filters {
        qb.push(format!(" AND {} = ", f.column));
        qb.push_bind(f.value.clone());
    }
    qb.push(format!(" ORDER BY {order_by} LIMIT "));
    qb.push_bind(page.limit);
    qb.push(" OFFSET ");
    qb.push_bind(page.offset);

    let rows = qb.build().fetch_all(pool).await?;
    Ok(rows.into_iter().map(map_row).collect())
}

/// Per-entity even-sampling index plan for spec §4.7's `since`-bounded
/// sampling rule: `step = max(1, floor(n/samples))`, indices
/// `0*step, 1*step, ..., min(samples, n)-1 * step`, ascending.
///
/// Pure and independently testable from the SQL that feeds it.
pub fn even_sample_indices(n: usize, samples: usize) -> Vec<usize> {
    if n == 0 || samples == 0 {
        return Vec::new();
    }
    let step = (n / samples).max(1);
    let count = samples.min(n);
    (0..count).map(|i| i * step).take_while(|&idx| idx < n).collect()
}

/// Time-series row fetch for one entity (e.g. one `link`), used by the
/// `per_entity=true` + `since` path and by the NTILE-unavailable fallback.
/// Rows are returned ascending by `scan_timestamp`.
pub async fn fetch_entity_series(
    pool: &SqlitePool,
    table: &str,
    columns: &str,
    host: &str,
    entity_column: &str,
    entity_value: &str,
    since: chrono::DateTime<chrono::Utc>,
) -> Result<Vec<sqlx::sqlite::SqliteRow>, PersistError> {
    let sql = format!(
        "SELECT {columns} FROM {table} WHERE host = ? AND {entity_column} = ? AND scan_timestamp >= ? ORDER BY scan_timestamp ASC"
    );
    let rows = sqlx::query(&sql)
        .bind(host)
        .bind(entity_value)
        .bind(since.to_rfc3339())
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Every distinct value of `entity_column` for `host`, ascending — drives
/// the per-entity sampling loops in `storage_repo`/`network_repo` (one
/// query per pool/device/link).
pub async fn distinct_entities(pool: &SqlitePool, table: &str, host: &str, entity_column: &str) -> Result<Vec<String>, PersistError> {
    let sql = format!("SELECT DISTINCT {entity_column} FROM {table} WHERE host = ? ORDER BY {entity_column} ASC");
    let rows = sqlx::query(&sql).bind(host).fetch_all(pool).await?;
    Ok(rows.iter().map(|r| r.get::<String, _>(entity_column)).collect())
}

/// Latest record per distinct `entity_column` value for `host`, via a
/// `ROW_NUMBER() OVER (PARTITION BY ...)` window, descending by time.
pub async fn fetch_latest_per_entity(
    pool: &SqlitePool,
    table: &str,
    columns: &str,
    host: &str,
    entity_column: &str,
) -> Result<Vec<sqlx::sqlite::SqliteRow>, PersistError> {
    let sql = format!(
        "SELECT {columns} FROM (
            SELECT {columns}, ROW_NUMBER() OVER (PARTITION BY {entity_column} ORDER BY scan_timestamp DESC) AS rn
            FROM {table} WHERE host = ?
        ) WHERE rn = 1 ORDER BY {entity_column}"
    );
    let rows = sqlx::query(&sql).bind(host).fetch_all(pool).await?;
    Ok(rows)
}

/// Time-series row fetch for a host-wide (non-entity) table such as
/// `cpu_stats`/`memory_stats`/`arc_stats`: one row per scan, no partition
/// column. Rows are returned ascending by `scan_timestamp`.
pub async fn fetch_host_series(
    pool: &SqlitePool,
    table: &str,
    columns: &str,
    host: &str,
    since: chrono::DateTime<chrono::Utc>,
) -> Result<Vec<sqlx::sqlite::SqliteRow>, PersistError> {
    let sql = format!("SELECT {columns} FROM {table} WHERE host = ? AND scan_timestamp >= ? ORDER BY scan_timestamp ASC");
    let rows = sqlx::query(&sql).bind(host).bind(since.to_rfc3339()).fetch_all(pool).await?;
    Ok(rows)
}

/// Database-side NTILE bucketisation for network-usage sampling: partitions
/// each link's rows (ordered by time) into `buckets` tiles and keeps the
/// earliest row of each tile. Requires SQLite 3.25+ (bundled sqlx/libsqlite3
/// satisfies this); callers fall back to [`even_sample_indices`] plus
/// [`fetch_entity_series`] per link if this query errors.
pub async fn fetch_network_usage_ntile(
    pool: &SqlitePool,
    host: &str,
    link: Option<&str>,
    since: chrono::DateTime<chrono::Utc>,
    buckets: i64,
) -> Result<Vec<sqlx::sqlite::SqliteRow>, PersistError> {
    let mut sql = String::from(
        "WITH tiled AS (
            SELECT *, NTILE(?) OVER (PARTITION BY link ORDER BY scan_timestamp ASC) AS bucket
            FROM network_usage WHERE host = ? AND scan_timestamp >= ?",
    );
    if link.is_some() {
        sql.push_str(" AND link = ?");
    }
    sql.push_str(
        ") SELECT * FROM (
            SELECT *, ROW_NUMBER() OVER (PARTITION BY link, bucket ORDER BY scan_timestamp ASC) AS rn FROM tiled
        ) WHERE rn = 1 ORDER BY link, scan_timestamp ASC",
    );

    let mut query = sqlx::query(&sql).bind(buckets).bind(host).bind(since.to_rfc3339());
    if let Some(l) = link {
        query = query.bind(l);
    }
    let rows = query.fetch_all(pool).await?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Spec §4.7: step = max(1, floor(N/S)); indices 0*step..min(S,N)*step.
    #[test]
    fn even_sample_matches_spec_formula() {
        assert_eq!(even_sample_indices(100, 10), vec![0, 10, 20, 30, 40, 50, 60, 70, 80, 90]);
        assert_eq!(even_sample_indices(5, 10), vec![0, 1, 2, 3, 4]);
        assert_eq!(even_sample_indices(0, 10), Vec::<usize>::new());
        assert_eq!(even_sample_indices(7, 3), vec![0, 2, 4]);
    }

    #[test]
    fn page_clamps_to_sane_bounds() {
        let p = Page::new(Some(5000), Some(-10));
        assert_eq!(p.limit, 1000);
        assert_eq!(p.offset, 0);
        let p2 = Page::new(None, None);
        assert_eq!(p2.limit, Page::DEFAULT_LIMIT);
    }
}

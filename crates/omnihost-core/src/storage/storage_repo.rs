//! Persistence for ZFS pools/datasets, disks, and the per-pool/per-disk
//! iostat + ARC series.

use sqlx::{Row, SqlitePool};

use crate::error::PersistError;
use crate::model::{ArcStats, Disk, DiskIoStats, PoolIoStats, ScanType, ZfsDataset, ZfsPool};
use crate::storage::query;

pub async fn insert_pool(pool: &SqlitePool, zp: &ZfsPool) -> Result<(), PersistError> {
    sqlx::query(
        "INSERT INTO zfs_pool (host, pool, scan_timestamp, scan_type, alloc, alloc_bytes, free, free_bytes,
            capacity_pct, read_ops, write_ops, read_bandwidth_bytes, write_bandwidth_bytes, health, status, errors, pool_type)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&zp.host)
    .bind(&zp.pool)
    .bind(zp.scan_timestamp.to_rfc3339())
    .bind(scan_type_str(zp.scan_type))
    .bind(&zp.alloc)
    .bind(zp.alloc_bytes)
    .bind(&zp.free)
    .bind(zp.free_bytes)
    .bind(zp.capacity_pct)
    .bind(zp.read_ops)
    .bind(zp.write_ops)
    .bind(zp.read_bandwidth_bytes)
    .bind(zp.write_bandwidth_bytes)
    .bind(&zp.health)
    .bind(&zp.status)
    .bind(&zp.errors)
    .bind(&zp.pool_type)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn insert_dataset(pool: &SqlitePool, ds: &ZfsDataset) -> Result<(), PersistError> {
    sqlx::query(
        "INSERT INTO zfs_dataset (host, name, pool, scan_timestamp, dataset_type, used, used_bytes, available,
            available_bytes, referenced, referenced_bytes, compressratio, mountpoint, properties, dataset_exists)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&ds.host)
    .bind(&ds.name)
    .bind(&ds.pool)
    .bind(ds.scan_timestamp.to_rfc3339())
    .bind(&ds.dataset_type)
    .bind(&ds.used)
    .bind(ds.used_bytes)
    .bind(&ds.available)
    .bind(ds.available_bytes)
    .bind(&ds.referenced)
    .bind(ds.referenced_bytes)
    .bind(ds.compressratio)
    .bind(&ds.mountpoint)
    .bind(ds.properties.to_string())
    .bind(ds.dataset_exists)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn upsert_disk(pool: &SqlitePool, disk: &Disk) -> Result<(), PersistError> {
    sqlx::query(
        "INSERT INTO disk (host, device_name, disk_index, serial_number, manufacturer, model, firmware,
            capacity, capacity_bytes, disk_type, interface_type, pool_assignment, is_available, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(host, device_name) DO UPDATE SET
            disk_index = excluded.disk_index, serial_number = excluded.serial_number,
            manufacturer = excluded.manufacturer, model = excluded.model, firmware = excluded.firmware,
            capacity = excluded.capacity, capacity_bytes = excluded.capacity_bytes, disk_type = excluded.disk_type,
            interface_type = excluded.interface_type, pool_assignment = excluded.pool_assignment,
            is_available = excluded.is_available, updated_at = excluded.updated_at",
    )
    .bind(&disk.host)
    .bind(&disk.device_name)
    .bind(disk.disk_index)
    .bind(&disk.serial_number)
    .bind(&disk.manufacturer)
    .bind(&disk.model)
    .bind(&disk.firmware)
    .bind(&disk.capacity)
    .bind(disk.capacity_bytes)
    .bind(&disk.disk_type)
    .bind(&disk.interface_type)
    .bind(&disk.pool_assignment)
    .bind(disk.is_available)
    .bind(chrono::Utc::now().to_rfc3339())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn insert_disk_io_stats(pool: &SqlitePool, stats: &DiskIoStats) -> Result<(), PersistError> {
    sqlx::query(
        "INSERT INTO disk_io_stats (host, device_name, scan_timestamp, read_ops, write_ops, read_bandwidth_bytes, write_bandwidth_bytes)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&stats.host)
    .bind(&stats.device_name)
    .bind(stats.scan_timestamp.to_rfc3339())
    .bind(stats.read_ops)
    .bind(stats.write_ops)
    .bind(stats.read_bandwidth_bytes)
    .bind(stats.write_bandwidth_bytes)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn insert_pool_io_stats(pool: &SqlitePool, stats: &PoolIoStats) -> Result<(), PersistError> {
    sqlx::query(
        "INSERT INTO pool_io_stats (host, pool, scan_timestamp, read_ops, write_ops, read_bandwidth_bytes,
            write_bandwidth_bytes, total_wait_ms, disk_wait_ms, syncq_wait_ms, asyncq_wait_ms, scrub_wait_ms, trim_wait_ms, pool_type)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&stats.host)
    .bind(&stats.pool)
    .bind(stats.scan_timestamp.to_rfc3339())
    .bind(stats.read_ops)
    .bind(stats.write_ops)
    .bind(stats.read_bandwidth_bytes)
    .bind(stats.write_bandwidth_bytes)
    .bind(stats.total_wait_ms)
    .bind(stats.disk_wait_ms)
    .bind(stats.syncq_wait_ms)
    .bind(stats.asyncq_wait_ms)
    .bind(stats.scrub_wait_ms)
    .bind(stats.trim_wait_ms)
    .bind(&stats.pool_type)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn insert_arc_stats(pool: &SqlitePool, arc: &ArcStats) -> Result<(), PersistError> {
    sqlx::query(
        "INSERT INTO arc_stats (host, scan_timestamp, size_bytes, target_size_bytes, min_size_bytes, max_size_bytes,
            mru_size_bytes, mfu_size_bytes, data_size_bytes, meta_size_bytes, hits, misses, demand_data_hits,
            demand_data_misses, prefetch_hits, prefetch_misses, hit_ratio_pct, l2_hits, l2_misses, l2_size_bytes)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&arc.host)
    .bind(arc.scan_timestamp.to_rfc3339())
    .bind(arc.size_bytes)
    .bind(arc.target_size_bytes)
    .bind(arc.min_size_bytes)
    .bind(arc.max_size_bytes)
    .bind(arc.mru_size_bytes)
    .bind(arc.mfu_size_bytes)
    .bind(arc.data_size_bytes)
    .bind(arc.meta_size_bytes)
    .bind(arc.hits.map(|v| v as i64))
    .bind(arc.misses.map(|v| v as i64))
    .bind(arc.demand_data_hits.map(|v| v as i64))
    .bind(arc.demand_data_misses.map(|v| v as i64))
    .bind(arc.prefetch_hits.map(|v| v as i64))
    .bind(arc.prefetch_misses.map(|v| v as i64))
    .bind(arc.hit_ratio_pct)
    .bind(arc.l2_hits.map(|v| v as i64))
    .bind(arc.l2_misses.map(|v| v as i64))
    .bind(arc.l2_size_bytes)
    .execute(pool)
    .await?;
    Ok(())
}

/// Every known dataset name for `host`, used by the storage collector to
/// detect vanished datasets requiring a `dataset_exists=false` tombstone row.
pub async fn known_dataset_names(pool: &SqlitePool, host: &str) -> Result<Vec<String>, PersistError> {
    let rows = sqlx::query(
        "SELECT DISTINCT name FROM zfs_dataset WHERE host = ? AND dataset_exists = 1
         AND scan_timestamp = (SELECT MAX(scan_timestamp) FROM zfs_dataset z2 WHERE z2.host = zfs_dataset.host AND z2.name = zfs_dataset.name)",
    )
    .bind(host)
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(|r| r.get::<String, _>("name")).collect())
}

pub async fn list_disks(pool: &SqlitePool, host: &str) -> Result<Vec<Disk>, PersistError> {
    let rows = sqlx::query("SELECT * FROM disk WHERE host = ? ORDER BY device_name").bind(host).fetch_all(pool).await?;
    Ok(rows.iter().map(row_to_disk).collect())
}

/// Latest scan row per pool, for the current-state pools endpoint.
pub async fn list_pools_latest(pool_handle: &SqlitePool, host: &str) -> Result<Vec<ZfsPool>, PersistError> {
    let rows = sqlx::query(
        "SELECT * FROM (
            SELECT *, ROW_NUMBER() OVER (PARTITION BY pool ORDER BY scan_timestamp DESC) AS rn
            FROM zfs_pool WHERE host = ?
        ) WHERE rn = 1 ORDER BY pool",
    )
    .bind(host)
    .fetch_all(pool_handle)
    .await?;
    Ok(rows.iter().map(row_to_pool).collect())
}

/// Latest scan row per dataset (including tombstoned-absent ones), for the
/// current-state datasets endpoint.
pub async fn list_datasets_latest(pool_handle: &SqlitePool, host: &str) -> Result<Vec<ZfsDataset>, PersistError> {
    let rows = sqlx::query(
        "SELECT * FROM (
            SELECT *, ROW_NUMBER() OVER (PARTITION BY name ORDER BY scan_timestamp DESC) AS rn
            FROM zfs_dataset WHERE host = ?
        ) WHERE rn = 1 ORDER BY name",
    )
    .bind(host)
    .fetch_all(pool_handle)
    .await?;
    Ok(rows.iter().map(row_to_dataset).collect())
}

pub async fn list_disk_io_since(pool: &SqlitePool, host: &str, since: chrono::DateTime<chrono::Utc>) -> Result<Vec<DiskIoStats>, PersistError> {
    let rows = sqlx::query("SELECT * FROM disk_io_stats WHERE host = ? AND scan_timestamp >= ? ORDER BY scan_timestamp ASC")
        .bind(host)
        .bind(since.to_rfc3339())
        .fetch_all(pool)
        .await?;
    Ok(rows.iter().map(row_to_disk_io_stats).collect())
}

pub async fn list_pool_io_since(pool: &SqlitePool, host: &str, since: chrono::DateTime<chrono::Utc>) -> Result<Vec<PoolIoStats>, PersistError> {
    let rows = sqlx::query("SELECT * FROM pool_io_stats WHERE host = ? AND scan_timestamp >= ? ORDER BY scan_timestamp ASC")
        .bind(host)
        .bind(since.to_rfc3339())
        .fetch_all(pool)
        .await?;
    Ok(rows.iter().map(row_to_pool_io_stats).collect())
}

pub async fn list_arc_stats_since(pool: &SqlitePool, host: &str, since: chrono::DateTime<chrono::Utc>) -> Result<Vec<ArcStats>, PersistError> {
    let rows = sqlx::query("SELECT * FROM arc_stats WHERE host = ? AND scan_timestamp >= ? ORDER BY scan_timestamp ASC")
        .bind(host)
        .bind(since.to_rfc3339())
        .fetch_all(pool)
        .await?;
    Ok(rows.iter().map(row_to_arc_stats).collect())
}

/// Every pool/device name with at least one row for `host`, ascending —
/// drives the `per_pool`/`per_device` sampling loops below.
pub async fn distinct_pools(pool: &SqlitePool, host: &str) -> Result<Vec<String>, PersistError> {
    query::distinct_entities(pool, "pool_io_stats", host, "pool").await
}

pub async fn distinct_devices(pool: &SqlitePool, host: &str) -> Result<Vec<String>, PersistError> {
    query::distinct_entities(pool, "disk_io_stats", host, "device_name").await
}

/// Latest row per pool, for `per_pool=true` with no `since` (§4.7).
pub async fn latest_pool_io_per_pool(pool: &SqlitePool, host: &str) -> Result<Vec<PoolIoStats>, PersistError> {
    let rows = query::fetch_latest_per_entity(pool, "pool_io_stats", "*", host, "pool").await?;
    Ok(rows.iter().map(row_to_pool_io_stats).collect())
}

/// Latest row per device, for `per_device=true` with no `since` (§4.7).
pub async fn latest_disk_io_per_device(pool: &SqlitePool, host: &str) -> Result<Vec<DiskIoStats>, PersistError> {
    let rows = query::fetch_latest_per_entity(pool, "disk_io_stats", "*", host, "device_name").await?;
    Ok(rows.iter().map(row_to_disk_io_stats).collect())
}

/// One pool's rows since `since`, ascending by time — fed into
/// `even_sample_indices` per entity by the `per_pool` sampling path.
pub async fn list_pool_io_for_pool_since(
    pool: &SqlitePool,
    host: &str,
    pool_name: &str,
    since: chrono::DateTime<chrono::Utc>,
) -> Result<Vec<PoolIoStats>, PersistError> {
    let rows = query::fetch_entity_series(pool, "pool_io_stats", "*", host, "pool", pool_name, since).await?;
    Ok(rows.iter().map(row_to_pool_io_stats).collect())
}

/// One device's rows since `since`, ascending by time — fed into
/// `even_sample_indices` per entity by the `per_device` sampling path.
pub async fn list_disk_io_for_device_since(
    pool: &SqlitePool,
    host: &str,
    device_name: &str,
    since: chrono::DateTime<chrono::Utc>,
) -> Result<Vec<DiskIoStats>, PersistError> {
    let rows = query::fetch_entity_series(pool, "disk_io_stats", "*", host, "device_name", device_name, since).await?;
    Ok(rows.iter().map(row_to_disk_io_stats).collect())
}

fn scan_type_str(t: ScanType) -> &'static str {
    match t {
        ScanType::Iostat => "iostat",
        ScanType::Status => "status",
        ScanType::List => "list",
    }
}

fn row_to_disk(row: &sqlx::sqlite::SqliteRow) -> Disk {
    Disk {
        host: row.get("host"),
        device_name: row.get("device_name"),
        disk_index: row.get("disk_index"),
        serial_number: row.get("serial_number"),
        manufacturer: row.get("manufacturer"),
        model: row.get("model"),
        firmware: row.get("firmware"),
        capacity: row.get("capacity"),
        capacity_bytes: row.get("capacity_bytes"),
        disk_type: row.get("disk_type"),
        interface_type: row.get("interface_type"),
        pool_assignment: row.get("pool_assignment"),
        is_available: row.get("is_available"),
    }
}

fn scan_type_parse(s: &str) -> ScanType {
    match s {
        "status" => ScanType::Status,
        "list" => ScanType::List,
        _ => ScanType::Iostat,
    }
}

fn row_to_pool(row: &sqlx::sqlite::SqliteRow) -> ZfsPool {
    ZfsPool {
        host: row.get("host"),
        pool: row.get("pool"),
        scan_timestamp: chrono::DateTime::parse_from_rfc3339(&row.get::<String, _>("scan_timestamp")).unwrap().with_timezone(&chrono::Utc),
        scan_type: scan_type_parse(&row.get::<String, _>("scan_type")),
        alloc: row.get("alloc"),
        alloc_bytes: row.get("alloc_bytes"),
        free: row.get("free"),
        free_bytes: row.get("free_bytes"),
        capacity_pct: row.get("capacity_pct"),
        read_ops: row.get("read_ops"),
        write_ops: row.get("write_ops"),
        read_bandwidth_bytes: row.get("read_bandwidth_bytes"),
        write_bandwidth_bytes: row.get("write_bandwidth_bytes"),
        health: row.get("health"),
        status: row.get("status"),
        errors: row.get("errors"),
        pool_type: row.get("pool_type"),
    }
}

fn row_to_dataset(row: &sqlx::sqlite::SqliteRow) -> ZfsDataset {
    ZfsDataset {
        host: row.get("host"),
        name: row.get("name"),
        pool: row.get("pool"),
        scan_timestamp: chrono::DateTime::parse_from_rfc3339(&row.get::<String, _>("scan_timestamp")).unwrap().with_timezone(&chrono::Utc),
        dataset_type: row.get("dataset_type"),
        used: row.get("used"),
        used_bytes: row.get("used_bytes"),
        available: row.get("available"),
        available_bytes: row.get("available_bytes"),
        referenced: row.get("referenced"),
        referenced_bytes: row.get("referenced_bytes"),
        compressratio: row.get("compressratio"),
        mountpoint: row.get("mountpoint"),
        properties: row
            .get::<Option<String>, _>("properties")
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or(serde_json::json!({})),
        dataset_exists: row.get("dataset_exists"),
    }
}

fn row_to_disk_io_stats(row: &sqlx::sqlite::SqliteRow) -> DiskIoStats {
    DiskIoStats {
        host: row.get("host"),
        device_name: row.get("device_name"),
        scan_timestamp: chrono::DateTime::parse_from_rfc3339(&row.get::<String, _>("scan_timestamp")).unwrap().with_timezone(&chrono::Utc),
        read_ops: row.get("read_ops"),
        write_ops: row.get("write_ops"),
        read_bandwidth_bytes: row.get("read_bandwidth_bytes"),
        write_bandwidth_bytes: row.get("write_bandwidth_bytes"),
    }
}

fn row_to_pool_io_stats(row: &sqlx::sqlite::SqliteRow) -> PoolIoStats {
    PoolIoStats {
        host: row.get("host"),
        pool: row.get("pool"),
        scan_timestamp: chrono::DateTime::parse_from_rfc3339(&row.get::<String, _>("scan_timestamp")).unwrap().with_timezone(&chrono::Utc),
        read_ops: row.get("read_ops"),
        write_ops: row.get("write_ops"),
        read_bandwidth_bytes: row.get("read_bandwidth_bytes"),
        write_bandwidth_bytes: row.get("write_bandwidth_bytes"),
        total_wait_ms: row.get("total_wait_ms"),
        disk_wait_ms: row.get("disk_wait_ms"),
        syncq_wait_ms: row.get("syncq_wait_ms"),
        asyncq_wait_ms: row.get("asyncq_wait_ms"),
        scrub_wait_ms: row.get("scrub_wait_ms"),
        trim_wait_ms: row.get("trim_wait_ms"),
        pool_type: row.get("pool_type"),
    }
}

fn row_to_arc_stats(row: &sqlx::sqlite::SqliteRow) -> ArcStats {
    ArcStats {
        host: row.get("host"),
        scan_timestamp: chrono::DateTime::parse_from_rfc3339(&row.get::<String, _>("scan_timestamp")).unwrap().with_timezone(&chrono::Utc),
        size_bytes: row.get("size_bytes"),
        target_size_bytes: row.get("target_size_bytes"),
        min_size_bytes: row.get("min_size_bytes"),
        max_size_bytes: row.get("max_size_bytes"),
        mru_size_bytes: row.get("mru_size_bytes"),
        mfu_size_bytes: row.get("mfu_size_bytes"),
        data_size_bytes: row.get("data_size_bytes"),
        meta_size_bytes: row.get("meta_size_bytes"),
        hits: row.get::<Option<i64>, _>("hits").map(|v| v as u64),
        misses: row.get::<Option<i64>, _>("misses").map(|v| v as u64),
        demand_data_hits: row.get::<Option<i64>, _>("demand_data_hits").map(|v| v as u64),
        demand_data_misses: row.get::<Option<i64>, _>("demand_data_misses").map(|v| v as u64),
        prefetch_hits: row.get::<Option<i64>, _>("prefetch_hits").map(|v| v as u64),
        prefetch_misses: row.get::<Option<i64>, _>("prefetch_misses").map(|v| v as u64),
        hit_ratio_pct: row.get("hit_ratio_pct"),
        l2_hits: row.get::<Option<i64>, _>("l2_hits").map(|v| v as u64),
        l2_misses: row.get::<Option<i64>, _>("l2_misses").map(|v| v as u64),
        l2_size_bytes: row.get("l2_size_bytes"),
    }
}

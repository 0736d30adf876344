//! Persistence for CPU/memory time-series.

use sqlx::{Row, SqlitePool};

use crate::error::PersistError;
use crate::model::{CpuStats, MemoryStats};

pub async fn insert_cpu_stats(pool: &SqlitePool, stats: &CpuStats) -> Result<(), PersistError> {
    sqlx::query(
        "INSERT INTO cpu_stats (host, scan_timestamp, utilization_pct, load_avg_1, load_avg_5, load_avg_15,
            context_switches_per_sec, interrupts_per_sec, syscalls_per_sec, processes_running, processes_blocked,
            cpu_count, per_core)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&stats.host)
    .bind(stats.scan_timestamp.to_rfc3339())
    .bind(stats.utilization_pct)
    .bind(stats.load_avg_1)
    .bind(stats.load_avg_5)
    .bind(stats.load_avg_15)
    .bind(stats.context_switches_per_sec)
    .bind(stats.interrupts_per_sec)
    .bind(stats.syscalls_per_sec)
    .bind(stats.processes_running)
    .bind(stats.processes_blocked)
    .bind(stats.cpu_count)
    .bind(stats.per_core.as_ref().map(|v| v.to_string()))
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn insert_memory_stats(pool: &SqlitePool, stats: &MemoryStats) -> Result<(), PersistError> {
    sqlx::query(
        "INSERT INTO memory_stats (host, scan_timestamp, total_bytes, used_bytes, free_bytes, utilization_pct,
            swap_total_bytes, swap_used_bytes, page_in_per_sec, page_out_per_sec, page_fault_per_sec)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&stats.host)
    .bind(stats.scan_timestamp.to_rfc3339())
    .bind(stats.total_bytes)
    .bind(stats.used_bytes)
    .bind(stats.free_bytes)
    .bind(stats.utilization_pct)
    .bind(stats.swap_total_bytes)
    .bind(stats.swap_used_bytes)
    .bind(stats.page_in_per_sec)
    .bind(stats.page_out_per_sec)
    .bind(stats.page_fault_per_sec)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn latest_cpu_stats(pool: &SqlitePool, host: &str) -> Result<Option<CpuStats>, PersistError> {
    let row = sqlx::query("SELECT * FROM cpu_stats WHERE host = ? ORDER BY scan_timestamp DESC LIMIT 1")
        .bind(host)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|r| row_to_cpu_stats(&r)))
}

pub async fn list_cpu_stats_since(pool: &SqlitePool, host: &str, since: chrono::DateTime<chrono::Utc>) -> Result<Vec<CpuStats>, PersistError> {
    let rows = sqlx::query("SELECT * FROM cpu_stats WHERE host = ? AND scan_timestamp >= ? ORDER BY scan_timestamp ASC")
        .bind(host)
        .bind(since.to_rfc3339())
        .fetch_all(pool)
        .await?;
    Ok(rows.iter().map(row_to_cpu_stats).collect())
}

pub async fn latest_memory_stats(pool: &SqlitePool, host: &str) -> Result<Option<MemoryStats>, PersistError> {
    let row = sqlx::query("SELECT * FROM memory_stats WHERE host = ? ORDER BY scan_timestamp DESC LIMIT 1")
        .bind(host)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|r| row_to_memory_stats(&r)))
}

pub async fn list_memory_stats_since(pool: &SqlitePool, host: &str, since: chrono::DateTime<chrono::Utc>) -> Result<Vec<MemoryStats>, PersistError> {
    let rows = sqlx::query("SELECT * FROM memory_stats WHERE host = ? AND scan_timestamp >= ? ORDER BY scan_timestamp ASC")
        .bind(host)
        .bind(since.to_rfc3339())
        .fetch_all(pool)
        .await?;
    Ok(rows.iter().map(row_to_memory_stats).collect())
}

fn row_to_cpu_stats(r: &sqlx::sqlite::SqliteRow) -> CpuStats {
    CpuStats {
        host: r.get("host"),
        scan_timestamp: chrono::DateTime::parse_from_rfc3339(&r.get::<String, _>("scan_timestamp")).unwrap().with_timezone(&chrono::Utc),
        utilization_pct: r.get("utilization_pct"),
        load_avg_1: r.get("load_avg_1"),
        load_avg_5: r.get("load_avg_5"),
        load_avg_15: r.get("load_avg_15"),
        context_switches_per_sec: r.get("context_switches_per_sec"),
        interrupts_per_sec: r.get("interrupts_per_sec"),
        syscalls_per_sec: r.get("syscalls_per_sec"),
        processes_running: r.get("processes_running"),
        processes_blocked: r.get("processes_blocked"),
        cpu_count: r.get("cpu_count"),
        per_core: r.get::<Option<String>, _>("per_core").and_then(|s| serde_json::from_str(&s).ok()),
    }
}

fn row_to_memory_stats(r: &sqlx::sqlite::SqliteRow) -> MemoryStats {
    MemoryStats {
        host: r.get("host"),
        scan_timestamp: chrono::DateTime::parse_from_rfc3339(&r.get::<String, _>("scan_timestamp")).unwrap().with_timezone(&chrono::Utc),
        total_bytes: r.get("total_bytes"),
        used_bytes: r.get("used_bytes"),
        free_bytes: r.get("free_bytes"),
        utilization_pct: r.get("utilization_pct"),
        swap_total_bytes: r.get("swap_total_bytes"),
        swap_used_bytes: r.get("swap_used_bytes"),
        page_in_per_sec: r.get("page_in_per_sec"),
        page_out_per_sec: r.get("page_out_per_sec"),
        page_fault_per_sec: r.get("page_fault_per_sec"),
    }
}

//! Persistence for [`HostInfo`], upserted at init and after every collector pass.

use sqlx::{Row, SqlitePool};

use crate::error::PersistError;
use crate::model::HostInfo;

pub async fn upsert(pool: &SqlitePool, info: &HostInfo) -> Result<(), PersistError> {
    sqlx::query(
        "INSERT INTO host_info (host, hostname, platform, release, arch, uptime_seconds, feature_flags,
            last_network_config_scan, last_network_usage_scan, last_storage_scan, last_storage_frequent_scan,
            last_devices_scan, last_system_metrics_scan, error_counts, last_error_message)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(host) DO UPDATE SET
            hostname = excluded.hostname,
            platform = excluded.platform,
            release = excluded.release,
            arch = excluded.arch,
            uptime_seconds = excluded.uptime_seconds,
            feature_flags = excluded.feature_flags,
            last_network_config_scan = COALESCE(excluded.last_network_config_scan, host_info.last_network_config_scan),
            last_network_usage_scan = COALESCE(excluded.last_network_usage_scan, host_info.last_network_usage_scan),
            last_storage_scan = COALESCE(excluded.last_storage_scan, host_info.last_storage_scan),
            last_storage_frequent_scan = COALESCE(excluded.last_storage_frequent_scan, host_info.last_storage_frequent_scan),
            last_devices_scan = COALESCE(excluded.last_devices_scan, host_info.last_devices_scan),
            last_system_metrics_scan = COALESCE(excluded.last_system_metrics_scan, host_info.last_system_metrics_scan),
            error_counts = excluded.error_counts,
            last_error_message = excluded.last_error_message",
    )
    .bind(&info.host)
    .bind(&info.hostname)
    .bind(&info.platform)
    .bind(&info.release)
    .bind(&info.arch)
    .bind(info.uptime_seconds)
    .bind(info.feature_flags.to_string())
    .bind(info.last_network_config_scan.map(|t| t.to_rfc3339()))
    .bind(info.last_network_usage_scan.map(|t| t.to_rfc3339()))
    .bind(info.last_storage_scan.map(|t| t.to_rfc3339()))
    .bind(info.last_storage_frequent_scan.map(|t| t.to_rfc3339()))
    .bind(info.last_devices_scan.map(|t| t.to_rfc3339()))
    .bind(info.last_system_metrics_scan.map(|t| t.to_rfc3339()))
    .bind(info.error_counts.to_string())
    .bind(&info.last_error_message)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get(pool: &SqlitePool, host: &str) -> Result<Option<HostInfo>, PersistError> {
    let row = sqlx::query("SELECT * FROM host_info WHERE host = ?").bind(host).fetch_optional(pool).await?;
    Ok(row.map(|r| row_to_host_info(&r)))
}

fn parse_ts(s: Option<String>) -> Option<chrono::DateTime<chrono::Utc>> {
    s.and_then(|s| chrono::DateTime::parse_from_rfc3339(&s).ok()).map(|d| d.with_timezone(&chrono::Utc))
}

fn row_to_host_info(row: &sqlx::sqlite::SqliteRow) -> HostInfo {
    HostInfo {
        host: row.get("host"),
        hostname: row.get("hostname"),
        platform: row.get("platform"),
        release: row.get("release"),
        arch: row.get("arch"),
        uptime_seconds: row.get("uptime_seconds"),
        feature_flags: serde_json::from_str(row.get::<String, _>("feature_flags").as_str()).unwrap_or(serde_json::json!({})),
        last_network_config_scan: parse_ts(row.get("last_network_config_scan")),
        last_network_usage_scan: parse_ts(row.get("last_network_usage_scan")),
        last_storage_scan: parse_ts(row.get("last_storage_scan")),
        last_storage_frequent_scan: parse_ts(row.get("last_storage_frequent_scan")),
        last_devices_scan: parse_ts(row.get("last_devices_scan")),
        last_system_metrics_scan: parse_ts(row.get("last_system_metrics_scan")),
        error_counts: serde_json::from_str(row.get::<String, _>("error_counts").as_str()).unwrap_or(serde_json::json!({})),
        last_error_message: row.get("last_error_message"),
    }
}

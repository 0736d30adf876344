//! Cleanup Service: a daily sweep pruning append-only history tables past
//! their configured retention, plus the task queue's own terminal-task
//! purge (§4.5).

use std::time::Duration;

use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::storage::task_repo;

/// Retention window per collector family, read from configuration. Values
/// apply to every table a family appends rows to (e.g. `storage` covers
/// both `zfs_pool` and `zfs_dataset`).
#[derive(Debug, Clone, Copy)]
pub struct RetentionConfig {
    pub network_usage: chrono::Duration,
    pub network_config: chrono::Duration,
    pub storage: chrono::Duration,
    pub storage_frequent: chrono::Duration,
    pub devices: chrono::Duration,
    pub system_metrics: chrono::Duration,
    pub task: chrono::Duration,
}

/// One append-only table and the retention window that applies to it.
struct RetentionEntry {
    table: &'static str,
    retention: fn(&RetentionConfig) -> chrono::Duration,
}

const ENTRIES: &[RetentionEntry] = &[
    RetentionEntry { table: "network_usage", retention: |r| r.network_usage },
    RetentionEntry { table: "ip_address", retention: |r| r.network_config },
    RetentionEntry { table: "route", retention: |r| r.network_config },
    RetentionEntry { table: "zfs_pool", retention: |r| r.storage },
    RetentionEntry { table: "zfs_dataset", retention: |r| r.storage },
    RetentionEntry { table: "disk_io_stats", retention: |r| r.storage },
    RetentionEntry { table: "pool_io_stats", retention: |r| r.storage_frequent },
    RetentionEntry { table: "arc_stats", retention: |r| r.storage_frequent },
    RetentionEntry { table: "pci_device", retention: |r| r.devices },
    RetentionEntry { table: "cpu_stats", retention: |r| r.system_metrics },
    RetentionEntry { table: "memory_stats", retention: |r| r.system_metrics },
];

pub struct CleanupService {
    pool: SqlitePool,
    retention: RetentionConfig,
}

impl CleanupService {
    pub fn new(pool: SqlitePool, retention: RetentionConfig) -> Self {
        Self { pool, retention }
    }

    /// Installs the daily timer. Returns the task handle so callers can
    /// abort it alongside the Scheduler's own timers on shutdown.
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(Duration::from_secs(24 * 60 * 60));
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tick.tick().await;
                self.run_once().await;
            }
        })
    }

    /// Runs every registered retention sweep once, logging rows removed per
    /// table. Exposed directly so tests and a manual admin trigger can run
    /// the sweep without waiting for the daily timer.
    pub async fn run_once(&self) {
        for entry in ENTRIES {
            let cutoff = chrono::Utc::now() - (entry.retention)(&self.retention);
            match delete_older_than(&self.pool, entry.table, cutoff).await {
                Ok(rows) if rows > 0 => info!(table = entry.table, rows, "cleanup: purged expired rows"),
                Ok(_) => {}
                Err(e) => warn!(table = entry.table, error = %e, "cleanup: purge failed"),
            }
        }

        match task_repo::purge_terminal(&self.pool, self.retention.task).await {
            Ok(rows) if rows > 0 => info!(rows, "cleanup: purged terminal tasks"),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "cleanup: task purge failed"),
        }
    }
}

async fn delete_older_than(pool: &SqlitePool, table: &str, cutoff: chrono::DateTime<chrono::Utc>) -> Result<u64, crate::error::PersistError> {
    let sql = format!("DELETE FROM {table} WHERE scan_timestamp < ?");
    let result = sqlx::query(&sql).bind(cutoff.to_rfc3339()).execute(pool).await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_retention() -> RetentionConfig {
        RetentionConfig {
            network_usage: chrono::Duration::days(7),
            network_config: chrono::Duration::days(30),
            storage: chrono::Duration::days(14),
            storage_frequent: chrono::Duration::days(3),
            devices: chrono::Duration::days(30),
            system_metrics: chrono::Duration::days(14),
            task: chrono::Duration::days(7),
        }
    }

    #[tokio::test]
    async fn run_once_purges_expired_network_usage_rows() {
        let pool = crate::storage::open_in_memory().await.unwrap();
        let old = chrono::Utc::now() - chrono::Duration::days(30);
        sqlx::query("INSERT INTO network_usage (host, link, scan_timestamp, ipackets, rbytes, ierrors, opackets, obytes, oerrors) VALUES ('h','net0',?,0,0,0,0,0,0)")
            .bind(old.to_rfc3339())
            .execute(&pool)
            .await
            .unwrap();

        let service = CleanupService::new(pool.clone(), test_retention());
        service.run_once().await;

        let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM network_usage").fetch_one(&pool).await.unwrap();
        assert_eq!(remaining, 0);
    }
}

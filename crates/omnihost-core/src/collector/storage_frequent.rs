//! Storage-frequent collector: pool iostat + latency sampling. Cadence: ~10s
//! (§4.3). Per pool, a `1 2` sample pair is taken; the first (cumulative
//! since boot) sample is discarded, only the second (real-time) is kept.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{debug, warn};

use crate::collector::{Collector, CollectorContext};
use crate::error::CollectOutcome;
use crate::model::{ArcStats, PoolIoStats};
use crate::parser::storage as storage_parser;
use crate::runner::CommandSpec;
use crate::storage::storage_repo;

pub struct StorageFrequentCollector {
    busy: AtomicBool,
    interval: Duration,
}

impl StorageFrequentCollector {
    pub fn new(interval: Duration) -> Self {
        Self { busy: AtomicBool::new(false), interval }
    }
}

impl Collector for StorageFrequentCollector {
    const NAME: &'static str = "storage_frequent";

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn collect(&self, ctx: &CollectorContext) -> CollectOutcome {
        if self.busy.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst).is_err() {
            debug!(collector = Self::NAME, "single-flight latch held, skipping");
            return CollectOutcome::Busy;
        }
        let outcome = self.run(ctx).await;
        self.busy.store(false, Ordering::SeqCst);

        let health = ctx.host_state.record(
            Self::NAME,
            outcome,
            matches!(outcome, CollectOutcome::Failed).then(|| "storage-frequent collection failed".to_string()),
        );
        if matches!(health, crate::host_state::CollectorHealth::Disabled) {
            warn!(collector = Self::NAME, "consecutive error threshold reached, collector disabled");
            return CollectOutcome::Disabled;
        }
        outcome
    }
}

impl StorageFrequentCollector {
    async fn run(&self, ctx: &CollectorContext) -> CollectOutcome {
        let host = ctx.host.to_string();
        let Ok(Ok((stats, arc))) = tokio::task::spawn_blocking(move || collect_sync(&host)).await else {
            return CollectOutcome::Failed;
        };
        for s in &stats {
            if storage_repo::insert_pool_io_stats(&ctx.pool, s).await.is_err() {
                return CollectOutcome::Failed;
            }
        }
        if storage_repo::insert_arc_stats(&ctx.pool, &arc).await.is_err() {
            return CollectOutcome::Failed;
        }
        CollectOutcome::Success
    }
}

fn collect_sync(host: &str) -> Result<(Vec<PoolIoStats>, ArcStats), crate::error::CommandError> {
    let pool_names_out = crate::runner::run(&CommandSpec::new("zpool", &["list", "-Hp", "-o", "name"]));
    let pool_names: Vec<&str> = pool_names_out.stdout.lines().filter(|l| !l.is_empty()).collect();

    let mut results = Vec::with_capacity(pool_names.len());
    for pool in pool_names {
        let iostat_out = crate::runner::run(&CommandSpec::new("zpool", &["iostat", "-Hp", pool, "1", "2"]));
        let samples: Vec<&str> = iostat_out.stdout.lines().filter(|l| !l.is_empty()).collect();
        // First sample is cumulative-since-boot, skip it; keep the second.
        let Some(second) = samples.get(1) else { continue };
        let Ok(mut stats) = storage_parser::parse_zpool_iostat_line(host, pool, second) else { continue };

        let latency_out = crate::runner::run(&CommandSpec::new("zpool", &["iostat", "-Hp", "-l", pool, "1", "2"]));
        let latency_samples: Vec<&str> = latency_out.stdout.lines().filter(|l| !l.is_empty()).collect();
        if let Some(second_latency) = latency_samples.get(1) {
            storage_parser::parse_zpool_iostat_latency_line(&mut stats, second_latency);
        }

        let status_out = crate::runner::run(&CommandSpec::new("zpool", &["status", pool]));
        stats.pool_type = detect_pool_type(&status_out.stdout);

        results.push(stats);
    }

    let arcstats_out = crate::runner::run(&CommandSpec::new("kstat", &["-p", "zfs:0:arcstats"]));
    let arc_lines: Vec<String> = arcstats_out.stdout.lines().map(|l| l.to_string()).collect();
    let arc = storage_parser::parse_arcstats_kstat(host, &arc_lines);

    Ok((results, arc))
}

/// Scans `zpool status` topology lines for a vdev keyword to label the
/// pool's redundancy layout.
fn detect_pool_type(status_text: &str) -> Option<String> {
    for keyword in ["raidz3", "raidz2", "raidz1", "raidz", "mirror", "stripe"] {
        if status_text.to_ascii_lowercase().contains(keyword) {
            return Some(keyword.to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_mirror_topology() {
        let text = "  pool: rpool\n state: ONLINE\nconfig:\n\n\tNAME        STATE\n\trpool       ONLINE\n\t  mirror-0  ONLINE\n\t    c1t0d0  ONLINE\n\t    c1t1d0  ONLINE\n";
        assert_eq!(detect_pool_type(text), Some("mirror".to_string()));
    }

    #[test]
    fn detects_raidz_before_generic_mirror_keyword_absent() {
        let text = "config:\n\traidz1-0\n\t  c1t0d0\n";
        assert_eq!(detect_pool_type(text), Some("raidz1".to_string()));
    }
}

//! System-metrics collector: CPU and memory snapshots. Cadence: ~30s (§4.3).

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{debug, warn};

use crate::collector::{Collector, CollectorContext};
use crate::error::CollectOutcome;
use crate::model::{CpuStats, MemoryStats};
use crate::parser::system as system_parser;
use crate::runner::CommandSpec;
use crate::storage::system_repo;

pub struct SystemMetricsCollector {
    busy: AtomicBool,
    interval: Duration,
}

impl SystemMetricsCollector {
    pub fn new(interval: Duration) -> Self {
        Self { busy: AtomicBool::new(false), interval }
    }
}

impl Collector for SystemMetricsCollector {
    const NAME: &'static str = "system_metrics";

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
            matches!(outcome, CollectOutcome::Failed).then(|| "system-metrics collection failed".to_string()),
        );
        if matches!(health, crate::host_state::CollectorHealth::Disabled) {
            warn!(collector = Self::NAME, "consecutive error threshold reached, collector disabled");
            return CollectOutcome::Disabled;
        }
        outcome
    }
}

impl SystemMetricsCollector {
    async fn run(&self, ctx: &CollectorContext) -> CollectOutcome {
        let host = ctx.host.to_string();
        let Ok(Ok((cpu, mem))) = tokio::task::spawn_blocking(move || collect_sync(&host)).await else {
            return CollectOutcome::Failed;
        };

        if system_repo::insert_cpu_stats(&ctx.pool, &cpu).await.is_err() {
            return CollectOutcome::Failed;
        }
        if system_repo::insert_memory_stats(&ctx.pool, &mem).await.is_err() {
            return CollectOutcome::Failed;
        }
        CollectOutcome::Success
    }
}

fn collect_sync(host: &str) -> Result<(CpuStats, MemoryStats), crate::error::CommandError> {
    let vmstat_out = crate::runner::run(&CommandSpec::new("vmstat", &["1", "2"]));
    let vmstat_lines: Vec<&str> = vmstat_out.stdout.lines().filter(|l| !l.trim().is_empty()).collect();
    // First sample (after the two header lines) is cumulative since boot.
    let second = vmstat_lines.last().copied().unwrap_or_default();
    let fields: Vec<String> = second.split_whitespace().map(|s| s.to_string()).collect();

    let load_out = crate::runner::run(&CommandSpec::new(
        "kstat",
        &["-p", "unix:0:system_misc:avenrun_1min", "unix:0:system_misc:avenrun_5min", "unix:0:system_misc:avenrun_15min"],
    ));
    let loads = parse_kstat_values(&load_out.stdout);
    let scale = 256.0; // avenrun_* values are fixed-point, scaled by FSCALE (256).
    let load_avg_1 = loads.first().map(|v| v / scale);
    let load_avg_5 = loads.get(1).map(|v| v / scale);
    let load_avg_15 = loads.get(2).map(|v| v / scale);

    let ncpu_out = crate::runner::run(&CommandSpec::new("psrinfo", &["-p"]));
    let cpu_count = ncpu_out.stdout.trim().parse::<i64>().ok();

    let cpu = system_parser::build_cpu_stats(host, &fields, load_avg_1, load_avg_5, load_avg_15, cpu_count);

    let pages_out = crate::runner::run(&CommandSpec::new("kstat", &["-p", "unix:0:system_pages:pagestotal", "unix:0:system_pages:pagesfree"]));
    let pages = parse_kstat_values(&pages_out.stdout);
    let pagesize_out = crate::runner::run(&CommandSpec::new("pagesize", &[]));
    let pagesize = pagesize_out.stdout.trim().parse::<f64>().unwrap_or(4096.0);
    let total_bytes = pages.first().map(|v| v * pagesize);
    let free_bytes = pages.get(1).map(|v| v * pagesize);

    let swap_out = crate::runner::run(&CommandSpec::new("swap", &["-s"]));
    let (swap_total_bytes, swap_used_bytes) = system_parser::parse_swap_s(swap_out.stdout.trim());

    let vmstat_paging_out = crate::runner::run(&CommandSpec::new("vmstat", &["-p", "1", "2"]));
    let paging_lines: Vec<&str> = vmstat_paging_out.stdout.lines().filter(|l| !l.trim().is_empty()).collect();
    let paging_second = paging_lines.last().copied().unwrap_or_default();
    let paging_fields: Vec<f64> = paging_second.split_whitespace().filter_map(|s| s.parse().ok()).collect();
    let page_in_per_sec = paging_fields.get(4).copied();
    let page_out_per_sec = paging_fields.get(5).copied();
    let page_fault_per_sec = paging_fields.get(7).copied();

    let mem = system_parser::build_memory_stats(
        host,
        total_bytes,
        free_bytes,
        swap_total_bytes,
        swap_used_bytes,
        page_in_per_sec,
        page_out_per_sec,
        page_fault_per_sec,
    );

    Ok((cpu, mem))
}

/// Parses `kstat -p`'s `module:instance:name:stat\tvalue` lines into their
/// numeric values, in the order the stat names were requested.
fn parse_kstat_values(text: &str) -> Vec<f64> {
    text.lines().filter_map(|l| l.split_whitespace().last()).filter_map(|v| v.parse().ok()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_kstat_tab_separated_values() {
        let text = "unix:0:system_misc:avenrun_1min\t256\nunix:0:system_misc:avenrun_5min\t128\n";
        assert_eq!(parse_kstat_values(text), vec![256.0, 128.0]);
    }

    #[test]
    fn parses_kstat_values_empty_on_blank_input() {
        assert!(parse_kstat_values("").is_empty());
    }
}

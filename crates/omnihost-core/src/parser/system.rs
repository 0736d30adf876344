//! Parsers for host-wide CPU/memory metrics (`kstat`, `vmstat`, `prtconf`).

use crate::model::{CpuStats, MemoryStats};
use crate::parser::units::round2;

/// Builds [`CpuStats`] from one line of `vmstat 1 2`'s second sample plus a
/// `kstat -p unix:0:system_misc:avenrun_1min` style load-average readout.
/// The first `vmstat` sample is always discarded by the caller (its counters
/// are lifetime cumulative, not instantaneous).
pub fn build_cpu_stats(
    host: &str,
    vmstat_fields: &[String],
    load_avg_1: Option<f64>,
    load_avg_5: Option<f64>,
    load_avg_15: Option<f64>,
    cpu_count: Option<i64>,
) -> CpuStats {
    let num = |i: usize| -> Option<f64> { vmstat_fields.get(i).and_then(|s| s.trim().parse().ok()) };
    let idle_pct = num(21);
    let utilization_pct = idle_pct.map(|idle| round2(100.0 - idle));
    CpuStats {
        host: host.to_string(),
        scan_timestamp: chrono::Utc::now(),
        utilization_pct,
        load_avg_1,
        load_avg_5,
        load_avg_15,
        context_switches_per_sec: num(16),
        interrupts_per_sec: num(14),
        syscalls_per_sec: num(15),
        processes_running: num(0).map(|v| v as i64),
        processes_blocked: num(1).map(|v| v as i64),
        cpu_count,
        per_core: None,
    }
}

/// Builds [`MemoryStats`] from `kstat -p unix:0:system_pages` plus
/// `swap -s` totals. `vmstat`'s `freemem` page count is converted to bytes
/// by the caller using the platform page size (`pagesize -a`, usually 4096).
pub fn build_memory_stats(
    host: &str,
    total_bytes: Option<f64>,
    free_bytes: Option<f64>,
    swap_total_bytes: Option<f64>,
    swap_used_bytes: Option<f64>,
    page_in_per_sec: Option<f64>,
    page_out_per_sec: Option<f64>,
    page_fault_per_sec: Option<f64>,
) -> MemoryStats {
    let used_bytes = match (total_bytes, free_bytes) {
        (Some(t), Some(f)) => Some((t - f).max(0.0)),
        _ => None,
    };
    let utilization_pct = match (used_bytes, total_bytes) {
        (Some(u), Some(t)) if t > 0.0 => Some(round2(u / t * 100.0)),
        _ => None,
    };
    MemoryStats {
        host: host.to_string(),
        scan_timestamp: chrono::Utc::now(),
        total_bytes,
        used_bytes,
        free_bytes,
        utilization_pct,
        swap_total_bytes,
        swap_used_bytes,
        page_in_per_sec,
        page_out_per_sec,
        page_fault_per_sec,
    }
}

/// Parses `swap -s` output: `total: 1048576k bytes allocated + 65536k reserved = 1114112k used, 4194304k available`.
pub fn parse_swap_s(line: &str) -> (Option<f64>, Option<f64>) {
    let used_kb = line
        .split('=')
        .nth(1)
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|tok| tok.trim_end_matches('k').parse::<f64>().ok());
    let available_kb = line
        .rsplit(',')
        .next()
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|tok| tok.trim_end_matches('k').parse::<f64>().ok());
    let used = used_kb.map(|v| v * 1024.0);
    let total = match (used_kb, available_kb) {
        (Some(u), Some(a)) => Some((u + a) * 1024.0),
        _ => None,
    };
    (total, used)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpu_utilization_is_complement_of_idle() {
        let fields: Vec<String> = (0..22).map(|i| if i == 21 { "35".to_string() } else { "0".to_string() }).collect();
        let stats = build_cpu_stats("h", &fields, Some(1.0), Some(1.2), Some(1.5), Some(4));
        assert_eq!(stats.utilization_pct, Some(65.0));
        assert_eq!(stats.cpu_count, Some(4));
    }

    #[test]
    fn memory_utilization_derives_from_total_and_free() {
        let stats = build_memory_stats("h", Some(1000.0), Some(250.0), Some(2000.0), Some(100.0), None, None, None);
        assert_eq!(stats.used_bytes, Some(750.0));
        assert_eq!(stats.utilization_pct, Some(75.0));
    }

    #[test]
    fn parses_swap_s_totals() {
        let (total, used) = parse_swap_s("total: 1048576k bytes allocated + 65536k reserved = 1114112k used, 4194304k available");
        assert_eq!(used, Some(1114112.0 * 1024.0));
        assert_eq!(total, Some((1114112.0 + 4194304.0) * 1024.0));
    }
}

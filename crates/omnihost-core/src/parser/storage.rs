//! Parsers for `zpool`, `zfs`, and `pcitool`/`prtconf`-style disk discovery.

use crate::error::ParseError;
use crate::model::{ArcStats, Disk, PoolIoStats, ScanType, ZfsDataset, ZfsPool};
use crate::parser::units::{hit_ratio_pct, unit_to_bytes};

/// Parses one line of `zpool list -Hp -o name,alloc,free,capacity,health`.
pub fn parse_zpool_list_line(host: &str, line: &str) -> Result<ZfsPool, ParseError> {
    let fields: Vec<&str> = line.split('\t').collect();
    let pool = fields.first().ok_or_else(|| ParseError::new("zpool list: missing pool name"))?;
    let alloc = fields.get(1).copied().filter(|s| *s != "-");
    let free = fields.get(2).copied().filter(|s| *s != "-");
    let alloc_bytes = alloc.and_then(unit_to_bytes);
    let free_bytes = free.and_then(unit_to_bytes);
    Ok(ZfsPool {
        host: host.to_string(),
        pool: pool.to_string(),
        scan_timestamp: chrono::Utc::now(),
        scan_type: ScanType::List,
        alloc: alloc.map(str::to_string),
        alloc_bytes,
        free: free.map(str::to_string),
        free_bytes,
        capacity_pct: crate::parser::units::capacity_pct(alloc_bytes, free_bytes),
        read_ops: None,
        write_ops: None,
        read_bandwidth_bytes: None,
        write_bandwidth_bytes: None,
        health: fields.get(4).map(|s| s.to_string()),
        status: None,
        errors: None,
        pool_type: None,
    })
}

/// Parses one data line of `zpool iostat -Hp <pool> 1 2` (the *second*
/// sample, which carries the interval delta rather than lifetime totals —
/// see the storage-frequent collector for the skip-first-sample rule).
pub fn parse_zpool_iostat_line(host: &str, pool: &str, line: &str) -> Result<PoolIoStats, ParseError> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 7 {
        return Err(ParseError::new(format!("zpool iostat: expected >=7 fields, got {}", fields.len())));
    }
    let num = |i: usize| -> Option<f64> { fields.get(i).and_then(|s| s.parse().ok()) };
    Ok(PoolIoStats {
        host: host.to_string(),
        pool: pool.to_string(),
        scan_timestamp: chrono::Utc::now(),
        read_ops: num(3),
        write_ops: num(4),
        read_bandwidth_bytes: num(5),
        write_bandwidth_bytes: num(6),
        total_wait_ms: None,
        disk_wait_ms: None,
        syncq_wait_ms: None,
        asyncq_wait_ms: None,
        scrub_wait_ms: None,
        trim_wait_ms: None,
        pool_type: None,
    })
}

/// Parses the latency breakdown line from `zpool iostat -Hp -l <pool> 1 2`,
/// where columns are `total_wait,disk_wait,syncq_wait,asyncq_wait,scrub_wait,trim_wait`
/// each formatted like `12ms` or `-`.
pub fn parse_zpool_iostat_latency_line(stats: &mut PoolIoStats, line: &str) {
    let fields: Vec<&str> = line.split_whitespace().collect();
    let ms = |s: &str| -> Option<f64> {
        let trimmed = s.trim_end_matches("ms").trim_end_matches("us").trim_end_matches('s');
        if trimmed == "-" || trimmed.is_empty() {
            return None;
        }
        trimmed.parse().ok()
    };
    stats.total_wait_ms = fields.first().and_then(|s| ms(s));
    stats.disk_wait_ms = fields.get(1).and_then(|s| ms(s));
    stats.syncq_wait_ms = fields.get(2).and_then(|s| ms(s));
    stats.asyncq_wait_ms = fields.get(3).and_then(|s| ms(s));
    stats.scrub_wait_ms = fields.get(4).and_then(|s| ms(s));
    stats.trim_wait_ms = fields.get(5).and_then(|s| ms(s));
}

/// Parses one line of
/// `zfs list -Hp -t filesystem,volume -o name,type,used,avail,referenced,compressratio,mountpoint`.
pub fn parse_zfs_list_line(host: &str, line: &str) -> Result<ZfsDataset, ParseError> {
    let fields: Vec<&str> = line.split('\t').collect();
    let name = fields.first().ok_or_else(|| ParseError::new("zfs list: missing name"))?;
    let pool = name.split('/').next().unwrap_or(name).to_string();
    let used = fields.get(2).copied().filter(|s| *s != "-");
    let available = fields.get(3).copied().filter(|s| *s != "-");
    let referenced = fields.get(4).copied().filter(|s| *s != "-");
    let compressratio = fields
        .get(5)
        .and_then(|s| s.trim_end_matches('x').parse::<f64>().ok());
    Ok(ZfsDataset {
        host: host.to_string(),
        name: name.to_string(),
        pool,
        scan_timestamp: chrono::Utc::now(),
        dataset_type: fields.get(1).map(|s| s.to_string()),
        used: used.map(str::to_string),
        used_bytes: used.and_then(unit_to_bytes),
        available: available.map(str::to_string),
        available_bytes: available.and_then(unit_to_bytes),
        referenced: referenced.map(str::to_string),
        referenced_bytes: referenced.and_then(unit_to_bytes),
        compressratio,
        mountpoint: fields.get(6).map(|s| s.to_string()).filter(|s| s != "-"),
        properties: serde_json::json!({}),
        dataset_exists: true,
    })
}

/// Marks a previously-seen dataset as gone (the ZFS collector doesn't delete
/// rows on a missing-from-scan dataset, it flips `dataset_exists`; see the
/// Open Question on tombstone retention in DESIGN.md).
pub fn mark_dataset_absent(mut dataset: ZfsDataset, scan_timestamp: chrono::DateTime<chrono::Utc>) -> ZfsDataset {
    dataset.dataset_exists = false;
    dataset.scan_timestamp = scan_timestamp;
    dataset
}

/// Parses `kstat -p zfs:0:arcstats:<field>` output lines (`module:instance:name:stat\tvalue`).
pub fn parse_arcstats_kstat(host: &str, lines: &[String]) -> ArcStats {
    let mut values = std::collections::HashMap::new();
    for line in lines {
        if let Some((key, value)) = line.rsplit_once('\t') {
            if let Some(stat) = key.rsplit(':').next() {
                values.insert(stat.to_string(), value.trim().parse::<f64>().ok());
            }
        }
    }
    let get = |k: &str| values.get(k).copied().flatten();
    let get_u64 = |k: &str| get(k).map(|v| v as u64);

    ArcStats {
        host: host.to_string(),
        scan_timestamp: chrono::Utc::now(),
        size_bytes: get("size"),
        target_size_bytes: get("c"),
        min_size_bytes: get("c_min"),
        max_size_bytes: get("c_max"),
        mru_size_bytes: get("p"),
        mfu_size_bytes: get("mfu_size"),
        data_size_bytes: get("data_size"),
        meta_size_bytes: get("metadata_size"),
        hits: get_u64("hits"),
        misses: get_u64("misses"),
        demand_data_hits: get_u64("demand_data_hits"),
        demand_data_misses: get_u64("demand_data_misses"),
        prefetch_hits: get_u64("prefetch_data_hits"),
        prefetch_misses: get_u64("prefetch_data_misses"),
        hit_ratio_pct: hit_ratio_pct(get_u64("hits"), get_u64("misses")),
        l2_hits: get_u64("l2_hits"),
        l2_misses: get_u64("l2_misses"),
        l2_size_bytes: get("l2_size"),
    }
}

/// Parses one line of `diskinfo -Hp` (`index:disktype:ctype:name:vid:pid:size:...`).
pub fn parse_diskinfo_line(host: &str, line: &str) -> Result<Disk, ParseError> {
    let fields: Vec<&str> = line.split(':').collect();
    let device_name = fields.get(3).ok_or_else(|| ParseError::new("diskinfo: missing device name"))?;
    let capacity = fields.get(6).copied();
    Ok(Disk {
        host: host.to_string(),
        device_name: device_name.to_string(),
        disk_index: fields.first().and_then(|s| s.parse().ok()),
        serial_number: None,
        manufacturer: fields.get(4).map(|s| s.to_string()),
        model: fields.get(5).map(|s| s.to_string()),
        firmware: None,
        capacity: capacity.map(str::to_string),
        capacity_bytes: capacity.and_then(unit_to_bytes),
        disk_type: fields.get(2).map(|s| s.to_string()),
        interface_type: fields.get(1).map(|s| s.to_string()),
        pool_assignment: None,
        is_available: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zpool_list_capacity_matches_alloc_plus_free() {
        let pool = parse_zpool_list_line("h", "rpool\t120G\t360G\t25\tONLINE").unwrap();
        assert_eq!(pool.health.as_deref(), Some("ONLINE"));
        assert!((pool.capacity_pct.unwrap() - 25.0).abs() < 0.5);
    }

    #[test]
    fn zpool_list_handles_dash_sentinels() {
        let pool = parse_zpool_list_line("h", "rpool\t-\t-\t-\t-").unwrap();
        assert_eq!(pool.alloc, None);
        assert_eq!(pool.capacity_pct, None);
    }

    #[test]
    fn zfs_list_derives_pool_from_dataset_name() {
        let ds = parse_zfs_list_line("h", "rpool/export/home\tfilesystem\t1.20G\t358G\t1.20G\t1.00x\t/export/home").unwrap();
        assert_eq!(ds.pool, "rpool");
        assert!(ds.used_bytes.unwrap() > 0.0);
    }

    #[test]
    fn arcstats_kstat_computes_hit_ratio() {
        let lines = vec![
            "zfs:0:arcstats:hits\t900".to_string(),
            "zfs:0:arcstats:misses\t100".to_string(),
            "zfs:0:arcstats:size\t1073741824".to_string(),
        ];
        let arc = parse_arcstats_kstat("h", &lines);
        assert_eq!(arc.hits, Some(900));
        assert_eq!(arc.hit_ratio_pct, Some(90.0));
        assert_eq!(arc.size_bytes, Some(1073741824.0));
    }

    #[test]
    fn mark_absent_flips_existence_flag() {
        let ds = parse_zfs_list_line("h", "rpool/x\tfilesystem\t1G\t1G\t1G\t1.00x\t/x").unwrap();
        let ts = chrono::Utc::now();
        let gone = mark_dataset_absent(ds, ts);
        assert!(!gone.dataset_exists);
        assert_eq!(gone.scan_timestamp, ts);
    }
}

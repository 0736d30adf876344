//! Storage collector: pool/dataset discovery, zone/VM-filtered dataset
//! detail, disk-to-pool cross-reference. Cadence: minutes (§4.3).

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{debug, warn};

use crate::collector::{Collector, CollectorContext};
use crate::error::CollectOutcome;
use crate::model::{ScanType, ZfsDataset};
use crate::parser::{storage as storage_parser, zones};
use crate::runner::CommandSpec;
use crate::storage::storage_repo;

pub struct StorageCollector {
    busy: AtomicBool,
    interval: Duration,
}

impl StorageCollector {
    pub fn new(interval: Duration) -> Self {
        Self { busy: AtomicBool::new(false), interval }
    }
}

impl Collector for StorageCollector {
    const NAME: &'static str = "storage";

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
            matches!(outcome, CollectOutcome::Failed).then(|| "storage collection failed".to_string()),
        );
        if matches!(health, crate::host_state::CollectorHealth::Disabled) {
            warn!(collector = Self::NAME, "consecutive error threshold reached, collector disabled");
            return CollectOutcome::Disabled;
        }
        outcome
    }
}

impl StorageCollector {
    async fn run(&self, ctx: &CollectorContext) -> CollectOutcome {
        let host = ctx.host.to_string();
        let Ok(Ok((pools, datasets, disks, zone_names))) = tokio::task::spawn_blocking(move || collect_sync(&host)).await else {
            return CollectOutcome::Failed;
        };

        for pool in &pools {
            if storage_repo::insert_pool(&ctx.pool, pool).await.is_err() {
                return CollectOutcome::Failed;
            }
        }

        let relevant: Vec<ZfsDataset> = datasets.into_iter().filter(|d| is_zone_or_vm_related(&d.name, &zone_names)).collect();
        let seen_now: std::collections::HashSet<&str> = relevant.iter().map(|d| d.name.as_str()).collect();

        for ds in &relevant {
            if storage_repo::insert_dataset(&ctx.pool, ds).await.is_err() {
                return CollectOutcome::Failed;
            }
        }

        if let Ok(known) = storage_repo::known_dataset_names(&ctx.pool, &ctx.host).await {
            let now = chrono::Utc::now();
            for name in known.iter().filter(|n| !seen_now.contains(n.as_str())) {
                let tombstone = ZfsDataset {
                    host: ctx.host.to_string(),
                    name: name.clone(),
                    pool: name.split('/').next().unwrap_or(name).to_string(),
                    scan_timestamp: now,
                    dataset_type: None,
                    used: None,
                    used_bytes: None,
                    available: None,
                    available_bytes: None,
                    referenced: None,
                    referenced_bytes: None,
                    compressratio: None,
                    mountpoint: None,
                    properties: serde_json::json!({}),
                    dataset_exists: false,
                };
                let _ = storage_repo::insert_dataset(&ctx.pool, &tombstone).await;
            }
        }

        for disk in &disks {
            let mut disk = disk.clone();
            disk.pool_assignment = cross_reference_pool(&disk.device_name, disk.serial_number.as_deref(), &pools);
            if storage_repo::upsert_disk(&ctx.pool, &disk).await.is_err() {
                return CollectOutcome::Failed;
            }
        }

        CollectOutcome::Success
    }
}

type CollectResult = (Vec<crate::model::ZfsPool>, Vec<ZfsDataset>, Vec<crate::model::Disk>, Vec<String>);

fn collect_sync(host: &str) -> Result<CollectResult, crate::error::CommandError> {
    let zone_out = crate::runner::run(&CommandSpec::new("zoneadm", &["list", "-cp"]));
    let zone_names: Vec<String> = zone_out.stdout.lines().filter_map(|l| zones::parse_zoneadm_list_line(l).ok()).map(|z| z.name).collect();

    let pool_out = crate::runner::run(&CommandSpec::new("zpool", &["list", "-Hp", "-o", "name,alloc,free,capacity,health"]));
    let pools: Vec<crate::model::ZfsPool> = pool_out.stdout.lines().filter(|l| !l.is_empty()).filter_map(|l| storage_parser::parse_zpool_list_line(host, l).ok()).collect();

    let mut pools_with_status = pools;
    for pool in &mut pools_with_status {
        let status_out = crate::runner::run(&CommandSpec::new("zpool", &["status", &pool.pool]));
        pool.status = Some(status_out.stdout.clone());
        pool.scan_type = ScanType::Status;
    }

    let ds_out = crate::runner::run(&CommandSpec::new(
        "zfs",
        &["list", "-Hp", "-t", "filesystem,volume", "-o", "name,type,used,avail,referenced,compressratio,mountpoint"],
    ));
    let datasets: Vec<ZfsDataset> = ds_out.stdout.lines().filter(|l| !l.is_empty()).filter_map(|l| storage_parser::parse_zfs_list_line(host, l).ok()).collect();

    let disk_out = crate::runner::run(&CommandSpec::new("diskinfo", &["-Hp"]));
    let disks: Vec<crate::model::Disk> = disk_out.stdout.lines().filter(|l| !l.is_empty()).filter_map(|l| storage_parser::parse_diskinfo_line(host, l).ok()).collect();

    Ok((pools_with_status, datasets, disks, zone_names))
}

/// Identifies zone/VM-related datasets by path substring or known zone name,
/// per §4.3's "no hard-coded assumptions" discovery rule.
fn is_zone_or_vm_related(dataset_name: &str, zone_names: &[String]) -> bool {
    const MARKERS: &[&str] = &["/zones/", "/vm/", "/vms/", "/bhyve/", "/kvm/"];
    if MARKERS.iter().any(|m| dataset_name.contains(m)) {
        return true;
    }
    zone_names.iter().any(|z| !z.is_empty() && dataset_name.contains(z.as_str()))
}

/// Cross-references a disk with pool membership by searching each pool's
/// `zpool status` text for the device name or serial number.
fn cross_reference_pool(device_name: &str, serial_number: Option<&str>, pools: &[crate::model::ZfsPool]) -> Option<String> {
    pools.iter().find_map(|p| {
        let status = p.status.as_deref().unwrap_or("");
        let matches = status.contains(device_name) || serial_number.is_some_and(|s| status.contains(s));
        matches.then(|| p.pool.clone())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zone_related_dataset_detected_by_path_marker() {
        assert!(is_zone_or_vm_related("rpool/zones/webapp", &[]));
        assert!(is_zone_or_vm_related("rpool/bhyve/db1", &[]));
        assert!(!is_zone_or_vm_related("rpool/export/home", &[]));
    }

    #[test]
    fn zone_related_dataset_detected_by_name_substring() {
        assert!(is_zone_or_vm_related("rpool/data/webapp-storage", &["webapp".to_string()]));
    }

    #[test]
    fn cross_reference_matches_serial_in_status_text() {
        let pools = vec![crate::model::ZfsPool {
            host: "h".into(),
            pool: "rpool".into(),
            scan_timestamp: chrono::Utc::now(),
            scan_type: ScanType::Status,
            alloc: None,
            alloc_bytes: None,
            free: None,
            free_bytes: None,
            capacity_pct: None,
            read_ops: None,
            write_ops: None,
            read_bandwidth_bytes: None,
            write_bandwidth_bytes: None,
            health: None,
            status: Some("c1t0d0  ONLINE  serial=XYZ123".to_string()),
            errors: None,
            pool_type: None,
        }];
        assert_eq!(cross_reference_pool("c1t0d0", Some("XYZ123"), &pools), Some("rpool".to_string()));
    }
}

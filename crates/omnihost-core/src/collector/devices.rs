//! Devices collector: PCI enumeration, passthrough probing, cross-reference
//! against network interfaces and disks. Cadence: minutes (§4.3).

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{debug, warn};

use crate::collector::{Collector, CollectorContext};
use crate::error::CollectOutcome;
use crate::model::PciDevice;
use crate::parser::devices as devices_parser;
use crate::parser::zones;
use crate::runner::CommandSpec;
use crate::storage::device_repo;

pub struct DevicesCollector {
    busy: AtomicBool,
    interval: Duration,
}

impl DevicesCollector {
    pub fn new(interval: Duration) -> Self {
        Self { busy: AtomicBool::new(false), interval }
    }
}

impl Collector for DevicesCollector {
    const NAME: &'static str = "devices";

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
            matches!(outcome, CollectOutcome::Failed).then(|| "devices collection failed".to_string()),
        );
        if matches!(health, crate::host_state::CollectorHealth::Disabled) {
            warn!(collector = Self::NAME, "consecutive error threshold reached, collector disabled");
            return CollectOutcome::Disabled;
        }
        outcome
    }
}

impl DevicesCollector {
    async fn run(&self, ctx: &CollectorContext) -> CollectOutcome {
        let host = ctx.host.to_string();
        let Ok(Ok(devices)) = tokio::task::spawn_blocking(move || collect_sync(&host)).await else {
            return CollectOutcome::Failed;
        };

        let known_ifaces: HashSet<String> = match crate::storage::network_repo::list_interfaces(&ctx.pool, &ctx.host).await {
            Ok(v) => v.into_iter().map(|i| i.link).collect(),
            Err(_) => return CollectOutcome::Failed,
        };
        let known_disks: HashSet<String> = match crate::storage::storage_repo::list_disks(&ctx.pool, &ctx.host).await {
            Ok(v) => v.into_iter().map(|d| d.device_name).collect(),
            Err(_) => return CollectOutcome::Failed,
        };

        for mut dev in devices {
            if let Some(driver) = &dev.driver_name {
                if known_ifaces.contains(driver) {
                    dev.linked_network_interface = Some(driver.clone());
                }
                if known_disks.iter().any(|d| d.contains(driver.as_str())) {
                    dev.linked_disk = known_disks.iter().find(|d| d.contains(driver.as_str())).cloned();
                }
            }
            if device_repo::insert(&ctx.pool, &dev).await.is_err() {
                return CollectOutcome::Failed;
            }
        }

        CollectOutcome::Success
    }
}

fn collect_sync(host: &str) -> Result<Vec<PciDevice>, crate::error::CommandError> {
    let pci_out = crate::runner::run(&CommandSpec::new("pcitool", &["/pci", "-p", "-o", "path,vendor,device,class,driver,instance"]));
    let raw_lines: Vec<devices_parser::RawPciLine> = pci_out.stdout.lines().filter(|l| !l.is_empty()).filter_map(|l| devices_parser::parse_pcitool_line(l).ok()).collect();

    let ppt_json = crate::runner::run_safe(&CommandSpec::new("pptadm", &["list", "-j"]));
    let ppt_text = crate::runner::run_safe(&CommandSpec::new("pptadm", &["list"]));
    let ppt_enabled_addrs = parse_ppt_enabled(ppt_json.as_deref(), ppt_text.as_deref());

    let zone_out = crate::runner::run(&CommandSpec::new("zoneadm", &["list", "-cp"]));
    let zone_names: Vec<String> = zone_out.stdout.lines().filter_map(|l| zones::parse_zoneadm_list_line(l).ok()).map(|z| z.name).collect();

    let mut zone_assignments: std::collections::HashMap<String, Vec<String>> = std::collections::HashMap::new();
    for zone in &zone_names {
        let export = crate::runner::run(&CommandSpec::new("zonecfg", &["-z", zone, "export"]));
        for pci_addr in parse_zonecfg_device_pci_addrs(&export.stdout) {
            zone_assignments.entry(pci_addr).or_default().push(zone.clone());
        }
    }

    let devices = raw_lines
        .into_iter()
        .map(|raw| {
            let assigned = zone_assignments.get(&raw.pci_address).cloned().unwrap_or_default();
            let ppt_enabled = ppt_enabled_addrs.contains(&raw.pci_address);
            let driver_attached = raw.driver_name.is_some();
            devices_parser::build_pci_device(host, raw, None, None, driver_attached, ppt_enabled, assigned, None, None)
        })
        .collect();

    Ok(devices)
}

/// Parses `pptadm list -j`'s JSON array of `{path: "..."}` objects; falls
/// back to scanning `pptadm list`'s plain-text column-1 device paths.
fn parse_ppt_enabled(json: Option<&str>, text: Option<&str>) -> HashSet<String> {
    if let Some(j) = json {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(j) {
            if let Some(arr) = value.as_array() {
                return arr.iter().filter_map(|v| v.get("path").and_then(|p| p.as_str())).map(|s| s.to_string()).collect();
            }
        }
    }
    text.map(|t| t.lines().skip(1).filter_map(|l| l.split_whitespace().next()).map(|s| s.to_string()).collect()).unwrap_or_default()
}

/// Scans `zonecfg export`'s `add device; set match=...; end` blocks for PCI
/// paths assigned to this zone.
fn parse_zonecfg_device_pci_addrs(export_text: &str) -> Vec<String> {
    export_text
        .lines()
        .filter(|l| l.trim_start().starts_with("set match="))
        .filter_map(|l| l.split('=').nth(1))
        .map(|s| s.trim().trim_matches('"').to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ppt_json_array() {
        let json = r#"[{"path": "/pci@0,0/pci8086,1234@1"}, {"path": "/pci@0,0/pci8086,5678@2"}]"#;
        let set = parse_ppt_enabled(Some(json), None);
        assert!(set.contains("/pci@0,0/pci8086,1234@1"));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn falls_back_to_text_when_json_missing() {
        let text = "PATH\n/pci@0,0/pci8086,1234@1\n";
        let set = parse_ppt_enabled(None, Some(text));
        assert!(set.contains("/pci@0,0/pci8086,1234@1"));
    }

    #[test]
    fn parses_zonecfg_device_match_lines() {
        let export = "add device\nset match=\"/pci@0,0/pci8086,1234@1\"\nend\n";
        let addrs = parse_zonecfg_device_pci_addrs(export);
        assert_eq!(addrs, vec!["/pci@0,0/pci8086,1234@1".to_string()]);
    }
}

//! Persistence for PCI device enumeration (append-only, one row per scan —
//! `assigned_to_zones`/`ppt_enabled` drift is tracked across scans rather
//! than collapsed into a single current-state row).

use sqlx::{Row, SqlitePool};

use crate::error::PersistError;
use crate::model::{DeviceCategory, PciDevice};

pub async fn insert(pool: &SqlitePool, device: &PciDevice) -> Result<(), PersistError> {
    sqlx::query(
        "INSERT INTO pci_device (host, pci_address, scan_timestamp, vendor_id, vendor_name, device_id, device_name,
            driver_name, driver_instance, driver_attached, device_category, ppt_enabled, ppt_capable,
            assigned_to_zones, linked_network_interface, linked_disk)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&device.host)
    .bind(&device.pci_address)
    .bind(device.scan_timestamp.to_rfc3339())
    .bind(&device.vendor_id)
    .bind(&device.vendor_name)
    .bind(&device.device_id)
    .bind(&device.device_name)
    .bind(&device.driver_name)
    .bind(device.driver_instance)
    .bind(device.driver_attached)
    .bind(category_str(device.device_category))
    .bind(device.ppt_enabled)
    .bind(device.ppt_capable)
    .bind(serde_json::to_string(&device.assigned_to_zones).unwrap_or_else(|_| "[]".to_string()))
    .bind(&device.linked_network_interface)
    .bind(&device.linked_disk)
    .execute(pool)
    .await?;
    Ok(())
}

/// Latest row per `pci_address` for `host`.
pub async fn list_latest(pool: &SqlitePool, host: &str) -> Result<Vec<PciDevice>, PersistError> {
    let rows = sqlx::query(
        "SELECT * FROM (
            SELECT *, ROW_NUMBER() OVER (PARTITION BY pci_address ORDER BY scan_timestamp DESC) AS rn
            FROM pci_device WHERE host = ?
        ) WHERE rn = 1 ORDER BY pci_address",
    )
    .bind(host)
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(row_to_device).collect())
}

fn category_str(c: DeviceCategory) -> &'static str {
    match c {
        DeviceCategory::Network => "network",
        DeviceCategory::Storage => "storage",
        DeviceCategory::Display => "display",
        DeviceCategory::Usb => "usb",
        DeviceCategory::Audio => "audio",
        DeviceCategory::Other => "other",
    }
}

fn category_parse(s: &str) -> DeviceCategory {
    match s {
        "network" => DeviceCategory::Network,
        "storage" => DeviceCategory::Storage,
        "display" => DeviceCategory::Display,
        "usb" => DeviceCategory::Usb,
        "audio" => DeviceCategory::Audio,
        _ => DeviceCategory::Other,
    }
}

fn row_to_device(row: &sqlx::sqlite::SqliteRow) -> PciDevice {
    PciDevice {
        host: row.get("host"),
        pci_address: row.get("pci_address"),
        scan_timestamp: chrono::DateTime::parse_from_rfc3339(&row.get::<String, _>("scan_timestamp")).unwrap().with_timezone(&chrono::Utc),
        vendor_id: row.get("vendor_id"),
        vendor_name: row.get("vendor_name"),
        device_id: row.get("device_id"),
        device_name: row.get("device_name"),
        driver_name: row.get("driver_name"),
        driver_instance: row.get("driver_instance"),
        driver_attached: row.get("driver_attached"),
        device_category: category_parse(&row.get::<String, _>("device_category")),
        ppt_enabled: row.get("ppt_enabled"),
        ppt_capable: row.get("ppt_capable"),
        assigned_to_zones: serde_json::from_str(&row.get::<String, _>("assigned_to_zones")).unwrap_or_default(),
        linked_network_interface: row.get("linked_network_interface"),
        linked_disk: row.get("linked_disk"),
    }
}

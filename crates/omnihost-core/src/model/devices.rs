use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "api", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum DeviceCategory {
    Network,
    Storage,
    Display,
    Usb,
    Audio,
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "api", derive(utoipa::ToSchema))]
pub struct PciDevice {
    pub host: String,
    pub pci_address: String,
    pub scan_timestamp: chrono::DateTime<chrono::Utc>,
    pub vendor_id: String,
    pub vendor_name: Option<String>,
    pub device_id: String,
    pub device_name: Option<String>,
    pub driver_name: Option<String>,
    pub driver_instance: Option<i64>,
    pub driver_attached: bool,
    pub device_category: DeviceCategory,
    pub ppt_enabled: bool,
    pub ppt_capable: bool,
    pub assigned_to_zones: Vec<String>,
    pub linked_network_interface: Option<String>,
    pub linked_disk: Option<String>,
}

impl PciDevice {
    /// Derives `ppt_capable` per §4.3: Intel devices only for network,
    /// AMD for network/storage/display, everything else capable by default;
    /// any device already assigned to a zone is never PPT-capable.
    pub fn derive_ppt_capable(vendor_id: &str, category: DeviceCategory, assigned_to_zones: &[String]) -> bool {
        if !assigned_to_zones.is_empty() {
            return false;
        }
        match vendor_id.to_ascii_lowercase().as_str() {
            "0x8086" => matches!(category, DeviceCategory::Network),
            "0x1022" => matches!(
                category,
                DeviceCategory::Network | DeviceCategory::Storage | DeviceCategory::Display
            ),
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intel_ppt_capable_only_for_network() {
        assert!(PciDevice::derive_ppt_capable("0x8086", DeviceCategory::Network, &[]));
        assert!(!PciDevice::derive_ppt_capable("0x8086", DeviceCategory::Storage, &[]));
    }

    #[test]
    fn amd_ppt_capable_for_network_storage_display() {
        assert!(PciDevice::derive_ppt_capable("0x1022", DeviceCategory::Storage, &[]));
        assert!(!PciDevice::derive_ppt_capable("0x1022", DeviceCategory::Usb, &[]));
    }

    #[test]
    fn assigned_device_is_never_ppt_capable() {
        assert!(!PciDevice::derive_ppt_capable(
            "0x15b3",
            DeviceCategory::Network,
            &["zone1".to_string()]
        ));
    }

    #[test]
    fn unknown_vendor_defaults_capable() {
        assert!(PciDevice::derive_ppt_capable("0x15b3", DeviceCategory::Audio, &[]));
    }
}

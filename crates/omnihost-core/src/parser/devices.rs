//! Parsers for PCI device enumeration (`pcitool -p` / `prtconf -pv`).

use crate::error::ParseError;
use crate::model::{DeviceCategory, PciDevice};

/// Resolves a numeric PCI class code to a [`DeviceCategory`].
/// See the PCI SIG class-code table: 0x02 network, 0x01 storage,
/// 0x03 display, 0x0c usb-family serial bus, 0x04 multimedia/audio.
pub fn category_from_class_code(class_code: &str) -> DeviceCategory {
    let normalized = class_code.trim_start_matches("0x");
    let prefix = &normalized[..normalized.len().min(2)];
    match prefix {
        "02" => DeviceCategory::Network,
        "01" => DeviceCategory::Storage,
        "03" => DeviceCategory::Display,
        "0c" => DeviceCategory::Usb,
        "04" => DeviceCategory::Audio,
        _ => DeviceCategory::Other,
    }
}

/// One logical record from `pcitool /pci -p` parsed into named fields before
/// conversion to a full [`PciDevice`] (driver attachment and zone assignment
/// are folded in by the devices collector, which cross-references `prtconf`
/// and `zonecfg` output).
#[derive(Debug, Clone, PartialEq)]
pub struct RawPciLine {
    pub pci_address: String,
    pub vendor_id: String,
    pub device_id: String,
    pub class_code: String,
    pub driver_name: Option<String>,
    pub driver_instance: Option<i64>,
}

/// Parses one line of `pcitool /pci -p -o path,vendor,device,class,driver,instance`.
pub fn parse_pcitool_line(line: &str) -> Result<RawPciLine, ParseError> {
    let fields: Vec<&str> = line.split(':').collect();
    let pci_address = fields.first().ok_or_else(|| ParseError::new("pcitool: missing path"))?;
    let vendor_id = fields.get(1).ok_or_else(|| ParseError::new("pcitool: missing vendor"))?;
    let device_id = fields.get(2).ok_or_else(|| ParseError::new("pcitool: missing device"))?;
    let class_code = fields.get(3).unwrap_or(&"0x00").to_string();
    let driver_name = fields.get(4).map(|s| s.to_string()).filter(|s| !s.is_empty());
    let driver_instance = fields.get(5).and_then(|s| s.parse().ok());
    Ok(RawPciLine {
        pci_address: pci_address.to_string(),
        vendor_id: vendor_id.to_string(),
        device_id: device_id.to_string(),
        class_code,
        driver_name,
        driver_instance,
    })
}

/// Assembles a full [`PciDevice`] from a raw enumeration line plus the
/// cross-referenced zone assignment / driver-attach facts the devices
/// collector gathers separately (`zonecfg export`'s `device` resources and
/// whether the driver instance currently has a live node under `/devices`).
pub fn build_pci_device(
    host: &str,
    raw: RawPciLine,
    vendor_name: Option<String>,
    device_name: Option<String>,
    driver_attached: bool,
    ppt_enabled: bool,
    assigned_to_zones: Vec<String>,
    linked_network_interface: Option<String>,
    linked_disk: Option<String>,
) -> PciDevice {
    let category = category_from_class_code(&raw.class_code);
    let ppt_capable = PciDevice::derive_ppt_capable(&raw.vendor_id, category, &assigned_to_zones);
    PciDevice {
        host: host.to_string(),
        pci_address: raw.pci_address,
        scan_timestamp: chrono::Utc::now(),
        vendor_id: raw.vendor_id,
        vendor_name,
        device_id: raw.device_id,
        device_name,
        driver_name: raw.driver_name,
        driver_instance: raw.driver_instance,
        driver_attached,
        device_category: category,
        ppt_enabled,
        ppt_capable,
        assigned_to_zones,
        linked_network_interface,
        linked_disk,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_code_maps_network() {
        assert_eq!(category_from_class_code("0x0200"), DeviceCategory::Network);
        assert_eq!(category_from_class_code("0x0108"), DeviceCategory::Storage);
        assert_eq!(category_from_class_code("0x0c03"), DeviceCategory::Usb);
    }

    #[test]
    fn parses_pcitool_line() {
        let raw = parse_pcitool_line("pci@0,0/pci8086,1234@1:0x8086:0x1234:0x0200:igb:0").unwrap();
        assert_eq!(raw.vendor_id, "0x8086");
        assert_eq!(raw.driver_name.as_deref(), Some("igb"));
        assert_eq!(raw.driver_instance, Some(0));
    }

    #[test]
    fn assembled_device_inherits_ppt_capability_rule() {
        let raw = parse_pcitool_line("pci@0,0:0x8086:0x1533:0x0200:igb:1").unwrap();
        let dev = build_pci_device("h", raw, None, None, true, false, vec![], None, None);
        assert!(dev.ppt_capable);
        assert_eq!(dev.device_category, DeviceCategory::Network);
    }
}

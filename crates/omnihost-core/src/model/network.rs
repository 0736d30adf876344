use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "api", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum LinkClass {
    Phys,
    Vnic,
    Aggr,
    Etherstub,
    Vlan,
    Other,
}

impl LinkClass {
    pub fn parse(s: &str) -> Self {
        match s {
            "phys" => LinkClass::Phys,
            "vnic" => LinkClass::Vnic,
            "aggr" => LinkClass::Aggr,
            "etherstub" => LinkClass::Etherstub,
            "vlan" => LinkClass::Vlan,
            _ => LinkClass::Other,
        }
    }
}

/// Current-state (per scan, replaced-in-full for affected links) record for
/// one datalink.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "api", derive(utoipa::ToSchema))]
pub struct NetworkInterface {
    pub host: String,
    pub link: String,
    pub class: LinkClass,
    pub state: Option<String>,
    pub mtu: Option<i64>,
    pub speed: Option<i64>,
    pub duplex: Option<String>,
    pub over: Option<String>,
    pub macaddress: Option<String>,
    pub macaddrtype: Option<String>,
    pub vid: Option<i64>,
    pub zone: Option<String>,
    /// Aggregate-only: policy / LACP mode / per-port detail, as JSON.
    pub aggr_detail: Option<serde_json::Value>,
}

/// Per-sample network counters and derived rates. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "api", derive(utoipa::ToSchema))]
pub struct NetworkUsage {
    pub host: String,
    pub link: String,
    pub scan_timestamp: chrono::DateTime<chrono::Utc>,
    pub ipackets: u64,
    pub rbytes: u64,
    pub ierrors: u64,
    pub opackets: u64,
    pub obytes: u64,
    pub oerrors: u64,
    pub ipackets_delta: Option<u64>,
    pub rbytes_delta: Option<u64>,
    pub ierrors_delta: Option<u64>,
    pub opackets_delta: Option<u64>,
    pub obytes_delta: Option<u64>,
    pub oerrors_delta: Option<u64>,
    pub time_delta_seconds: Option<f64>,
    pub rx_bps: Option<f64>,
    pub tx_bps: Option<f64>,
    pub rx_mbps: Option<f64>,
    pub tx_mbps: Option<f64>,
    pub rx_utilization_pct: Option<f64>,
    pub tx_utilization_pct: Option<f64>,
    pub interface_speed_mbps: Option<i64>,
    pub interface_class: Option<LinkClass>,
    /// Set when this row was derived from a truncated `show-usage` name that
    /// matched more than one known interface (§4.2 truncation heuristic).
    pub name_confidence: Option<NameConfidence>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "api", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum NameConfidence {
    High,
    Medium,
    Low,
}

/// Current-state IP address row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "api", derive(utoipa::ToSchema))]
pub struct IpAddress {
    pub host: String,
    pub interface: String,
    pub address: String,
    pub prefix: Option<i64>,
    pub ip_version: i64,
    pub state: Option<String>,
    pub scan_timestamp: chrono::DateTime<chrono::Utc>,
}

/// Current-state routing table row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "api", derive(utoipa::ToSchema))]
pub struct Route {
    pub host: String,
    pub destination: String,
    pub gateway: Option<String>,
    pub flags: Option<String>,
    pub reference_count: Option<i64>,
    pub use_count: Option<i64>,
    pub interface: Option<String>,
    pub is_default: bool,
    pub ip_version: i64,
    pub scan_timestamp: chrono::DateTime<chrono::Utc>,
}

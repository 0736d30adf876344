use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "api", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum ScanType {
    Iostat,
    Status,
    List,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "api", derive(utoipa::ToSchema))]
pub struct ZfsPool {
    pub host: String,
    pub pool: String,
    pub scan_timestamp: chrono::DateTime<chrono::Utc>,
    pub scan_type: ScanType,
    pub alloc: Option<String>,
    pub alloc_bytes: Option<f64>,
    pub free: Option<String>,
    pub free_bytes: Option<f64>,
    pub capacity_pct: Option<f64>,
    pub read_ops: Option<f64>,
    pub write_ops: Option<f64>,
    pub read_bandwidth_bytes: Option<f64>,
    pub write_bandwidth_bytes: Option<f64>,
    pub health: Option<String>,
    pub status: Option<String>,
    pub errors: Option<String>,
    pub pool_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "api", derive(utoipa::ToSchema))]
pub struct ZfsDataset {
    pub host: String,
    pub name: String,
    pub pool: String,
    pub scan_timestamp: chrono::DateTime<chrono::Utc>,
    pub dataset_type: Option<String>,
    pub used: Option<String>,
    pub used_bytes: Option<f64>,
    pub available: Option<String>,
    pub available_bytes: Option<f64>,
    pub referenced: Option<String>,
    pub referenced_bytes: Option<f64>,
    pub compressratio: Option<f64>,
    pub mountpoint: Option<String>,
    pub properties: serde_json::Value,
    pub dataset_exists: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "api", derive(utoipa::ToSchema))]
pub struct Disk {
    pub host: String,
    pub device_name: String,
    pub disk_index: Option<i64>,
    pub serial_number: Option<String>,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub firmware: Option<String>,
    pub capacity: Option<String>,
    pub capacity_bytes: Option<f64>,
    pub disk_type: Option<String>,
    pub interface_type: Option<String>,
    pub pool_assignment: Option<String>,
    pub is_available: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "api", derive(utoipa::ToSchema))]
pub struct DiskIoStats {
    pub host: String,
    pub device_name: String,
    pub scan_timestamp: chrono::DateTime<chrono::Utc>,
    pub read_ops: Option<f64>,
    pub write_ops: Option<f64>,
    pub read_bandwidth_bytes: Option<f64>,
    pub write_bandwidth_bytes: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "api", derive(utoipa::ToSchema))]
pub struct PoolIoStats {
    pub host: String,
    pub pool: String,
    pub scan_timestamp: chrono::DateTime<chrono::Utc>,
    pub read_ops: Option<f64>,
    pub write_ops: Option<f64>,
    pub read_bandwidth_bytes: Option<f64>,
    pub write_bandwidth_bytes: Option<f64>,
    pub total_wait_ms: Option<f64>,
    pub disk_wait_ms: Option<f64>,
    pub syncq_wait_ms: Option<f64>,
    pub asyncq_wait_ms: Option<f64>,
    pub scrub_wait_ms: Option<f64>,
    pub trim_wait_ms: Option<f64>,
    pub pool_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "api", derive(utoipa::ToSchema))]
pub struct ArcStats {
    pub host: String,
    pub scan_timestamp: chrono::DateTime<chrono::Utc>,
    pub size_bytes: Option<f64>,
    pub target_size_bytes: Option<f64>,
    pub min_size_bytes: Option<f64>,
    pub max_size_bytes: Option<f64>,
    pub mru_size_bytes: Option<f64>,
    pub mfu_size_bytes: Option<f64>,
    pub data_size_bytes: Option<f64>,
    pub meta_size_bytes: Option<f64>,
    pub hits: Option<u64>,
    pub misses: Option<u64>,
    pub demand_data_hits: Option<u64>,
    pub demand_data_misses: Option<u64>,
    pub prefetch_hits: Option<u64>,
    pub prefetch_misses: Option<u64>,
    pub hit_ratio_pct: Option<f64>,
    pub l2_hits: Option<u64>,
    pub l2_misses: Option<u64>,
    pub l2_size_bytes: Option<f64>,
}

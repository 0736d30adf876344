use serde::{Deserialize, Serialize};

/// Singleton per-host record: identity, last-scan timestamps, per-collector
/// error counters, and feature flags. Upserted at init and after every
/// collector pass.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "api", derive(utoipa::ToSchema))]
pub struct HostInfo {
    pub host: String,
    pub hostname: String,
    pub platform: String,
    pub release: String,
    pub arch: String,
    pub uptime_seconds: Option<i64>,
    pub feature_flags: serde_json::Value,
    pub last_network_config_scan: Option<chrono::DateTime<chrono::Utc>>,
    pub last_network_usage_scan: Option<chrono::DateTime<chrono::Utc>>,
    pub last_storage_scan: Option<chrono::DateTime<chrono::Utc>>,
    pub last_storage_frequent_scan: Option<chrono::DateTime<chrono::Utc>>,
    pub last_devices_scan: Option<chrono::DateTime<chrono::Utc>>,
    pub last_system_metrics_scan: Option<chrono::DateTime<chrono::Utc>>,
    pub error_counts: serde_json::Value,
    pub last_error_message: Option<String>,
}

impl HostInfo {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            hostname: String::new(),
            platform: String::new(),
            release: String::new(),
            arch: String::new(),
            uptime_seconds: None,
            feature_flags: serde_json::json!({}),
            last_network_config_scan: None,
            last_network_usage_scan: None,
            last_storage_scan: None,
            last_storage_frequent_scan: None,
            last_devices_scan: None,
            last_system_metrics_scan: None,
            error_counts: serde_json::json!({}),
            last_error_message: None,
        }
    }
}

/// Aggregate health classification surfaced on `/monitoring/host/health`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "api", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum HostHealth {
    Healthy,
    Degraded,
    Faulted,
    Critical,
    Stopped,
    Error,
}

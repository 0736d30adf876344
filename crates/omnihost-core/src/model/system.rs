use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "api", derive(utoipa::ToSchema))]
pub struct CpuStats {
    pub host: String,
    pub scan_timestamp: chrono::DateTime<chrono::Utc>,
    pub utilization_pct: Option<f64>,
    pub load_avg_1: Option<f64>,
    pub load_avg_5: Option<f64>,
    pub load_avg_15: Option<f64>,
    pub context_switches_per_sec: Option<f64>,
    pub interrupts_per_sec: Option<f64>,
    pub syscalls_per_sec: Option<f64>,
    pub processes_running: Option<i64>,
    pub processes_blocked: Option<i64>,
    pub cpu_count: Option<i64>,
    pub per_core: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "api", derive(utoipa::ToSchema))]
pub struct MemoryStats {
    pub host: String,
    pub scan_timestamp: chrono::DateTime<chrono::Utc>,
    pub total_bytes: Option<f64>,
    pub used_bytes: Option<f64>,
    pub free_bytes: Option<f64>,
    pub utilization_pct: Option<f64>,
    pub swap_total_bytes: Option<f64>,
    pub swap_used_bytes: Option<f64>,
    pub page_in_per_sec: Option<f64>,
    pub page_out_per_sec: Option<f64>,
    pub page_fault_per_sec: Option<f64>,
}

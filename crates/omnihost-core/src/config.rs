//! Daemon configuration: a YAML file loaded from `--config`/`OMNIHOSTD_CONFIG`
//! (§6), deserialized with serde, then converted into the concrete value
//! types the Scheduler, Cleanup Service, and Task Queue already take.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::cleanup::RetentionConfig;
use crate::scheduler::IntervalConfig;
use crate::taskqueue::TaskQueueConfig;

/// Failure loading or parsing the configuration file.
#[derive(Debug)]
pub enum ConfigError {
    Read(std::io::Error),
    Parse(serde_yaml::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Read(e) => write!(f, "failed to read config file: {e}"),
            ConfigError::Parse(e) => write!(f, "failed to parse config file: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub ssl: SslConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub api_keys: ApiKeysConfig,
    pub host_monitoring: HostMonitoringConfig,
    #[serde(default)]
    pub stats: StatsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub listen: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SslConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub cert_path: Option<String>,
    #[serde(default)]
    pub key_path: Option<String>,
}

impl Default for SslConfig {
    fn default() -> Self {
        Self { enabled: false, cert_path: None, key_path: None }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    #[serde(default = "default_true")]
    pub permissive: bool,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self { permissive: true }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiKeysConfig {
    #[serde(default = "default_true")]
    pub bootstrap_enabled: bool,
}

impl Default for ApiKeysConfig {
    fn default() -> Self {
        Self { bootstrap_enabled: true }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HostMonitoringConfig {
    pub intervals: IntervalsSeconds,
    pub retention: RetentionDays,
    pub error_handling: ErrorHandlingConfig,
    pub performance: PerformanceConfig,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct IntervalsSeconds {
    pub network_config: u64,
    pub network_usage: u64,
    pub storage: u64,
    pub storage_frequent: u64,
    pub devices: u64,
    pub system_metrics: u64,
}

impl IntervalsSeconds {
    pub fn to_interval_config(self) -> IntervalConfig {
        IntervalConfig {
            network_config: Duration::from_secs(self.network_config),
            network_usage: Duration::from_secs(self.network_usage),
            storage: Duration::from_secs(self.storage),
            storage_frequent: Duration::from_secs(self.storage_frequent),
            devices: Duration::from_secs(self.devices),
            system_metrics: Duration::from_secs(self.system_metrics),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RetentionDays {
    pub network_usage: i64,
    pub network_config: i64,
    pub storage: i64,
    pub storage_frequent: i64,
    pub devices: i64,
    pub system_metrics: i64,
    #[serde(default = "default_task_retention_days")]
    pub task: i64,
}

fn default_task_retention_days() -> i64 {
    7
}

impl RetentionDays {
    pub fn to_retention_config(self) -> RetentionConfig {
        RetentionConfig {
            network_usage: chrono::Duration::days(self.network_usage),
            network_config: chrono::Duration::days(self.network_config),
            storage: chrono::Duration::days(self.storage),
            storage_frequent: chrono::Duration::days(self.storage_frequent),
            devices: chrono::Duration::days(self.devices),
            system_metrics: chrono::Duration::days(self.system_metrics),
            task: chrono::Duration::days(self.task),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ErrorHandlingConfig {
    pub max_consecutive_errors: u32,
    pub reset_error_count_after: u64,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PerformanceConfig {
    pub batch_size: usize,
    pub command_timeout: u64,
}

impl PerformanceConfig {
    pub fn to_task_queue_config(self) -> TaskQueueConfig {
        TaskQueueConfig {
            poll_interval: Duration::from_secs(1),
            command_timeout: Duration::from_secs(self.command_timeout),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct StatsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

fn default_true() -> bool {
    true
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(ConfigError::Read)?;
        serde_yaml::from_str(&text).map_err(ConfigError::Parse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
server: { listen: "0.0.0.0:8123" }
ssl: { enabled: false, cert_path: null, key_path: null }
cors: { permissive: true }
database: { path: "/var/lib/omnihostd/omnihostd.db" }
api_keys: { bootstrap_enabled: true }
host_monitoring:
  intervals: { network_config: 300, network_usage: 10, storage: 300, storage_frequent: 10, devices: 300, system_metrics: 30 }
  retention: { network_usage: 7, network_config: 30, storage: 14, storage_frequent: 3, devices: 30, system_metrics: 14 }
  error_handling: { max_consecutive_errors: 5, reset_error_count_after: 300 }
  performance: { batch_size: 200, command_timeout: 30 }
stats: { enabled: true }
"#;

    #[test]
    fn parses_the_documented_sample() {
        let config: Config = serde_yaml::from_str(SAMPLE).unwrap();
        assert_eq!(config.server.listen, "0.0.0.0:8123");
        assert_eq!(config.host_monitoring.intervals.network_usage, 10);
        assert_eq!(config.host_monitoring.retention.task, 7);
    }

    #[test]
    fn intervals_convert_to_durations() {
        let config: Config = serde_yaml::from_str(SAMPLE).unwrap();
        let intervals = config.host_monitoring.intervals.to_interval_config();
        assert_eq!(intervals.storage_frequent, Duration::from_secs(10));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = Config::load("/nonexistent/omnihostd.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Read(_)));
    }
}

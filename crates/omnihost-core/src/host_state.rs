//! Host State: the in-process singleton tracking last-scan timestamps,
//! per-collector error counters, and feature flags. Collectors report
//! outcomes here; the Scheduler reads the resulting disable signal back.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::CollectOutcome;
use crate::model::HostHealth;

#[derive(Debug, Clone)]
struct ErrorCounter {
    consecutive: u32,
    last_failure: chrono::DateTime<chrono::Utc>,
}

/// Per-collector health derived from its error counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectorHealth {
    Healthy,
    Degraded,
    Disabled,
}

struct Inner {
    counters: HashMap<String, ErrorCounter>,
    feature_flags: serde_json::Value,
    last_error_message: Option<String>,
}

/// Shared, cloneable handle (matches the teacher's `Arc<Mutex<...>>`
/// singleton-state idiom for cross-task shared mutable state).
#[derive(Clone)]
pub struct HostState {
    inner: std::sync::Arc<Mutex<Inner>>,
    reset_error_count_after: chrono::Duration,
    max_consecutive_errors: u32,
}

impl HostState {
    pub fn new(reset_error_count_after_secs: u64, max_consecutive_errors: u32) -> Self {
        Self {
            inner: std::sync::Arc::new(Mutex::new(Inner {
                counters: HashMap::new(),
                feature_flags: serde_json::json!({}),
                last_error_message: None,
            })),
            reset_error_count_after: chrono::Duration::seconds(reset_error_count_after_secs as i64),
            max_consecutive_errors,
        }
    }

    /// Records a collector outcome, returning whether the Scheduler should
    /// treat this collector as disabled from here on (until the counter decays).
    pub fn record(&self, collector: &str, outcome: CollectOutcome, error_message: Option<String>) -> CollectorHealth {
        let mut inner = self.inner.lock().unwrap();
        let now = chrono::Utc::now();

        match outcome {
            CollectOutcome::Success => {
                inner.counters.remove(collector);
                CollectorHealth::Healthy
            }
            CollectOutcome::Failed => {
                if let Some(msg) = error_message {
                    inner.last_error_message = Some(msg);
                }
                let entry = inner.counters.entry(collector.to_string()).or_insert(ErrorCounter {
                    consecutive: 0,
                    last_failure: now,
                });
                let quiet_long_enough = now - entry.last_failure > self.reset_error_count_after;
                entry.consecutive = if quiet_long_enough { 1 } else { entry.consecutive + 1 };
                entry.last_failure = now;

                if entry.consecutive >= self.max_consecutive_errors {
                    CollectorHealth::Disabled
                } else {
                    CollectorHealth::Degraded
                }
            }
            CollectOutcome::Busy | CollectOutcome::Disabled => {
                match inner.counters.get(collector) {
                    Some(c) if c.consecutive >= self.max_consecutive_errors => CollectorHealth::Disabled,
                    Some(_) => CollectorHealth::Degraded,
                    None => CollectorHealth::Healthy,
                }
            }
        }
    }

    /// Decays a collector's counter if enough quiet time has passed since
    /// its last failure, without requiring a new collection attempt.
    pub fn decay(&self, collector: &str) -> CollectorHealth {
        let mut inner = self.inner.lock().unwrap();
        let now = chrono::Utc::now();
        if let Some(entry) = inner.counters.get(collector) {
            if now - entry.last_failure > self.reset_error_count_after {
                inner.counters.remove(collector);
                return CollectorHealth::Healthy;
            }
            if entry.consecutive >= self.max_consecutive_errors {
                return CollectorHealth::Disabled;
            }
            return CollectorHealth::Degraded;
        }
        CollectorHealth::Healthy
    }

    pub fn error_counts_json(&self) -> serde_json::Value {
        let inner = self.inner.lock().unwrap();
        serde_json::Value::Object(
            inner
                .counters
                .iter()
                .map(|(k, v)| (k.clone(), serde_json::json!(v.consecutive)))
                .collect(),
        )
    }

    pub fn last_error_message(&self) -> Option<String> {
        self.inner.lock().unwrap().last_error_message.clone()
    }

    pub fn set_feature_flag(&self, name: &str, enabled: bool) {
        let mut inner = self.inner.lock().unwrap();
        if let serde_json::Value::Object(map) = &mut inner.feature_flags {
            map.insert(name.to_string(), serde_json::json!(enabled));
        }
    }

    pub fn feature_flags(&self) -> serde_json::Value {
        self.inner.lock().unwrap().feature_flags.clone()
    }

    /// Aggregate health across every tracked collector, for `/monitoring/host/health`.
    pub fn aggregate_health(&self) -> HostHealth {
        let inner = self.inner.lock().unwrap();
        if inner.counters.is_empty() {
            return HostHealth::Healthy;
        }
        let worst_disabled = inner.counters.values().any(|c| c.consecutive >= self.max_consecutive_errors);
        if worst_disabled {
            HostHealth::Critical
        } else {
            HostHealth::Degraded
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_clears_counter() {
        let state = HostState::new(60, 3);
        state.record("network-usage", CollectOutcome::Failed, Some("boom".into()));
        let health = state.record("network-usage", CollectOutcome::Success, None);
        assert_eq!(health, CollectorHealth::Healthy);
    }

    #[test]
    fn reaches_disabled_after_max_consecutive_errors() {
        let state = HostState::new(60, 3);
        state.record("storage", CollectOutcome::Failed, Some("e1".into()));
        state.record("storage", CollectOutcome::Failed, Some("e2".into()));
        let health = state.record("storage", CollectOutcome::Failed, Some("e3".into()));
        assert_eq!(health, CollectorHealth::Disabled);
    }

    #[test]
    fn aggregate_health_reflects_disabled_collector() {
        let state = HostState::new(60, 1);
        state.record("devices", CollectOutcome::Failed, Some("e".into()));
        assert_eq!(state.aggregate_health(), HostHealth::Critical);
    }

    #[test]
    fn feature_flags_round_trip() {
        let state = HostState::new(60, 3);
        state.set_feature_flag("network_accounting", true);
        assert_eq!(state.feature_flags()["network_accounting"], serde_json::json!(true));
    }
}

//! Scheduler: one periodic timer per collector, independent cadences,
//! start/stop/restart, and on-demand `trigger_collection`. Modeled on the
//! teacher's `tick_loop` (§4.4).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::collector::{
    Collector, CollectorContext, DevicesCollector, NetworkConfigCollector, NetworkUsageCollector, StorageCollector, StorageFrequentCollector,
    SystemMetricsCollector,
};
use crate::error::CollectOutcome;
use crate::host_state::HostState;
use crate::model::HostInfo;
use crate::storage::host_repo;

/// Per-collector cadence, read once at startup from configuration.
#[derive(Debug, Clone, Copy)]
pub struct IntervalConfig {
    pub network_config: Duration,
    pub network_usage: Duration,
    pub storage: Duration,
    pub storage_frequent: Duration,
    pub devices: Duration,
    pub system_metrics: Duration,
}

/// Selects which collector(s) `trigger_collection` runs immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectorKind {
    NetworkConfig,
    NetworkUsage,
    Storage,
    StorageFrequent,
    Devices,
    SystemMetrics,
    All,
}

pub struct Scheduler {
    ctx: CollectorContext,
    network_config: Arc<NetworkConfigCollector>,
    network_usage: Arc<NetworkUsageCollector>,
    storage: Arc<StorageCollector>,
    storage_frequent: Arc<StorageFrequentCollector>,
    devices: Arc<DevicesCollector>,
    system_metrics: Arc<SystemMetricsCollector>,
    handles: AsyncMutex<Vec<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new(ctx: CollectorContext, intervals: IntervalConfig) -> Self {
        Self {
            ctx,
            network_config: Arc::new(NetworkConfigCollector::new(intervals.network_config)),
            network_usage: Arc::new(NetworkUsageCollector::new(intervals.network_usage, Duration::from_secs(2))),
            storage: Arc::new(StorageCollector::new(intervals.storage)),
            storage_frequent: Arc::new(StorageFrequentCollector::new(intervals.storage_frequent)),
            devices: Arc::new(DevicesCollector::new(intervals.devices)),
            system_metrics: Arc::new(SystemMetricsCollector::new(intervals.system_metrics)),
            handles: AsyncMutex::new(Vec::new()),
        }
    }

    /// Ensures the schema exists, upserts the HostInfo row, optionally
    /// enables the network-accounting feature flag, and kicks an initial
    /// pass of every collector without waiting for it to finish. The pool
    /// handed to `CollectorContext` is already migrated by `storage::open`.
    pub async fn init(&self, uname: HostInfo, enable_network_accounting: bool) -> Result<(), crate::error::PersistError> {
        crate::storage::schema::migrate(&self.ctx.pool).await?;
        host_repo::upsert(&self.ctx.pool, &uname).await?;

        if enable_network_accounting {
            let _ = crate::runner::run_safe(&crate::runner::CommandSpec::new("dladm", &["show-usage", "-p"]));
            self.ctx.host_state.set_feature_flag("network_accounting", true);
        }

        self.spawn_initial_pass();
        Ok(())
    }

    fn spawn_initial_pass(&self) {
        for kind in [
            CollectorKind::NetworkConfig,
            CollectorKind::NetworkUsage,
            CollectorKind::Storage,
            CollectorKind::StorageFrequent,
            CollectorKind::Devices,
            CollectorKind::SystemMetrics,
        ] {
            let network_config = self.network_config.clone();
            let network_usage = self.network_usage.clone();
            let storage = self.storage.clone();
            let storage_frequent = self.storage_frequent.clone();
            let devices = self.devices.clone();
            let system_metrics = self.system_metrics.clone();
            let ctx = self.ctx.clone();
            tokio::spawn(async move {
                run_one(kind, &ctx, &network_config, &network_usage, &storage, &storage_frequent, &devices, &system_metrics).await;
            });
        }
    }

    /// Installs the per-collector timers. Idempotent with `stop`: calling
    /// `start` while already running spawns a second set of loops, so
    /// callers should always pair it with a prior `stop`.
    pub async fn start(&self) {
        let mut handles = self.handles.lock().await;
        handles.push(spawn_tick_loop(CollectorKind::NetworkConfig, self.ctx.clone(), self.network_config.clone()));
        handles.push(spawn_tick_loop(CollectorKind::NetworkUsage, self.ctx.clone(), self.network_usage.clone()));
        handles.push(spawn_tick_loop(CollectorKind::Storage, self.ctx.clone(), self.storage.clone()));
        handles.push(spawn_tick_loop(CollectorKind::StorageFrequent, self.ctx.clone(), self.storage_frequent.clone()));
        handles.push(spawn_tick_loop(CollectorKind::Devices, self.ctx.clone(), self.devices.clone()));
        handles.push(spawn_tick_loop(CollectorKind::SystemMetrics, self.ctx.clone(), self.system_metrics.clone()));
        info!("scheduler started, 6 collector timers installed");
    }

    /// Cancels every installed timer. In-flight `collect()` calls are left
    /// to finish; only the tick loop tasks themselves are aborted.
    pub async fn stop(&self) {
        let mut handles = self.handles.lock().await;
        for h in handles.drain(..) {
            h.abort();
        }
        info!("scheduler stopped, all collector timers cancelled");
    }

    pub async fn restart(&self) {
        self.stop().await;
        tokio::time::sleep(Duration::from_secs(1)).await;
        self.start().await;
    }

    /// Runs one or all collectors immediately, outside the timer loop, and
    /// returns per-collector success flags.
    pub async fn trigger_collection(&self, kind: CollectorKind) -> HashMap<String, bool> {
        let kinds = if kind == CollectorKind::All {
            vec![
                CollectorKind::NetworkConfig,
                CollectorKind::NetworkUsage,
                CollectorKind::Storage,
                CollectorKind::StorageFrequent,
                CollectorKind::Devices,
                CollectorKind::SystemMetrics,
            ]
        } else {
            vec![kind]
        };

        let mut results = HashMap::new();
        for k in kinds {
            let outcome = run_one(
                k,
                &self.ctx,
                &self.network_config,
                &self.network_usage,
                &self.storage,
                &self.storage_frequent,
                &self.devices,
                &self.system_metrics,
            )
            .await;
            results.insert(kind_name(k).to_string(), matches!(outcome, CollectOutcome::Success));
        }
        results
    }
}

fn kind_name(kind: CollectorKind) -> &'static str {
    match kind {
        CollectorKind::NetworkConfig => NetworkConfigCollector::NAME,
        CollectorKind::NetworkUsage => NetworkUsageCollector::NAME,
        CollectorKind::Storage => StorageCollector::NAME,
        CollectorKind::StorageFrequent => StorageFrequentCollector::NAME,
        CollectorKind::Devices => DevicesCollector::NAME,
        CollectorKind::SystemMetrics => SystemMetricsCollector::NAME,
        CollectorKind::All => "all",
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_one(
    kind: CollectorKind,
    ctx: &CollectorContext,
    network_config: &NetworkConfigCollector,
    network_usage: &NetworkUsageCollector,
    storage: &StorageCollector,
    storage_frequent: &StorageFrequentCollector,
    devices: &DevicesCollector,
    system_metrics: &SystemMetricsCollector,
) -> CollectOutcome {
    match kind {
        CollectorKind::NetworkConfig => network_config.collect(ctx).await,
        CollectorKind::NetworkUsage => network_usage.collect(ctx).await,
        CollectorKind::Storage => storage.collect(ctx).await,
        CollectorKind::StorageFrequent => storage_frequent.collect(ctx).await,
        CollectorKind::Devices => devices.collect(ctx).await,
        CollectorKind::SystemMetrics => system_metrics.collect(ctx).await,
        CollectorKind::All => unreachable!("All is expanded by the caller"),
    }
}

fn spawn_tick_loop<C>(kind: CollectorKind, ctx: CollectorContext, collector: Arc<C>) -> JoinHandle<()>
where
    C: Collector + Send + Sync + 'static,
{
    let interval = collector.interval();
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(interval);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tick.tick().await;
            let t0 = Instant::now();
            let outcome = collector.collect(&ctx).await;
            let elapsed = t0.elapsed();

            debug!(collector = C::NAME, ?outcome, duration_ms = elapsed.as_millis() as u64, "tick completed");
            if elapsed > interval / 2 {
                warn!(
                    collector = C::NAME,
                    duration_ms = elapsed.as_millis() as u64,
                    interval_ms = interval.as_millis() as u64,
                    "tick exceeded 50% of interval"
                );
            }
            let _ = kind;
        }
    })
}

/// Decays every collector's error counter; called by the Cleanup Service's
/// daily pass so a long-quiet collector's health recovers without needing a
/// fresh collection attempt.
pub fn decay_all(host_state: &HostState) {
    for name in [
        NetworkConfigCollector::NAME,
        NetworkUsageCollector::NAME,
        StorageCollector::NAME,
        StorageFrequentCollector::NAME,
        DevicesCollector::NAME,
        SystemMetricsCollector::NAME,
    ] {
        host_state.decay(name);
    }
}

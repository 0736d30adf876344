//! The six collector families, each a standalone struct implementing
//! single-flight + error-accounted collection against [`CollectorContext`].

pub mod devices;
pub mod network_config;
pub mod network_usage;
pub mod storage_collector;
pub mod storage_frequent;
pub mod system_metrics;

use std::sync::Arc;
use std::time::Duration;

use sqlx::SqlitePool;

use crate::error::CollectOutcome;
use crate::host_state::HostState;

/// Common shape every collector family implements: a name for logging and
/// `HostState` bookkeeping, its own tick interval, and the single-flight,
/// error-accounted collection pass itself.
pub trait Collector {
    const NAME: &'static str;

    fn interval(&self) -> Duration;

    async fn collect(&self, ctx: &CollectorContext) -> CollectOutcome;
}

/// Shared dependencies every collector needs: the DB pool, this host's
/// identity, shared error/feature state, and the bulk-insert batch size.
#[derive(Clone)]
pub struct CollectorContext {
    pub pool: SqlitePool,
    pub host: Arc<str>,
    pub host_state: HostState,
    pub batch_size: usize,
}

impl CollectorContext {
    pub fn new(pool: SqlitePool, host: impl Into<Arc<str>>, host_state: HostState, batch_size: usize) -> Self {
        Self {
            pool,
            host: host.into(),
            host_state,
            batch_size,
        }
    }
}

pub use devices::DevicesCollector;
pub use network_config::NetworkConfigCollector;
pub use network_usage::NetworkUsageCollector;
pub use storage_collector::StorageCollector;
pub use storage_frequent::StorageFrequentCollector;
pub use system_metrics::SystemMetricsCollector;

//! Network-usage collector: per-link counter deltas. Cadence: ~10s (§4.3).

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{debug, warn};

use crate::collector::{Collector, CollectorContext};
use crate::error::CollectOutcome;
use crate::parser::network::{self, UsageSample};
use crate::runner::CommandSpec;
use crate::storage::network_repo;

pub struct NetworkUsageCollector {
    busy: AtomicBool,
    interval: Duration,
    /// Grace window subtracted from `interval` when looking up the previous
    /// sample, per §4.3 ("older than interval − 2s").
    lookup_grace: Duration,
}

impl NetworkUsageCollector {
    pub fn new(interval: Duration, lookup_grace: Duration) -> Self {
        Self { busy: AtomicBool::new(false), interval, lookup_grace }
    }
}

impl Collector for NetworkUsageCollector {
    const NAME: &'static str = "network_usage";

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn collect(&self, ctx: &CollectorContext) -> CollectOutcome {
        if self.busy.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst).is_err() {
            debug!(collector = Self::NAME, "single-flight latch held, skipping");
            return CollectOutcome::Busy;
        }
        let outcome = self.run(ctx).await;
        self.busy.store(false, Ordering::SeqCst);

        let health = ctx.host_state.record(
            Self::NAME,
            outcome,
            matches!(outcome, CollectOutcome::Failed).then(|| "network-usage collection failed".to_string()),
        );
        if matches!(health, crate::host_state::CollectorHealth::Disabled) {
            warn!(collector = Self::NAME, "consecutive error threshold reached, collector disabled");
            return CollectOutcome::Disabled;
        }
        outcome
    }
}

impl NetworkUsageCollector {
    async fn run(&self, ctx: &CollectorContext) -> CollectOutcome {
        let interval = self.interval;
        let samples = match tokio::task::spawn_blocking(collect_usage_samples).await {
            Ok(Ok(s)) => s,
            _ => return CollectOutcome::Failed,
        };

        let known_links: Vec<String> = match network_repo::list_interfaces(&ctx.pool, &ctx.host).await {
            Ok(ifaces) => ifaces.iter().map(|i| i.link.clone()).collect(),
            Err(_) => return CollectOutcome::Failed,
        };
        let speeds: std::collections::HashMap<String, (Option<i64>, Option<crate::model::LinkClass>)> =
            match network_repo::list_interfaces(&ctx.pool, &ctx.host).await {
                Ok(ifaces) => ifaces.into_iter().map(|i| (i.link.clone(), (i.speed, Some(i.class)))).collect(),
                Err(_) => return CollectOutcome::Failed,
            };

        let curr_ts = chrono::Utc::now();
        let lookup_cutoff = curr_ts - chrono::Duration::from_std(interval).unwrap_or(chrono::Duration::seconds(10))
            + chrono::Duration::from_std(self.lookup_grace).unwrap_or(chrono::Duration::seconds(2));

        let mut rows = Vec::with_capacity(samples.len());
        for sample in &samples {
            let resolved = network::resolve_usage_link_names(&sample.link, &known_links);
            for (full_name, confidence) in resolved {
                let prev = match network_repo::latest_usage_before(&ctx.pool, &ctx.host, &full_name, lookup_cutoff).await {
                    Ok(p) => p,
                    Err(_) => continue,
                };
                let (speed, class) = speeds.get(&full_name).cloned().unwrap_or((None, None));
                let mut usage = match prev {
                    Some(prev) => {
                        let prev_sample = UsageSample {
                            link: prev.link.clone(),
                            ipackets: prev.ipackets,
                            rbytes: prev.rbytes,
                            ierrors: prev.ierrors,
                            opackets: prev.opackets,
                            obytes: prev.obytes,
                            oerrors: prev.oerrors,
                        };
                        network::compute_usage_delta(&ctx.host, &full_name, &prev_sample, prev.scan_timestamp, sample, curr_ts, speed, class)
                    }
                    // No baseline to diff against yet: persist the raw counters so the
                    // next pass has something to diff (§4.3 S1 cold-start case).
                    None => network::baseline_usage(&ctx.host, &full_name, sample, curr_ts, speed, class),
                };
                usage.name_confidence = Some(confidence);
                rows.push(usage);
            }
        }

        if network_repo::insert_usage_batch(&ctx.pool, &rows, ctx.batch_size).await.is_err() {
            return CollectOutcome::Failed;
        }

        CollectOutcome::Success
    }
}

fn collect_usage_samples() -> Result<Vec<UsageSample>, crate::error::CommandError> {
    let out = crate::runner::run(&CommandSpec::new("dladm", &["show-usage", "-p", "-o", "link,ipackets,rbytes,ierrors,opackets,obytes,oerrors"]));
    Ok(out.stdout.lines().filter(|l| !l.is_empty()).filter_map(|l| network::parse_show_usage_line(l).ok()).collect())
}

//! Network-config collector: datalink enumeration + IP/route current state.
//! Cadence: minutes (§4.3).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{debug, warn};

use crate::collector::{Collector, CollectorContext};
use crate::error::CollectOutcome;
use crate::model::NetworkInterface;
use crate::parser::network;
use crate::runner::CommandSpec;
use crate::storage::network_repo;

pub struct NetworkConfigCollector {
    busy: AtomicBool,
    interval: Duration,
}

impl NetworkConfigCollector {
    pub fn new(interval: Duration) -> Self {
        Self { busy: AtomicBool::new(false), interval }
    }
}

impl Collector for NetworkConfigCollector {
    const NAME: &'static str = "network_config";

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
            matches!(outcome, CollectOutcome::Failed).then(|| "network-config collection failed".to_string()),
        );
        if matches!(health, crate::host_state::CollectorHealth::Disabled) {
            warn!(collector = Self::NAME, "consecutive error threshold reached, collector disabled");
            return CollectOutcome::Disabled;
        }
        outcome
    }
}

impl NetworkConfigCollector {
    async fn run(&self, ctx: &CollectorContext) -> CollectOutcome {
        let host = ctx.host.to_string();
        let result = tokio::task::spawn_blocking(move || collect_sync(&host)).await;

        let Ok(Ok(interfaces)) = result else {
            return CollectOutcome::Failed;
        };

        if network_repo::replace_interfaces(&ctx.pool, &ctx.host, &interfaces, ctx.batch_size).await.is_err() {
            return CollectOutcome::Failed;
        }

        let host = ctx.host.to_string();
        let (addrs, routes) = match tokio::task::spawn_blocking(move || collect_ip_and_routes(&host)).await {
            Ok(v) => v,
            Err(_) => return CollectOutcome::Failed,
        };

        if network_repo::replace_ip_addresses(&ctx.pool, &ctx.host, &addrs).await.is_err() {
            return CollectOutcome::Failed;
        }
        if network_repo::replace_routes(&ctx.pool, &ctx.host, &routes).await.is_err() {
            return CollectOutcome::Failed;
        }

        CollectOutcome::Success
    }
}

fn collect_sync(host: &str) -> Result<Vec<NetworkInterface>, crate::error::CommandError> {
    let specs = [
        CommandSpec::new("dladm", &["show-link", "-p", "-o", "link,class,mtu,state,over,speed"]),
        CommandSpec::new("dladm", &["show-vnic", "-p", "-o", "link,over,speed,macaddress,macaddrtype,vid,zone"]),
        CommandSpec::new("dladm", &["show-phys", "-p", "-o", "link,state,speed,duplex,over"]),
        CommandSpec::new("dladm", &["show-etherstub", "-p", "-o", "link"]),
        CommandSpec::new("dladm", &["show-aggr", "-p", "-o", "link,policy,lacpmode,ports"]),
        CommandSpec::new("dladm", &["show-aggr", "-x", "-p", "-o", "link,port,speed,duplex,state"]),
    ];
    let outputs = crate::runner::run_parallel(&specs);

    let mut merged: HashMap<String, NetworkInterface> = HashMap::new();

    let aggr_ports: Vec<String> = outputs[5].stdout.lines().map(|l| l.to_string()).collect();
    let mut ports_by_link: HashMap<String, Vec<String>> = HashMap::new();
    for line in &aggr_ports {
        if let Some(link) = line.split(':').next() {
            ports_by_link.entry(link.to_string()).or_default().push(line.clone());
        }
    }

    let parse_into = |merged: &mut HashMap<String, NetworkInterface>, text: &str, parse: fn(&str, &str) -> Result<NetworkInterface, crate::error::ParseError>| {
        for line in text.lines().filter(|l| !l.is_empty()) {
            if let Ok(rec) = parse(host, line) {
                merged
                    .entry(rec.link.clone())
                    .and_modify(|existing| *existing = network::merge_interface(existing.clone(), rec.clone()))
                    .or_insert(rec);
            }
        }
    };

    parse_into(&mut merged, &outputs[0].stdout, network::parse_show_link_line);
    parse_into(&mut merged, &outputs[1].stdout, network::parse_show_vnic_line);
    parse_into(&mut merged, &outputs[2].stdout, network::parse_show_phys_line);
    parse_into(&mut merged, &outputs[3].stdout, network::parse_show_etherstub_line);

    for line in outputs[4].stdout.lines().filter(|l| !l.is_empty()) {
        let link = line.split(':').next().unwrap_or_default();
        let ports = ports_by_link.get(link).cloned().unwrap_or_default();
        if let Ok(rec) = network::parse_show_aggr_line(host, line, &ports) {
            merged
                .entry(rec.link.clone())
                .and_modify(|existing| *existing = network::merge_interface(existing.clone(), rec.clone()))
                .or_insert(rec);
        }
    }

    Ok(merged.into_values().collect())
}

fn collect_ip_and_routes(host: &str) -> (Vec<crate::model::IpAddress>, Vec<crate::model::Route>) {
    let ip_out = crate::runner::run(&CommandSpec::new("ipadm", &["show-addr", "-p", "-o", "ADDROBJ,STATE,ADDR"]).with_timeout(Duration::from_secs(10)));
    let addrs = ip_out
        .stdout
        .lines()
        .filter(|l| !l.is_empty())
        .filter_map(|l| network::parse_ipadm_line(host, l).ok())
        .collect();

    let rt4 = crate::runner::run(&CommandSpec::new("netstat", &["-rn", "-f", "inet"]).with_timeout(Duration::from_secs(10)));
    let rt6 = crate::runner::run(&CommandSpec::new("netstat", &["-rn", "-f", "inet6"]).with_timeout(Duration::from_secs(10)));
    let mut routes = Vec::new();
    for line in rt4.stdout.lines().skip_while(|l| !l.trim_start().starts_with(|c: char| c.is_ascii_alphanumeric()) || l.contains("Destination")) {
        if let Some(r) = network::parse_netstat_route_line(host, line, 4) {
            routes.push(r);
        }
    }
    for line in rt6.stdout.lines().skip_while(|l| !l.trim_start().starts_with(|c: char| c.is_ascii_alphanumeric()) || l.contains("Destination")) {
        if let Some(r) = network::parse_netstat_route_line(host, line, 6) {
            routes.push(r);
        }
    }

    (addrs, routes)
}

//! Parsers for `dladm`, `ipadm`, and `netstat` output.

use std::collections::HashMap;

use crate::error::ParseError;
use crate::model::{IpAddress, LinkClass, NameConfidence, NetworkInterface, NetworkUsage, Route};

/// Splits a `dladm -p` (parsable) line on `:`, honouring `\:` as an escaped
/// literal colon inside a field (MAC addresses: `f2\:02\:00\:01\:00\:01`).
pub fn split_parsable_fields(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&':') => {
                current.push(':');
                chars.next();
            }
            ':' => {
                fields.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

fn field(fields: &[String], idx: usize) -> Option<&str> {
    fields.get(idx).map(|s| s.as_str()).filter(|s| !s.is_empty())
}

fn opt_string(fields: &[String], idx: usize) -> Option<String> {
    field(fields, idx).map(|s| s.to_string())
}

fn opt_i64(fields: &[String], idx: usize) -> Option<i64> {
    field(fields, idx).and_then(|s| s.parse().ok())
}

/// Parses one line of `dladm show-link -p -o link,class,mtu,state,over,speed`.
pub fn parse_show_link_line(host: &str, line: &str) -> Result<NetworkInterface, ParseError> {
    let fields = split_parsable_fields(line);
    let link = field(&fields, 0).ok_or_else(|| ParseError::new("show-link: missing link field"))?;
    Ok(NetworkInterface {
        host: host.to_string(),
        link: link.to_string(),
        class: field(&fields, 1).map(LinkClass::parse).unwrap_or(LinkClass::Other),
        mtu: opt_i64(&fields, 2),
        state: opt_string(&fields, 3),
        over: opt_string(&fields, 4),
        speed: opt_i64(&fields, 5),
        duplex: None,
        macaddress: None,
        macaddrtype: None,
        vid: None,
        zone: None,
        aggr_detail: None,
    })
}

/// Parses one line of
/// `dladm show-vnic -p -o link,over,speed,macaddress,macaddrtype,vid,zone`.
pub fn parse_show_vnic_line(host: &str, line: &str) -> Result<NetworkInterface, ParseError> {
    let fields = split_parsable_fields(line);
    let link = field(&fields, 0).ok_or_else(|| ParseError::new("show-vnic: missing link field"))?;
    Ok(NetworkInterface {
        host: host.to_string(),
        link: link.to_string(),
        class: LinkClass::Vnic,
        over: opt_string(&fields, 1),
        speed: opt_i64(&fields, 2),
        macaddress: opt_string(&fields, 3),
        macaddrtype: opt_string(&fields, 4),
        vid: opt_i64(&fields, 5),
        zone: opt_string(&fields, 6),
        mtu: None,
        state: None,
        duplex: None,
        aggr_detail: None,
    })
}

/// Parses one line of `dladm show-phys -p -o link,state,speed,duplex,over`.
pub fn parse_show_phys_line(host: &str, line: &str) -> Result<NetworkInterface, ParseError> {
    let fields = split_parsable_fields(line);
    let link = field(&fields, 0).ok_or_else(|| ParseError::new("show-phys: missing link field"))?;
    Ok(NetworkInterface {
        host: host.to_string(),
        link: link.to_string(),
        class: LinkClass::Phys,
        state: opt_string(&fields, 1),
        speed: opt_i64(&fields, 2),
        duplex: opt_string(&fields, 3),
        over: opt_string(&fields, 4),
        mtu: None,
        macaddress: None,
        macaddrtype: None,
        vid: None,
        zone: None,
        aggr_detail: None,
    })
}

/// Parses one line of `dladm show-etherstub -p -o link`.
pub fn parse_show_etherstub_line(host: &str, line: &str) -> Result<NetworkInterface, ParseError> {
    let fields = split_parsable_fields(line);
    let link = field(&fields, 0).ok_or_else(|| ParseError::new("show-etherstub: missing link field"))?;
    Ok(NetworkInterface {
        host: host.to_string(),
        link: link.to_string(),
        class: LinkClass::Etherstub,
        state: Some("up".to_string()),
        mtu: None,
        speed: None,
        duplex: None,
        over: None,
        macaddress: None,
        macaddrtype: None,
        vid: None,
        zone: None,
        aggr_detail: None,
    })
}

/// Parses one line of `dladm show-aggr -p -o link,policy,lacpmode,ports` plus
/// the companion `dladm show-aggr -x -p -o link,port,speed,duplex,state`.
/// `ports_detail` lines (may be empty) are folded into a JSON array.
pub fn parse_show_aggr_line(
    host: &str,
    line: &str,
    ports_detail: &[String],
) -> Result<NetworkInterface, ParseError> {
    let fields = split_parsable_fields(line);
    let link = field(&fields, 0).ok_or_else(|| ParseError::new("show-aggr: missing link field"))?;
    let policy = opt_string(&fields, 1);
    let lacp_mode = opt_string(&fields, 2);
    let ports: Vec<&str> = field(&fields, 3).map(|s| s.split(' ').filter(|p| !p.is_empty()).collect()).unwrap_or_default();

    let port_details: Vec<serde_json::Value> = ports_detail
        .iter()
        .map(|pl| {
            let pf = split_parsable_fields(pl);
            serde_json::json!({
                "port": field(&pf, 1),
                "speed": opt_i64(&pf, 2),
                "duplex": field(&pf, 3),
                "state": field(&pf, 4),
            })
        })
        .collect();

    Ok(NetworkInterface {
        host: host.to_string(),
        link: link.to_string(),
        class: LinkClass::Aggr,
        state: None,
        mtu: None,
        speed: None,
        duplex: None,
        over: None,
        macaddress: None,
        macaddrtype: None,
        vid: None,
        zone: None,
        aggr_detail: Some(serde_json::json!({
            "policy": policy,
            "lacp_mode": lacp_mode,
            "ports": ports,
            "ports_detail": port_details,
        })),
    })
}

/// Merges two interface records for the same `(host, link)`, preferring
/// non-null fields from `overlay` but never letting a blank overlay field
/// clobber aggregate-specific detail already present on `base` (§4.3).
pub fn merge_interface(base: NetworkInterface, overlay: NetworkInterface) -> NetworkInterface {
    NetworkInterface {
        host: base.host,
        link: base.link,
        class: overlay.class,
        state: overlay.state.or(base.state),
        mtu: overlay.mtu.or(base.mtu),
        speed: overlay.speed.or(base.speed),
        duplex: overlay.duplex.or(base.duplex),
        over: overlay.over.or(base.over),
        macaddress: overlay.macaddress.or(base.macaddress),
        macaddrtype: overlay.macaddrtype.or(base.macaddrtype),
        vid: overlay.vid.or(base.vid),
        zone: overlay.zone.or(base.zone),
        aggr_detail: overlay.aggr_detail.or(base.aggr_detail),
    }
}

/// Confidence used by the truncation heuristic, keyed by how many known
/// interfaces a truncated prefix matches.
pub fn confidence_for_match_count(n: usize) -> NameConfidence {
    match n {
        1 => NameConfidence::High,
        2 => NameConfidence::Medium,
        _ => NameConfidence::Low,
    }
}

/// Raw per-link counter snapshot read from `dladm show-usage` / `-link`.
#[derive(Debug, Clone, PartialEq)]
pub struct UsageSample {
    pub link: String,
    pub ipackets: u64,
    pub rbytes: u64,
    pub ierrors: u64,
    pub opackets: u64,
    pub obytes: u64,
    pub oerrors: u64,
}

/// Parses one line of `dladm show-usage -p -o link,ipackets,rbytes,ierrors,opackets,obytes,oerrors`.
/// Truncated names (observed from `dladm show-usage` field-width limits) are
/// resolved against `known_links`: if the short name matches a known
/// interface exactly it is used as-is; if it doesn't match but is a prefix
/// of one or more known interfaces, a `UsageSample` is emitted per match,
/// annotated by the caller with a confidence label.
pub fn parse_show_usage_line(line: &str) -> Result<UsageSample, ParseError> {
    let fields = split_parsable_fields(line);
    let link = field(&fields, 0).ok_or_else(|| ParseError::new("show-usage: missing link field"))?;
    let u = |i: usize| -> u64 { field(&fields, i).and_then(|s| s.parse().ok()).unwrap_or(0) };
    Ok(UsageSample {
        link: link.to_string(),
        ipackets: u(1),
        rbytes: u(2),
        ierrors: u(3),
        opackets: u(4),
        obytes: u(5),
        oerrors: u(6),
    })
}

/// Resolves a raw usage sample's link name against the set of known
/// interface names, returning every candidate full name with a confidence
/// label. Exact matches are always high confidence and unique.
pub fn resolve_usage_link_names(short_name: &str, known_links: &[String]) -> Vec<(String, NameConfidence)> {
    if known_links.iter().any(|l| l == short_name) {
        return vec![(short_name.to_string(), NameConfidence::High)];
    }
    let matches: Vec<&String> = known_links.iter().filter(|l| l.starts_with(short_name)).collect();
    if matches.is_empty() {
        return vec![(short_name.to_string(), NameConfidence::Low)];
    }
    let confidence = confidence_for_match_count(matches.len());
    matches.into_iter().map(|l| (l.clone(), confidence)).collect()
}

/// Computes per-field deltas between a previous and current usage sample,
/// derives instantaneous rx/tx bps/mbps and utilisation, and floors any
/// negative delta (counter wraparound/reset) to "no info" (`None`).
///
/// See spec §4.3 scenario S1.
pub fn compute_usage_delta(
    host: &str,
    link: &str,
    prev: &UsageSample,
    prev_ts: chrono::DateTime<chrono::Utc>,
    curr: &UsageSample,
    curr_ts: chrono::DateTime<chrono::Utc>,
    interface_speed_mbps: Option<i64>,
    interface_class: Option<LinkClass>,
) -> NetworkUsage {
    let time_delta_seconds = (curr_ts - prev_ts).num_milliseconds() as f64 / 1000.0;

    let delta = |curr_v: u64, prev_v: u64| -> Option<u64> { curr_v.checked_sub(prev_v) };

    let rbytes_delta = delta(curr.rbytes, prev.rbytes);
    let obytes_delta = delta(curr.obytes, prev.obytes);

    let (rx_bps, rx_mbps, rx_util) = derive_rate(rbytes_delta, time_delta_seconds, interface_speed_mbps);
    let (tx_bps, tx_mbps, tx_util) = derive_rate(obytes_delta, time_delta_seconds, interface_speed_mbps);

    NetworkUsage {
        host: host.to_string(),
        link: link.to_string(),
        scan_timestamp: curr_ts,
        ipackets: curr.ipackets,
        rbytes: curr.rbytes,
        ierrors: curr.ierrors,
        opackets: curr.opackets,
        obytes: curr.obytes,
        oerrors: curr.oerrors,
        ipackets_delta: delta(curr.ipackets, prev.ipackets),
        rbytes_delta,
        ierrors_delta: delta(curr.ierrors, prev.ierrors),
        opackets_delta: delta(curr.opackets, prev.opackets),
        obytes_delta,
        oerrors_delta: delta(curr.oerrors, prev.oerrors),
        time_delta_seconds: if time_delta_seconds.is_finite() { Some(time_delta_seconds) } else { None },
        rx_bps,
        tx_bps,
        rx_mbps,
        tx_mbps,
        rx_utilization_pct: rx_util,
        tx_utilization_pct: tx_util,
        interface_speed_mbps,
        interface_class,
        name_confidence: None,
    }
}

/// Builds a baseline usage row for a link with no prior sample to diff
/// against (cold start, or the first time a link is ever seen). Raw
/// counters are recorded so the next collection pass has something to
/// diff against; all derived deltas and rates are left `None`.
pub fn baseline_usage(
    host: &str,
    link: &str,
    curr: &UsageSample,
    curr_ts: chrono::DateTime<chrono::Utc>,
    interface_speed_mbps: Option<i64>,
    interface_class: Option<LinkClass>,
) -> NetworkUsage {
    NetworkUsage {
        host: host.to_string(),
        link: link.to_string(),
        scan_timestamp: curr_ts,
        ipackets: curr.ipackets,
        rbytes: curr.rbytes,
        ierrors: curr.ierrors,
        opackets: curr.opackets,
        obytes: curr.obytes,
        oerrors: curr.oerrors,
        ipackets_delta: None,
        rbytes_delta: None,
        ierrors_delta: None,
        opackets_delta: None,
        obytes_delta: None,
        oerrors_delta: None,
        time_delta_seconds: None,
        rx_bps: None,
        tx_bps: None,
        rx_mbps: None,
        tx_mbps: None,
        rx_utilization_pct: None,
        tx_utilization_pct: None,
        interface_speed_mbps,
        interface_class,
        name_confidence: None,
    }
}

/// `bytes_delta / elapsed_seconds` in bytes/s, Mbit/s, and utilisation % of
/// `interface_speed_mbps`. Any NaN/invalid arithmetic (zero elapsed time,
/// missing speed) collapses to `None` rather than propagating NaN.
fn derive_rate(bytes_delta: Option<u64>, elapsed_secs: f64, speed_mbps: Option<i64>) -> (Option<f64>, Option<f64>, Option<f64>) {
    let Some(delta) = bytes_delta else { return (None, None, None) };
    if !elapsed_secs.is_finite() || elapsed_secs <= 0.0 {
        return (None, None, None);
    }
    let bps = delta as f64 / elapsed_secs;
    if !bps.is_finite() {
        return (None, None, None);
    }
    let mbps = crate::parser::units::round2(bps * 8.0 / 1_000_000.0);
    let util = speed_mbps.and_then(|speed| {
        if speed <= 0 {
            return None;
        }
        let pct = crate::parser::units::round2(mbps / speed as f64 * 100.0);
        if pct.is_finite() { Some(pct) } else { None }
    });
    (Some(bps), Some(mbps), util)
}

/// Parses one line of `ipadm show-addr -p -o ADDROBJ,STATE,ADDR`.
pub fn parse_ipadm_line(host: &str, line: &str) -> Result<IpAddress, ParseError> {
    let fields = split_parsable_fields(line);
    let addrobj = field(&fields, 0).ok_or_else(|| ParseError::new("ipadm: missing ADDROBJ"))?;
    let interface = addrobj.split('/').next().unwrap_or(addrobj).to_string();
    let state = opt_string(&fields, 1);
    let addr = field(&fields, 2).ok_or_else(|| ParseError::new("ipadm: missing ADDR"))?;
    let (address, prefix) = match addr.split_once('/') {
        Some((a, p)) => (a.to_string(), p.parse().ok()),
        None => (addr.to_string(), None),
    };
    let ip_version = if address.contains(':') { 6 } else { 4 };
    Ok(IpAddress {
        host: host.to_string(),
        interface,
        address,
        prefix,
        ip_version,
        state,
        scan_timestamp: chrono::Utc::now(),
    })
}

/// Parses one line of `netstat -rn` for either address family, e.g.
/// `default         192.168.1.1       UG        1     1234  igb0`.
pub fn parse_netstat_route_line(host: &str, line: &str, ip_version: i64) -> Option<Route> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 2 {
        return None;
    }
    let destination = parts[0].to_string();
    let gateway = parts.get(1).map(|s| s.to_string());
    let flags = parts.get(2).map(|s| s.to_string());
    let reference_count = parts.get(3).and_then(|s| s.parse().ok());
    let use_count = parts.get(4).and_then(|s| s.parse().ok());
    let interface = parts.get(5).map(|s| s.to_string());
    let is_default = destination == "default" || destination == "0.0.0.0/0" || destination == "::/0";
    Some(Route {
        host: host.to_string(),
        destination,
        gateway,
        flags,
        reference_count,
        use_count,
        interface,
        is_default,
        ip_version,
        scan_timestamp: chrono::Utc::now(),
    })
}

/// Groups raw usage lines by (possibly truncated) link name for the
/// truncation-correlation step in the network-usage collector.
pub fn group_usage_by_link(samples: Vec<UsageSample>) -> HashMap<String, UsageSample> {
    samples.into_iter().map(|s| (s.link.clone(), s)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Spec §8 scenario S2.
    #[test]
    fn parses_show_vnic_line_with_escaped_mac_colons() {
        let line = r"vnic0:aggr0:10000:f2\:02\:00\:01\:00\:01:fixed:0:global";
        let rec = parse_show_vnic_line("host1", line).unwrap();
        assert_eq!(rec.link, "vnic0");
        assert_eq!(rec.over.as_deref(), Some("aggr0"));
        assert_eq!(rec.speed, Some(10000));
        assert_eq!(rec.macaddress.as_deref(), Some("f2:02:00:01:00:01"));
        assert_eq!(rec.macaddrtype.as_deref(), Some("fixed"));
        assert_eq!(rec.vid, Some(0));
        assert_eq!(rec.zone.as_deref(), Some("global"));
    }

    #[test]
    fn show_link_handles_missing_trailing_fields() {
        let rec = parse_show_link_line("host1", "igb0:phys:1500:up").unwrap();
        assert_eq!(rec.link, "igb0");
        assert_eq!(rec.class, LinkClass::Phys);
        assert_eq!(rec.mtu, Some(1500));
        assert_eq!(rec.over, None);
    }

    #[test]
    fn merge_preserves_aggregate_detail() {
        let aggr = parse_show_aggr_line("h", "aggr0:L4:active:igb0 igb1", &[]).unwrap();
        let link = parse_show_link_line("h", "aggr0:aggr:1500:up").unwrap();
        let merged = merge_interface(aggr, link);
        assert!(merged.aggr_detail.is_some());
        assert_eq!(merged.mtu, Some(1500));
    }

    /// Spec §8 scenario S1.
    #[test]
    fn usage_delta_math() {
        let prev = UsageSample {
            link: "vnic0".into(),
            ipackets: 0,
            rbytes: 1_000_000,
            ierrors: 0,
            opackets: 0,
            obytes: 500_000,
            oerrors: 0,
        };
        let curr = UsageSample {
            link: "vnic0".into(),
            ipackets: 0,
            rbytes: 11_000_000,
            ierrors: 0,
            opackets: 0,
            obytes: 500_500,
            oerrors: 0,
        };
        let t0 = chrono::Utc::now();
        let t1 = t0 + chrono::Duration::seconds(10);
        let rec = compute_usage_delta("h1", "vnic0", &prev, t0, &curr, t1, Some(1000), Some(LinkClass::Vnic));
        assert_eq!(rec.rbytes_delta, Some(10_000_000));
        assert_eq!(rec.obytes_delta, Some(500));
        assert_eq!(rec.time_delta_seconds, Some(10.0));
        assert!((rec.rx_bps.unwrap() - 1_000_000.0).abs() < 1.0);
        assert!((rec.rx_mbps.unwrap() - 8.00).abs() < 0.01);
        assert!((rec.tx_mbps.unwrap() - 0.00).abs() < 0.01);
        assert!((rec.rx_utilization_pct.unwrap() - 0.80).abs() < 0.01);
    }

    #[test]
    fn counter_wraparound_yields_none_not_negative() {
        let prev = UsageSample { link: "a".into(), ipackets: 0, rbytes: 1000, ierrors: 0, opackets: 0, obytes: 0, oerrors: 0 };
        let curr = UsageSample { link: "a".into(), ipackets: 0, rbytes: 10, ierrors: 0, opackets: 0, obytes: 0, oerrors: 0 };
        let t0 = chrono::Utc::now();
        let t1 = t0 + chrono::Duration::seconds(10);
        let rec = compute_usage_delta("h", "a", &prev, t0, &curr, t1, Some(1000), None);
        assert_eq!(rec.rbytes_delta, None);
        assert_eq!(rec.rx_bps, None);
    }

    #[test]
    fn truncated_name_resolves_to_all_prefix_matches() {
        let known = vec!["vnic0123456789".to_string(), "vnic0123456999".to_string()];
        let matches = resolve_usage_link_names("vnic012345", &known);
        assert_eq!(matches.len(), 2);
        assert!(matches.iter().all(|(_, c)| *c == NameConfidence::Medium));
    }

    #[test]
    fn exact_match_is_high_confidence_and_unique() {
        let known = vec!["vnic0".to_string()];
        let matches = resolve_usage_link_names("vnic0", &known);
        assert_eq!(matches, vec![("vnic0".to_string(), NameConfidence::High)]);
    }

    #[test]
    fn ipadm_line_splits_addr_prefix() {
        let ip = parse_ipadm_line("h", "net0/v4:ok:10.0.0.5/24").unwrap();
        assert_eq!(ip.interface, "net0");
        assert_eq!(ip.address, "10.0.0.5");
        assert_eq!(ip.prefix, Some(24));
        assert_eq!(ip.ip_version, 4);
    }

    #[test]
    fn netstat_default_route_is_flagged() {
        let route = parse_netstat_route_line("h", "default 192.168.1.1 UG 1 1234 igb0", 4).unwrap();
        assert!(route.is_default);
        assert_eq!(route.gateway.as_deref(), Some("192.168.1.1"));
    }
}

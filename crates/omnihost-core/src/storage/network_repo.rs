//! Persistence for network interfaces (current-state replace), usage
//! (append), IP addresses and routes (current-state replace).

use sqlx::{Row, SqlitePool};

use crate::error::PersistError;
use crate::model::{IpAddress, LinkClass, NameConfidence, NetworkInterface, NetworkUsage, Route};

/// Replaces all `(host, link)` rows present in `interfaces` (delete-then-
/// insert, batched) without touching links not present in this scan.
pub async fn replace_interfaces(pool: &SqlitePool, host: &str, interfaces: &[NetworkInterface], batch_size: usize) -> Result<(), PersistError> {
    let links: Vec<&str> = interfaces.iter().map(|i| i.link.as_str()).collect();
    if !links.is_empty() {
        let mut qb: sqlx::QueryBuilder<sqlx::Sqlite> = sqlx::QueryBuilder::new("DELETE FROM network_interface WHERE host = ");
        qb.push_bind(host.to_string());
        qb.push(" AND link IN (");
        let mut sep = qb.separated(", ");
        for link in &links {
            sep.push_bind(link.to_string());
        }
        sep.push_unseparated(")");
        qb.build().execute(pool).await?;
    }

    for chunk in interfaces.chunks(batch_size.max(1)) {
        let mut qb: sqlx::QueryBuilder<sqlx::Sqlite> = sqlx::QueryBuilder::new(
            "INSERT INTO network_interface (host, link, class, state, mtu, speed, duplex, over, macaddress, macaddrtype, vid, zone, aggr_detail, updated_at) ",
        );
        let now = chrono::Utc::now().to_rfc3339();
        qb.push_values(chunk, |mut b, iface| {
            b.push_bind(iface.host.clone())
                .push_bind(iface.link.clone())
                .push_bind(class_str(iface.class).to_string())
                .push_bind(iface.state.clone())
                .push_bind(iface.mtu)
                .push_bind(iface.speed)
                .push_bind(iface.duplex.clone())
                .push_bind(iface.over.clone())
                .push_bind(iface.macaddress.clone())
                .push_bind(iface.macaddrtype.clone())
                .push_bind(iface.vid)
                .push_bind(iface.zone.clone())
                .push_bind(iface.aggr_detail.as_ref().map(|v| v.to_string()))
                .push_bind(now.clone());
        });
        qb.build().execute(pool).await?;
    }
    Ok(())
}

pub async fn list_interfaces(pool: &SqlitePool, host: &str) -> Result<Vec<NetworkInterface>, PersistError> {
    let rows = sqlx::query("SELECT * FROM network_interface WHERE host = ? ORDER BY link").bind(host).fetch_all(pool).await?;
    Ok(rows.iter().map(row_to_interface).collect())
}

pub async fn insert_usage_batch(pool: &SqlitePool, usages: &[NetworkUsage], batch_size: usize) -> Result<(), PersistError> {
    for chunk in usages.chunks(batch_size.max(1)) {
        let mut qb: sqlx::QueryBuilder<sqlx::Sqlite> = sqlx::QueryBuilder::new(
            "INSERT INTO network_usage (host, link, scan_timestamp, ipackets, rbytes, ierrors, opackets, obytes, oerrors,
                ipackets_delta, rbytes_delta, ierrors_delta, opackets_delta, obytes_delta, oerrors_delta, time_delta_seconds,
                rx_bps, tx_bps, rx_mbps, tx_mbps, rx_utilization_pct, tx_utilization_pct, interface_speed_mbps, interface_class, name_confidence) ",
        );
        qb.push_values(chunk, |mut b, u| {
            b.push_bind(u.host.clone())
                .push_bind(u.link.clone())
                .push_bind(u.scan_timestamp.to_rfc3339())
                .push_bind(u.ipackets as i64)
                .push_bind(u.rbytes as i64)
                .push_bind(u.ierrors as i64)
                .push_bind(u.opackets as i64)
                .push_bind(u.obytes as i64)
                .push_bind(u.oerrors as i64)
                .push_bind(u.ipackets_delta.map(|v| v as i64))
                .push_bind(u.rbytes_delta.map(|v| v as i64))
                .push_bind(u.ierrors_delta.map(|v| v as i64))
                .push_bind(u.opackets_delta.map(|v| v as i64))
                .push_bind(u.obytes_delta.map(|v| v as i64))
                .push_bind(u.oerrors_delta.map(|v| v as i64))
                .push_bind(u.time_delta_seconds)
                .push_bind(u.rx_bps)
                .push_bind(u.tx_bps)
                .push_bind(u.rx_mbps)
                .push_bind(u.tx_mbps)
                .push_bind(u.rx_utilization_pct)
                .push_bind(u.tx_utilization_pct)
                .push_bind(u.interface_speed_mbps)
                .push_bind(u.interface_class.map(class_str))
                .push_bind(u.name_confidence.map(confidence_str));
        });
        qb.build().execute(pool).await?;
    }
    Ok(())
}

/// Fetches the most recent usage sample for `link` older than
/// `now - (interval - grace)`, used by the usage collector to find a delta
/// baseline (§4.3: "previous snapshot older than interval − 2s").
pub async fn latest_usage_before(pool: &SqlitePool, host: &str, link: &str, not_after: chrono::DateTime<chrono::Utc>) -> Result<Option<NetworkUsage>, PersistError> {
    let row = sqlx::query("SELECT * FROM network_usage WHERE host = ? AND link = ? AND scan_timestamp <= ? ORDER BY scan_timestamp DESC LIMIT 1")
        .bind(host)
        .bind(link)
        .bind(not_after.to_rfc3339())
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|r| row_to_usage(&r)))
}

pub async fn replace_ip_addresses(pool: &SqlitePool, host: &str, addresses: &[IpAddress]) -> Result<(), PersistError> {
    sqlx::query("DELETE FROM ip_address WHERE host = ?").bind(host).execute(pool).await?;
    if addresses.is_empty() {
        return Ok(());
    }
    let mut qb: sqlx::QueryBuilder<sqlx::Sqlite> = sqlx::QueryBuilder::new("INSERT INTO ip_address (host, interface, address, prefix, ip_version, state, scan_timestamp) ");
    qb.push_values(addresses, |mut b, ip| {
        b.push_bind(ip.host.clone())
            .push_bind(ip.interface.clone())
            .push_bind(ip.address.clone())
            .push_bind(ip.prefix)
            .push_bind(ip.ip_version)
            .push_bind(ip.state.clone())
            .push_bind(ip.scan_timestamp.to_rfc3339());
    });
    qb.build().execute(pool).await?;
    Ok(())
}

pub async fn replace_routes(pool: &SqlitePool, host: &str, routes: &[Route]) -> Result<(), PersistError> {
    sqlx::query("DELETE FROM route WHERE host = ?").bind(host).execute(pool).await?;
    if routes.is_empty() {
        return Ok(());
    }
    let mut qb: sqlx::QueryBuilder<sqlx::Sqlite> = sqlx::QueryBuilder::new("INSERT INTO route (host, destination, gateway, flags, reference_count, use_count, interface, is_default, ip_version, scan_timestamp) ");
    qb.push_values(routes, |mut b, r| {
        b.push_bind(r.host.clone())
            .push_bind(r.destination.clone())
            .push_bind(r.gateway.clone())
            .push_bind(r.flags.clone())
            .push_bind(r.reference_count)
            .push_bind(r.use_count)
            .push_bind(r.interface.clone())
            .push_bind(r.is_default)
            .push_bind(r.ip_version)
            .push_bind(r.scan_timestamp.to_rfc3339());
    });
    qb.build().execute(pool).await?;
    Ok(())
}

pub async fn list_ip_addresses(pool: &SqlitePool, host: &str) -> Result<Vec<IpAddress>, PersistError> {
    let rows = sqlx::query("SELECT * FROM ip_address WHERE host = ? ORDER BY interface, address").bind(host).fetch_all(pool).await?;
    Ok(rows
        .iter()
        .map(|r| IpAddress {
            host: r.get("host"),
            interface: r.get("interface"),
            address: r.get("address"),
            prefix: r.get("prefix"),
            ip_version: r.get("ip_version"),
            state: r.get("state"),
            scan_timestamp: chrono::DateTime::parse_from_rfc3339(&r.get::<String, _>("scan_timestamp")).unwrap().with_timezone(&chrono::Utc),
        })
        .collect())
}

pub async fn list_routes(pool: &SqlitePool, host: &str) -> Result<Vec<Route>, PersistError> {
    let rows = sqlx::query("SELECT * FROM route WHERE host = ? ORDER BY destination").bind(host).fetch_all(pool).await?;
    Ok(rows
        .iter()
        .map(|r| Route {
            host: r.get("host"),
            destination: r.get("destination"),
            gateway: r.get("gateway"),
            flags: r.get("flags"),
            reference_count: r.get("reference_count"),
            use_count: r.get("use_count"),
            interface: r.get("interface"),
            is_default: r.get("is_default"),
            ip_version: r.get("ip_version"),
            scan_timestamp: chrono::DateTime::parse_from_rfc3339(&r.get::<String, _>("scan_timestamp")).unwrap().with_timezone(&chrono::Utc),
        })
        .collect())
}

/// Unsampled usage history for one link since `since`, used as the
/// NTILE-unavailable fallback path (§4.7).
pub async fn list_usage_since(pool: &SqlitePool, host: &str, link: &str, since: chrono::DateTime<chrono::Utc>) -> Result<Vec<NetworkUsage>, PersistError> {
    let rows = sqlx::query("SELECT * FROM network_usage WHERE host = ? AND link = ? AND scan_timestamp >= ? ORDER BY scan_timestamp ASC")
        .bind(host)
        .bind(link)
        .bind(since.to_rfc3339())
        .fetch_all(pool)
        .await?;
    Ok(rows.iter().map(row_to_usage).collect())
}

/// NTILE-sampled usage history across all links (or one, if `link` is
/// given) since `since`, bucketed into `buckets` tiles per link.
pub async fn list_usage_ntile_sampled(
    pool: &SqlitePool,
    host: &str,
    link: Option<&str>,
    since: chrono::DateTime<chrono::Utc>,
    buckets: i64,
) -> Result<Vec<NetworkUsage>, PersistError> {
    let rows = crate::storage::query::fetch_network_usage_ntile(pool, host, link, since, buckets).await?;
    Ok(rows.iter().map(row_to_usage).collect())
}

/// Most recent `limit` usage rows, newest first — the `per_entity=false`
/// path (§4.7: "simple limit/order by time desc").
pub async fn list_usage_recent(pool: &SqlitePool, host: &str, link: Option<&str>, limit: i64) -> Result<Vec<NetworkUsage>, PersistError> {
    let mut qb: sqlx::QueryBuilder<sqlx::Sqlite> = sqlx::QueryBuilder::new("SELECT * FROM network_usage WHERE host = ");
    qb.push_bind(host.to_string());
    if let Some(l) = link {
        qb.push(" AND link = ").push_bind(l.to_string());
    }
    qb.push(" ORDER BY scan_timestamp DESC LIMIT ").push_bind(limit);
    let rows = qb.build().fetch_all(pool).await?;
    Ok(rows.iter().map(row_to_usage).collect())
}

/// Latest usage row per link, for the `per_entity=true` + no-`since` path.
pub async fn latest_usage_per_link(pool: &SqlitePool, host: &str) -> Result<Vec<NetworkUsage>, PersistError> {
    let rows = crate::storage::query::fetch_latest_per_entity(pool, "network_usage", "*", host, "link").await?;
    Ok(rows.iter().map(row_to_usage).collect())
}

/// Every distinct link name with usage history for `host`, used to drive
/// the per-entity fallback sampling path when NTILE is unavailable.
pub async fn distinct_usage_links(pool: &SqlitePool, host: &str) -> Result<Vec<String>, PersistError> {
    let rows = sqlx::query("SELECT DISTINCT link FROM network_usage WHERE host = ?").bind(host).fetch_all(pool).await?;
    Ok(rows.iter().map(|r| r.get::<String, _>("link")).collect())
}

fn class_str(class: LinkClass) -> &'static str {
    match class {
        LinkClass::Phys => "phys",
        LinkClass::Vnic => "vnic",
        LinkClass::Aggr => "aggr",
        LinkClass::Etherstub => "etherstub",
        LinkClass::Vlan => "vlan",
        LinkClass::Other => "other",
    }
}

fn confidence_str(c: NameConfidence) -> &'static str {
    match c {
        NameConfidence::High => "high",
        NameConfidence::Medium => "medium",
        NameConfidence::Low => "low",
    }
}

fn row_to_interface(row: &sqlx::sqlite::SqliteRow) -> NetworkInterface {
    NetworkInterface {
        host: row.get("host"),
        link: row.get("link"),
        class: LinkClass::parse(&row.get::<String, _>("class")),
        state: row.get("state"),
        mtu: row.get("mtu"),
        speed: row.get("speed"),
        duplex: row.get("duplex"),
        over: row.get("over"),
        macaddress: row.get("macaddress"),
        macaddrtype: row.get("macaddrtype"),
        vid: row.get("vid"),
        zone: row.get("zone"),
        aggr_detail: row.get::<Option<String>, _>("aggr_detail").and_then(|s| serde_json::from_str(&s).ok()),
    }
}

fn row_to_usage(row: &sqlx::sqlite::SqliteRow) -> NetworkUsage {
    NetworkUsage {
        host: row.get("host"),
        link: row.get("link"),
        scan_timestamp: chrono::DateTime::parse_from_rfc3339(&row.get::<String, _>("scan_timestamp")).unwrap().with_timezone(&chrono::Utc),
        ipackets: row.get::<i64, _>("ipackets") as u64,
        rbytes: row.get::<i64, _>("rbytes") as u64,
        ierrors: row.get::<i64, _>("ierrors") as u64,
        opackets: row.get::<i64, _>("opackets") as u64,
        obytes: row.get::<i64, _>("obytes") as u64,
        oerrors: row.get::<i64, _>("oerrors") as u64,
        ipackets_delta: row.get::<Option<i64>, _>("ipackets_delta").map(|v| v as u64),
        rbytes_delta: row.get::<Option<i64>, _>("rbytes_delta").map(|v| v as u64),
        ierrors_delta: row.get::<Option<i64>, _>("ierrors_delta").map(|v| v as u64),
        opackets_delta: row.get::<Option<i64>, _>("opackets_delta").map(|v| v as u64),
        obytes_delta: row.get::<Option<i64>, _>("obytes_delta").map(|v| v as u64),
        oerrors_delta: row.get::<Option<i64>, _>("oerrors_delta").map(|v| v as u64),
        time_delta_seconds: row.get("time_delta_seconds"),
        rx_bps: row.get("rx_bps"),
        tx_bps: row.get("tx_bps"),
        rx_mbps: row.get("rx_mbps"),
        tx_mbps: row.get("tx_mbps"),
        rx_utilization_pct: row.get("rx_utilization_pct"),
        tx_utilization_pct: row.get("tx_utilization_pct"),
        interface_speed_mbps: row.get("interface_speed_mbps"),
        interface_class: row.get::<Option<String>, _>("interface_class").map(|s| LinkClass::parse(&s)),
        name_confidence: row.get::<Option<String>, _>("name_confidence").and_then(|s| match s.as_str() {
            "high" => Some(NameConfidence::High),
            "medium" => Some(NameConfidence::Medium),
            "low" => Some(NameConfidence::Low),
            _ => None,
        }),
    }
}

//! Idempotent schema migrations, applied at startup by [`super::open`].
//!
//! One `CREATE TABLE IF NOT EXISTS` / `CREATE INDEX IF NOT EXISTS` per
//! statement, run inside a single connection — matches the teacher's
//! single-file approach to owning all persistence concerns in one place.

use sqlx::SqlitePool;

use crate::error::PersistError;

const STATEMENTS: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS host_info (
        host TEXT PRIMARY KEY,
        hostname TEXT NOT NULL DEFAULT '',
        platform TEXT NOT NULL DEFAULT '',
        release TEXT NOT NULL DEFAULT '',
        arch TEXT NOT NULL DEFAULT '',
        uptime_seconds INTEGER,
        feature_flags TEXT NOT NULL DEFAULT '{}',
        last_network_config_scan TEXT,
        last_network_usage_scan TEXT,
        last_storage_scan TEXT,
        last_storage_frequent_scan TEXT,
        last_devices_scan TEXT,
        last_system_metrics_scan TEXT,
        error_counts TEXT NOT NULL DEFAULT '{}',
        last_error_message TEXT
    )"#,
    r#"CREATE TABLE IF NOT EXISTS network_interface (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        host TEXT NOT NULL,
        link TEXT NOT NULL,
        class TEXT NOT NULL,
        state TEXT,
        mtu INTEGER,
        speed INTEGER,
        duplex TEXT,
        over TEXT,
        macaddress TEXT,
        macaddrtype TEXT,
        vid INTEGER,
        zone TEXT,
        aggr_detail TEXT,
        updated_at TEXT NOT NULL,
        UNIQUE(host, link, class)
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_network_interface_host ON network_interface(host)",
    r#"CREATE TABLE IF NOT EXISTS network_usage (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        host TEXT NOT NULL,
        link TEXT NOT NULL,
        scan_timestamp TEXT NOT NULL,
        ipackets INTEGER NOT NULL,
        rbytes INTEGER NOT NULL,
        ierrors INTEGER NOT NULL,
        opackets INTEGER NOT NULL,
        obytes INTEGER NOT NULL,
        oerrors INTEGER NOT NULL,
        ipackets_delta INTEGER,
        rbytes_delta INTEGER,
        ierrors_delta INTEGER,
        opackets_delta INTEGER,
        obytes_delta INTEGER,
        oerrors_delta INTEGER,
        time_delta_seconds REAL,
        rx_bps REAL,
        tx_bps REAL,
        rx_mbps REAL,
        tx_mbps REAL,
        rx_utilization_pct REAL,
        tx_utilization_pct REAL,
        interface_speed_mbps INTEGER,
        interface_class TEXT,
        name_confidence TEXT
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_network_usage_host_link_ts ON network_usage(host, link, scan_timestamp)",
    r#"CREATE TABLE IF NOT EXISTS ip_address (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        host TEXT NOT NULL,
        interface TEXT NOT NULL,
        address TEXT NOT NULL,
        prefix INTEGER,
        ip_version INTEGER NOT NULL,
        state TEXT,
        scan_timestamp TEXT NOT NULL
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_ip_address_host ON ip_address(host)",
    r#"CREATE TABLE IF NOT EXISTS route (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        host TEXT NOT NULL,
        destination TEXT NOT NULL,
        gateway TEXT,
        flags TEXT,
        reference_count INTEGER,
        use_count INTEGER,
        interface TEXT,
        is_default INTEGER NOT NULL,
        ip_version INTEGER NOT NULL,
        scan_timestamp TEXT NOT NULL
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_route_host ON route(host)",
    r#"CREATE TABLE IF NOT EXISTS zfs_pool (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        host TEXT NOT NULL,
        pool TEXT NOT NULL,
        scan_timestamp TEXT NOT NULL,
        scan_type TEXT NOT NULL,
        alloc TEXT,
        alloc_bytes REAL,
        free TEXT,
        free_bytes REAL,
        capacity_pct REAL,
        read_ops REAL,
        write_ops REAL,
        read_bandwidth_bytes REAL,
        write_bandwidth_bytes REAL,
        health TEXT,
        status TEXT,
        errors TEXT,
        pool_type TEXT
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_zfs_pool_host_pool_ts ON zfs_pool(host, pool, scan_timestamp)",
    r#"CREATE TABLE IF NOT EXISTS zfs_dataset (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        host TEXT NOT NULL,
        name TEXT NOT NULL,
        pool TEXT NOT NULL,
        scan_timestamp TEXT NOT NULL,
        dataset_type TEXT,
        used TEXT,
        used_bytes REAL,
        available TEXT,
        available_bytes REAL,
        referenced TEXT,
        referenced_bytes REAL,
        compressratio REAL,
        mountpoint TEXT,
        properties TEXT NOT NULL DEFAULT '{}',
        dataset_exists INTEGER NOT NULL DEFAULT 1
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_zfs_dataset_host_name_ts ON zfs_dataset(host, name, scan_timestamp)",
    r#"CREATE TABLE IF NOT EXISTS disk (
        host TEXT NOT NULL,
        device_name TEXT NOT NULL,
        disk_index INTEGER,
        serial_number TEXT,
        manufacturer TEXT,
        model TEXT,
        firmware TEXT,
        capacity TEXT,
        capacity_bytes REAL,
        disk_type TEXT,
        interface_type TEXT,
        pool_assignment TEXT,
        is_available INTEGER NOT NULL DEFAULT 1,
        updated_at TEXT NOT NULL,
        PRIMARY KEY (host, device_name)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS disk_io_stats (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        host TEXT NOT NULL,
        device_name TEXT NOT NULL,
        scan_timestamp TEXT NOT NULL,
        read_ops REAL,
        write_ops REAL,
        read_bandwidth_bytes REAL,
        write_bandwidth_bytes REAL
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_disk_io_stats_host_device_ts ON disk_io_stats(host, device_name, scan_timestamp)",
    r#"CREATE TABLE IF NOT EXISTS pool_io_stats (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        host TEXT NOT NULL,
        pool TEXT NOT NULL,
        scan_timestamp TEXT NOT NULL,
        read_ops REAL,
        write_ops REAL,
        read_bandwidth_bytes REAL,
        write_bandwidth_bytes REAL,
        total_wait_ms REAL,
        disk_wait_ms REAL,
        syncq_wait_ms REAL,
        asyncq_wait_ms REAL,
        scrub_wait_ms REAL,
        trim_wait_ms REAL,
        pool_type TEXT
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_pool_io_stats_host_pool_ts ON pool_io_stats(host, pool, scan_timestamp)",
    r#"CREATE TABLE IF NOT EXISTS arc_stats (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        host TEXT NOT NULL,
        scan_timestamp TEXT NOT NULL,
        size_bytes REAL,
        target_size_bytes REAL,
        min_size_bytes REAL,
        max_size_bytes REAL,
        mru_size_bytes REAL,
        mfu_size_bytes REAL,
        data_size_bytes REAL,
        meta_size_bytes REAL,
        hits INTEGER,
        misses INTEGER,
        demand_data_hits INTEGER,
        demand_data_misses INTEGER,
        prefetch_hits INTEGER,
        prefetch_misses INTEGER,
        hit_ratio_pct REAL,
        l2_hits INTEGER,
        l2_misses INTEGER,
        l2_size_bytes REAL
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_arc_stats_host_ts ON arc_stats(host, scan_timestamp)",
    r#"CREATE TABLE IF NOT EXISTS cpu_stats (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        host TEXT NOT NULL,
        scan_timestamp TEXT NOT NULL,
        utilization_pct REAL,
        load_avg_1 REAL,
        load_avg_5 REAL,
        load_avg_15 REAL,
        context_switches_per_sec REAL,
        interrupts_per_sec REAL,
        syscalls_per_sec REAL,
        processes_running INTEGER,
        processes_blocked INTEGER,
        cpu_count INTEGER,
        per_core TEXT
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_cpu_stats_host_ts ON cpu_stats(host, scan_timestamp)",
    r#"CREATE TABLE IF NOT EXISTS memory_stats (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        host TEXT NOT NULL,
        scan_timestamp TEXT NOT NULL,
        total_bytes REAL,
        used_bytes REAL,
        free_bytes REAL,
        utilization_pct REAL,
        swap_total_bytes REAL,
        swap_used_bytes REAL,
        page_in_per_sec REAL,
        page_out_per_sec REAL,
        page_fault_per_sec REAL
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_memory_stats_host_ts ON memory_stats(host, scan_timestamp)",
    r#"CREATE TABLE IF NOT EXISTS pci_device (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        host TEXT NOT NULL,
        pci_address TEXT NOT NULL,
        scan_timestamp TEXT NOT NULL,
        vendor_id TEXT NOT NULL,
        vendor_name TEXT,
        device_id TEXT NOT NULL,
        device_name TEXT,
        driver_name TEXT,
        driver_instance INTEGER,
        driver_attached INTEGER NOT NULL DEFAULT 0,
        device_category TEXT NOT NULL,
        ppt_enabled INTEGER NOT NULL DEFAULT 0,
        ppt_capable INTEGER NOT NULL DEFAULT 0,
        assigned_to_zones TEXT NOT NULL DEFAULT '[]',
        linked_network_interface TEXT,
        linked_disk TEXT
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_pci_device_host_addr_ts ON pci_device(host, pci_address, scan_timestamp)",
    r#"CREATE TABLE IF NOT EXISTS task (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        zone_name TEXT,
        operation TEXT NOT NULL,
        priority INTEGER NOT NULL DEFAULT 0,
        status TEXT NOT NULL,
        created_by TEXT,
        metadata TEXT NOT NULL DEFAULT '{}',
        result TEXT,
        error TEXT,
        created_at TEXT NOT NULL,
        started_at TEXT,
        completed_at TEXT
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_task_status_priority ON task(status, priority, id)",
    "CREATE INDEX IF NOT EXISTS idx_task_zone_name ON task(zone_name)",
    r#"CREATE TABLE IF NOT EXISTS session (
        id TEXT PRIMARY KEY,
        kind TEXT NOT NULL,
        zone_name TEXT,
        status TEXT NOT NULL,
        pid INTEGER,
        port INTEGER,
        created_at TEXT NOT NULL,
        last_seen TEXT NOT NULL
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_session_status ON session(status)",
    r#"CREATE TABLE IF NOT EXISTS api_key (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        key_hash TEXT NOT NULL UNIQUE,
        label TEXT,
        created_at TEXT NOT NULL,
        last_used_at TEXT
    )"#,
];

/// Applies every `CREATE TABLE`/`CREATE INDEX` statement. Safe to call on
/// every startup; statements are all `IF NOT EXISTS`.
pub async fn migrate(pool: &SqlitePool) -> Result<(), PersistError> {
    for statement in STATEMENTS {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}

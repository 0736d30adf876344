#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

/// Releases unused memory back to the operating system after the collector
/// fleet's allocation-heavy startup pass.
#[cfg(not(target_env = "msvc"))]
fn release_memory_to_os() {
    unsafe {
        tikv_jemalloc_sys::mallctl(c"arena.4096.purge".as_ptr().cast(), std::ptr::null_mut(), std::ptr::null_mut(), std::ptr::null_mut(), 0);
    }
}

#[cfg(target_env = "msvc")]
fn release_memory_to_os() {}

mod api;
mod apierror;
mod auth;
mod console;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::post;
use axum::Router;
use clap::Parser;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

use omnihost_core::cleanup::CleanupService;
use omnihost_core::collector::CollectorContext;
use omnihost_core::config::Config;
use omnihost_core::console::ConsoleBridge;
use omnihost_core::host_state::HostState;
use omnihost_core::model::HostInfo;
use omnihost_core::runner::{run_safe, CommandSpec};
use omnihost_core::scheduler::Scheduler;
use omnihost_core::storage;
use omnihost_core::taskqueue::TaskQueue;

use crate::state::AppState;

#[derive(Parser)]
#[command(name = "omnihostd", about = "control-plane daemon for illumos/OmniOS hypervisor hosts", version = omnihost_core::VERSION)]
struct Args {
    /// Path to the YAML configuration file.
    #[arg(long, env = "OMNIHOSTD_CONFIG", default_value = "/etc/omnihostd/omnihostd.yaml")]
    config: PathBuf,

    /// Interactive shell spawned for `/term` sessions.
    #[arg(long, env = "OMNIHOSTD_SHELL", default_value = "/bin/bash")]
    shell: String,

    /// Host identity to record and monitor. Defaults to the output of `hostname`.
    #[arg(long, env = "OMNIHOSTD_HOST")]
    host: Option<String>,
}

fn main() {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let args = Args::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build().expect("failed to build tokio runtime");
    runtime.block_on(async_main(args));
    release_memory_to_os();
}

async fn async_main(args: Args) {
    let config = match Config::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, path = ?args.config, "failed to load configuration");
            std::process::exit(1);
        }
    };

    let pool = match storage::open(&config.database.path).await {
        Ok(p) => p,
        Err(e) => {
            error!(error = %e, path = %config.database.path, "failed to open database");
            std::process::exit(1);
        }
    };

    let host_name = args.host.unwrap_or_else(default_host_name);
    let host_state = HostState::new(config.host_monitoring.error_handling.reset_error_count_after, config.host_monitoring.error_handling.max_consecutive_errors);

    let uname = tokio::task::spawn_blocking(move || collect_uname(&host_name)).await.expect("uname collection panicked");

    let ctx = CollectorContext::new(pool.clone(), uname.host.clone(), host_state.clone(), config.host_monitoring.performance.batch_size);
    let scheduler = Arc::new(Scheduler::new(ctx, config.host_monitoring.intervals.to_interval_config()));
    if let Err(e) = scheduler.init(uname.clone(), true).await {
        error!(error = %e, "scheduler init failed");
        std::process::exit(1);
    }
    scheduler.start().await;

    CleanupService::new(pool.clone(), config.host_monitoring.retention.to_retention_config()).spawn();

    let task_queue = TaskQueue::new(pool.clone(), config.host_monitoring.performance.to_task_queue_config());
    if let Err(e) = task_queue.cancel_stale_at_startup().await {
        warn!(error = %e, "failed to cancel stale tasks from a previous process");
    }
    task_queue.spawn();

    let console = ConsoleBridge::new(pool.clone());

    let state = AppState {
        pool: pool.clone(),
        host: Arc::from(uname.host.as_str()),
        host_state,
        scheduler,
        console,
        command_timeout: Duration::from_secs(config.host_monitoring.performance.command_timeout),
        shell: Arc::from(args.shell.as_str()),
    };

    let bootstrap_app = Router::new().route("/auth/bootstrap", post(auth::bootstrap)).with_state(pool.clone());
    let mut app = api::router(state.clone()).merge(console::router(state.clone())).merge(bootstrap_app);

    app = app.layer(axum::middleware::from_fn_with_state(pool.clone(), auth::api_key_middleware));

    if config.cors.permissive {
        app = app.layer(CorsLayer::permissive());
    }
    app = app.layer(CompressionLayer::new());

    let addr: SocketAddr = config.server.listen.parse().expect("invalid listen address");
    info!(version = omnihost_core::VERSION, %addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr).await.expect("failed to bind");
    axum::serve(listener, app).await.expect("server error");
}

fn default_host_name() -> String {
    run_safe(&CommandSpec::new("hostname", &[])).map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).unwrap_or_else(|| "localhost".to_string())
}

/// Shells out to `uname` to populate the singleton host record. Matches the
/// Command Runner's degrade-silently philosophy: a missing field just stays
/// empty rather than aborting startup.
fn collect_uname(host: &str) -> HostInfo {
    let mut info = HostInfo::new(host);
    info.hostname = run_safe(&CommandSpec::new("uname", &["-n"])).map(|s| s.trim().to_string()).unwrap_or_default();
    info.platform = run_safe(&CommandSpec::new("uname", &["-s"])).map(|s| s.trim().to_string()).unwrap_or_default();
    info.release = run_safe(&CommandSpec::new("uname", &["-r"])).map(|s| s.trim().to_string()).unwrap_or_default();
    info.arch = run_safe(&CommandSpec::new("uname", &["-p"])).map(|s| s.trim().to_string()).unwrap_or_default();
    info
}

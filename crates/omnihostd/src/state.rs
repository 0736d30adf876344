//! Shared application state handed to every axum handler, matching the
//! teacher's single `SharedState` passed to `.with_state(...)`.

use std::sync::Arc;
use std::time::Duration;

use omnihost_core::console::ConsoleBridge;
use omnihost_core::host_state::HostState;
use omnihost_core::scheduler::Scheduler;
use sqlx::SqlitePool;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub host: Arc<str>,
    pub host_state: HostState,
    pub scheduler: Arc<Scheduler>,
    pub console: ConsoleBridge,
    pub command_timeout: Duration,
    pub shell: Arc<str>,
}

//! Scheduler lifecycle control, outside the Query API proper.

use axum::extract::State;
use axum::response::Json;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct AdminAck {
    ok: bool,
}

#[utoipa::path(post, path = "/admin/scheduler/start", responses((status = 200, body = AdminAck)))]
pub async fn start(State(state): State<AppState>) -> Json<AdminAck> {
    state.scheduler.start().await;
    Json(AdminAck { ok: true })
}

#[utoipa::path(post, path = "/admin/scheduler/stop", responses((status = 200, body = AdminAck)))]
pub async fn stop(State(state): State<AppState>) -> Json<AdminAck> {
    state.scheduler.stop().await;
    Json(AdminAck { ok: true })
}

#[utoipa::path(post, path = "/admin/scheduler/restart", responses((status = 200, body = AdminAck)))]
pub async fn restart(State(state): State<AppState>) -> Json<AdminAck> {
    state.scheduler.restart().await;
    Json(AdminAck { ok: true })
}

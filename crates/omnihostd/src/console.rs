//! Console Bridge WebSocket endpoints (§4.8): `/term`, `/zlogin`, and the
//! VNC websockify tunnel, all sharing the one [`omnihost_core::console::ConsoleBridge`]
//! connection tracker. PTY backends are shelled out through `/usr/bin/script`
//! rather than a PTY crate — see [`run_pty_bridge`].

use std::process::Stdio;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tracing::warn;
use uuid::Uuid;

use omnihost_core::console::{resolve_session, resolve_websockify_fallback, BridgeTarget};
use omnihost_core::model::{Session, SessionKind};
use omnihost_core::storage::session_repo;

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/term/{id}", get(term))
        .route("/zlogin/{id}", get(zlogin))
        .route("/zones/{zone}/vnc/websockify", get(zone_vnc))
        .route("/websockify", get(websockify_fallback))
        .with_state(state)
}

async fn term(ws: WebSocketUpgrade, State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    bridge_pty(ws, state, BridgeTarget::Terminal(id)).await
}

async fn zlogin(ws: WebSocketUpgrade, State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    bridge_pty(ws, state, BridgeTarget::Zlogin(id)).await
}

async fn bridge_pty(ws: WebSocketUpgrade, state: AppState, target: BridgeTarget) -> Response {
    let session = match resolve_session(&state.pool, &target).await {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "console bridge: refusing pty upgrade");
            return StatusCode::NOT_FOUND.into_response();
        }
    };

    ws.on_upgrade(move |socket| run_pty_bridge(socket, state, session))
}

/// Relays a single client over `/usr/bin/script`, which gives the spawned
/// shell or `zlogin` a pty without depending on a platform pty crate.
async fn run_pty_bridge(socket: WebSocket, state: AppState, session: Session) {
    let zone_for_tracking = session.zone_name.clone().unwrap_or_else(|| format!("host:{}", session.id));
    let connection_id = Uuid::new_v4();

    let mut cmd = Command::new("/usr/bin/script");
    cmd.arg("-q").arg("/dev/null");
    match session.kind {
        SessionKind::Zlogin => {
            cmd.arg("zlogin").arg(session.zone_name.as_deref().unwrap_or_default());
        }
        _ => {
            cmd.arg(state.shell.as_ref());
        }
    }
    cmd.stdin(Stdio::piped()).stdout(Stdio::piped()).stderr(Stdio::null());

    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "console bridge: failed to spawn pty backend");
            return;
        }
    };
    let mut child_stdin = child.stdin.take().expect("stdin was piped");
    let mut child_stdout = child.stdout.take().expect("stdout was piped");

    let (mut ws_sink, mut ws_stream) = socket.split();

    let output_task = async move {
        let mut buf = [0u8; 4096];
        loop {
            match child_stdout.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    if ws_sink.send(Message::Binary(buf[..n].to_vec().into())).await.is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    };

    let input_task = async move {
        while let Some(Ok(msg)) = ws_stream.next().await {
            match msg {
                Message::Binary(b) => {
                    if child_stdin.write_all(&b).await.is_err() {
                        break;
                    }
                }
                Message::Text(t) => {
                    if child_stdin.write_all(t.as_bytes()).await.is_err() {
                        break;
                    }
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    };

    state.console.register(&zone_for_tracking, connection_id);
    tokio::select! {
        _ = output_task => {}
        _ = input_task => {}
    }
    let _ = child.kill().await;
    state.console.deregister(&zone_for_tracking, connection_id);
}

async fn zone_vnc(ws: WebSocketUpgrade, State(state): State<AppState>, Path(zone): Path<String>) -> Response {
    let sessions = match session_repo::active_for_zone(&state.pool, &zone, SessionKind::Vnc).await {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, %zone, "console bridge: failed to look up VNC session");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    let Some(session) = sessions.into_iter().next() else {
        return StatusCode::NOT_FOUND.into_response();
    };
    bridge_vnc(ws, state, session).await
}

async fn websockify_fallback(ws: WebSocketUpgrade, State(state): State<AppState>, headers: HeaderMap) -> Response {
    let referer = headers.get(header::REFERER).and_then(|v| v.to_str().ok());
    let session = match resolve_websockify_fallback(&state.pool, referer, zone_from_referer).await {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "console bridge: could not resolve websockify fallback");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };
    bridge_vnc(ws, state, session).await
}

/// Pulls `{zone}` out of a `Referer` header containing a `/zones/{zone}/vnc` fragment.
fn zone_from_referer(referer: &str) -> Option<String> {
    let rest = referer.split("/zones/").nth(1)?;
    let zone = rest.split('/').next()?;
    (!zone.is_empty()).then(|| zone.to_string())
}

async fn bridge_vnc(ws: WebSocketUpgrade, state: AppState, session: Session) -> Response {
    let Some(port) = session.port else {
        warn!(session_id = %session.id, "console bridge: VNC session has no recorded port");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };
    let zone = session.zone_name.clone().unwrap_or_else(|| format!("session:{}", session.id));

    ws.protocols(["binary"]).on_upgrade(move |socket| run_vnc_bridge(socket, state, zone, port))
}

/// Tunnels binary frames between the client and a local websockify backend
/// at `ws://127.0.0.1:{port}/websockify`, forwarding until either side closes.
async fn run_vnc_bridge(socket: WebSocket, state: AppState, zone: String, port: i64) {
    let connection_id = Uuid::new_v4();
    state.console.register(&zone, connection_id);

    let url = format!("ws://127.0.0.1:{port}/websockify");
    match tokio_tungstenite::connect_async(&url).await {
        Ok((backend, _response)) => {
            let (mut client_sink, mut client_stream) = socket.split();
            let (mut backend_sink, mut backend_stream) = backend.split();

            let client_to_backend = async {
                while let Some(Ok(msg)) = client_stream.next().await {
                    let forward = match msg {
                        Message::Binary(b) => tokio_tungstenite::tungstenite::Message::Binary(b.to_vec().into()),
                        Message::Close(_) => break,
                        _ => continue,
                    };
                    if backend_sink.send(forward).await.is_err() {
                        break;
                    }
                }
            };
            let backend_to_client = async {
                while let Some(Ok(msg)) = backend_stream.next().await {
                    let forward = match msg {
                        tokio_tungstenite::tungstenite::Message::Binary(b) => Message::Binary(b.to_vec().into()),
                        tokio_tungstenite::tungstenite::Message::Close(_) => break,
                        _ => continue,
                    };
                    if client_sink.send(forward).await.is_err() {
                        break;
                    }
                }
            };
            tokio::select! {
                _ = client_to_backend => {}
                _ = backend_to_client => {}
            }
        }
        Err(e) => warn!(error = %e, %url, "console bridge: failed to dial VNC backend"),
    }

    state.console.deregister(&zone, connection_id);
}

//! Console Bridge: connection tracking and smart-cleanup for interactive
//! terminal/zlogin/VNC sessions (§4.8). The actual WebSocket framing and
//! subprocess PTY plumbing live in the daemon crate; this module owns the
//! bookkeeping every bridge endpoint shares: "who is attached to this zone
//! right now" and "when the last client leaves, how long before we tear the
//! backend down".

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, info};
use uuid::Uuid;

use crate::model::{Session, SessionKind, SessionStatus};
use crate::storage::session_repo;

/// Grace period a backend is kept alive after its last client disconnects,
/// in case the same client reconnects (a page reload, a flaky network).
const CLEANUP_GRACE_PERIOD: Duration = Duration::from_secs(10);

struct Inner {
    /// zone name -> connection ids currently attached to its backend.
    connections: HashMap<String, HashSet<Uuid>>,
    /// zone name -> generation counter, bumped every time the set becomes
    /// non-empty again. A pending cleanup task reads its captured generation
    /// back after the grace period and no-ops if it no longer matches,
    /// which is how a reconnect aborts an in-flight cleanup.
    generation: HashMap<String, u64>,
}

/// Shared, cloneable handle (matches [`crate::host_state::HostState`]'s
/// `Arc<Mutex<...>>` singleton-state idiom).
#[derive(Clone)]
pub struct ConsoleBridge {
    inner: Arc<Mutex<Inner>>,
    pool: sqlx::SqlitePool,
}

impl ConsoleBridge {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                connections: HashMap::new(),
                generation: HashMap::new(),
            })),
            pool,
        }
    }

    /// Registers a newly attached client connection for a zone's backend.
    /// Bumps the zone's generation, aborting any cleanup scheduled by a
    /// previous disconnect.
    pub fn register(&self, zone: &str, connection_id: Uuid) {
        let mut inner = self.inner.lock().unwrap();
        inner.connections.entry(zone.to_string()).or_default().insert(connection_id);
        *inner.generation.entry(zone.to_string()).or_insert(0) += 1;
        debug!(zone, %connection_id, "console bridge: connection registered");
    }

    /// Removes a client connection. If it was the last one for this zone,
    /// spawns a smart-cleanup task that tears the backend down after the
    /// grace period unless a reconnect bumps the generation first.
    pub fn deregister(&self, zone: &str, connection_id: Uuid) {
        let (now_empty, generation) = {
            let mut inner = self.inner.lock().unwrap();
            if let Some(set) = inner.connections.get_mut(zone) {
                set.remove(&connection_id);
                if set.is_empty() {
                    inner.connections.remove(zone);
                }
            }
            let now_empty = !inner.connections.contains_key(zone);
            (now_empty, *inner.generation.get(zone).unwrap_or(&0))
        };
        debug!(zone, %connection_id, "console bridge: connection deregistered");

        if now_empty {
            self.spawn_smart_cleanup(zone.to_string(), generation);
        }
    }

    /// Returns true if at least one client is currently attached to `zone`'s
    /// backend (used to enforce at-most-one-active-VNC-backend-per-zone).
    pub fn has_connections(&self, zone: &str) -> bool {
        self.inner.lock().unwrap().connections.get(zone).is_some_and(|s| !s.is_empty())
    }

    fn spawn_smart_cleanup(&self, zone: String, captured_generation: u64) {
        let bridge = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(CLEANUP_GRACE_PERIOD).await;

            let current_generation = {
                let inner = bridge.inner.lock().unwrap();
                if inner.connections.contains_key(&zone) {
                    // A client reconnected during the grace window; abort.
                    return;
                }
                *inner.generation.get(&zone).unwrap_or(&0)
            };
            if current_generation != captured_generation {
                debug!(zone = %zone, "console bridge: cleanup aborted, zone reconnected during grace period");
                return;
            }

            match session_repo::active_for_zone(&bridge.pool, &zone, SessionKind::Vnc).await {
                Ok(sessions) => {
                    for session in sessions {
                        if session_repo::set_status(&bridge.pool, session.id, SessionStatus::Closed).await.is_ok() {
                            info!(zone = %zone, session_id = %session.id, "console bridge: backend closed after grace period");
                        }
                    }
                }
                Err(e) => tracing::warn!(zone = %zone, error = %e, "console bridge: failed to look up sessions for cleanup"),
            }
        });
    }
}

/// Resolves a WebSocket upgrade path to the backend it should tunnel to,
/// per the dispatch rules in §4.8. Handlers call this to validate a session
/// before upgrading; the actual tunneling lives in the daemon crate.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeTarget {
    /// `/term/{uuid}`: a host-level terminal pty, session must be `active`.
    Terminal(Uuid),
    /// `/zlogin/{uuid}`: an in-zone pty, accepts `active` or `connecting`
    /// (the client that opened the session is itself the first connection).
    Zlogin(Uuid),
    /// `/zones/{zone}/vnc/websockify`: tunnels to a local VNC websockify
    /// backend on the session's recorded port.
    ZoneVnc(String),
}

/// Error resolving or authorizing a console bridge path.
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeError {
    pub message: String,
}

impl BridgeError {
    fn new(msg: impl Into<String>) -> Self {
        Self { message: msg.into() }
    }
}

impl std::fmt::Display for BridgeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "console bridge: {}", self.message)
    }
}

impl std::error::Error for BridgeError {}

/// Looks up and authorizes the session behind a `/term/{uuid}` or
/// `/zlogin/{uuid}` upgrade, enforcing the status rule for that path.
pub async fn resolve_session(pool: &sqlx::SqlitePool, target: &BridgeTarget) -> Result<Session, BridgeError> {
    let id = match target {
        BridgeTarget::Terminal(id) | BridgeTarget::Zlogin(id) => *id,
        BridgeTarget::ZoneVnc(_) => return Err(BridgeError::new("resolve_session does not handle VNC targets")),
    };

    let session = session_repo::get(pool, id).await.map_err(|e| BridgeError::new(e.to_string()))?.ok_or_else(|| BridgeError::new("no such session"))?;

    let allowed = match target {
        BridgeTarget::Terminal(_) => session.status == SessionStatus::Active,
        BridgeTarget::Zlogin(_) => matches!(session.status, SessionStatus::Active | SessionStatus::Connecting),
        BridgeTarget::ZoneVnc(_) => unreachable!(),
    };
    if !allowed {
        return Err(BridgeError::new(format!("session {id} is not in a connectable state ({:?})", session.status)));
    }
    Ok(session)
}

/// Resolves the bare `/websockify` fallback path: if a `Referer` header
/// names a zone's VNC console page, use that zone's active session;
/// otherwise fall back to the single live VNC session, if there is exactly
/// one. Ambiguous (zero or multiple live sessions, no usable referer) is an
/// error — the caller has no path-embedded zone to disambiguate with.
pub async fn resolve_websockify_fallback(pool: &sqlx::SqlitePool, referer: Option<&str>, zone_from_referer: impl Fn(&str) -> Option<String>) -> Result<Session, BridgeError> {
    if let Some(zone) = referer.and_then(&zone_from_referer) {
        let sessions = session_repo::active_for_zone(pool, &zone, SessionKind::Vnc).await.map_err(|e| BridgeError::new(e.to_string()))?;
        if let Some(session) = sessions.into_iter().next() {
            return Ok(session);
        }
    }

    let all_active = sqlx::query_as::<_, (String,)>("SELECT id FROM session WHERE kind = 'vnc' AND status = 'active'")
        .fetch_all(pool)
        .await
        .map_err(|e| BridgeError::new(e.to_string()))?;

    match all_active.len() {
        1 => {
            let id = Uuid::parse_str(&all_active[0].0).map_err(|e| BridgeError::new(e.to_string()))?;
            session_repo::get(pool, id).await.map_err(|e| BridgeError::new(e.to_string()))?.ok_or_else(|| BridgeError::new("no such session"))
        }
        0 => Err(BridgeError::new("no live VNC session to fall back to")),
        _ => Err(BridgeError::new("multiple live VNC sessions, cannot disambiguate without a referer")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_then_deregister_all_clears_zone() {
        let bridge = ConsoleBridge::new(dummy_pool());
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        bridge.register("web0", a);
        bridge.register("web0", b);
        assert!(bridge.has_connections("web0"));

        bridge.deregister("web0", a);
        assert!(bridge.has_connections("web0"), "one connection remains");

        bridge.deregister("web0", b);
        assert!(!bridge.has_connections("web0"));
    }

    #[test]
    fn reconnect_bumps_generation_past_a_stale_cleanup() {
        let bridge = ConsoleBridge::new(dummy_pool());
        let a = Uuid::new_v4();
        bridge.register("web0", a);
        bridge.deregister("web0", a);

        let captured = bridge.inner.lock().unwrap().generation.get("web0").copied().unwrap_or(0);
        bridge.register("web0", Uuid::new_v4());
        let current = bridge.inner.lock().unwrap().generation.get("web0").copied().unwrap_or(0);
        assert_ne!(captured, current, "reconnect must advance the generation a pending cleanup reads back");
    }

    fn dummy_pool() -> sqlx::SqlitePool {
        // Tests in this module only exercise the in-memory connection map,
        // never the pool, so a lazily-connecting pool is fine here.
        sqlx::sqlite::SqlitePoolOptions::new().connect_lazy("sqlite::memory:").expect("lazy pool construction never fails")
    }
}

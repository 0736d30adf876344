//! Persistence for console sessions (terminal/zlogin pty, VNC websockify).

use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::error::PersistError;
use crate::model::{Session, SessionKind, SessionStatus};

pub async fn insert(pool: &SqlitePool, session: &Session) -> Result<(), PersistError> {
    sqlx::query(
        "INSERT INTO session (id, kind, zone_name, status, pid, port, created_at, last_seen)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(session.id.to_string())
    .bind(kind_str(session.kind))
    .bind(&session.zone_name)
    .bind(session.status.as_str())
    .bind(session.pid)
    .bind(session.port)
    .bind(session.created_at.to_rfc3339())
    .bind(session.last_seen.to_rfc3339())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get(pool: &SqlitePool, id: Uuid) -> Result<Option<Session>, PersistError> {
    let row = sqlx::query("SELECT * FROM session WHERE id = ?").bind(id.to_string()).fetch_optional(pool).await?;
    Ok(row.map(|r| row_to_session(&r)))
}

pub async fn touch(pool: &SqlitePool, id: Uuid) -> Result<(), PersistError> {
    sqlx::query("UPDATE session SET last_seen = ? WHERE id = ?")
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(id.to_string())
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn set_status(pool: &SqlitePool, id: Uuid, status: SessionStatus) -> Result<(), PersistError> {
    sqlx::query("UPDATE session SET status = ?, last_seen = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(id.to_string())
        .execute(pool)
        .await?;
    Ok(())
}

/// Active sessions for a zone+kind, used to enforce "at most one active
/// session per zone per session-type" (§3 invariants).
pub async fn active_for_zone(pool: &SqlitePool, zone_name: &str, kind: SessionKind) -> Result<Vec<Session>, PersistError> {
    let rows = sqlx::query("SELECT * FROM session WHERE zone_name = ? AND kind = ? AND status != 'closed'")
        .bind(zone_name)
        .bind(kind_str(kind))
        .fetch_all(pool)
        .await?;
    Ok(rows.iter().map(row_to_session).collect())
}

/// Closes every session whose `last_seen` predates `idle_for` — run by the
/// Cleanup Service and by the Console Bridge's smart-cleanup grace period.
pub async fn close_inactive(pool: &SqlitePool, idle_for: chrono::Duration) -> Result<u64, PersistError> {
    let cutoff = chrono::Utc::now() - idle_for;
    let result = sqlx::query("UPDATE session SET status = 'closed' WHERE status != 'closed' AND last_seen < ?")
        .bind(cutoff.to_rfc3339())
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

fn kind_str(k: SessionKind) -> &'static str {
    match k {
        SessionKind::Terminal => "terminal",
        SessionKind::Zlogin => "zlogin",
        SessionKind::Vnc => "vnc",
    }
}

fn kind_parse(s: &str) -> SessionKind {
    match s {
        "zlogin" => SessionKind::Zlogin,
        "vnc" => SessionKind::Vnc,
        _ => SessionKind::Terminal,
    }
}

fn row_to_session(row: &sqlx::sqlite::SqliteRow) -> Session {
    Session {
        id: Uuid::parse_str(&row.get::<String, _>("id")).unwrap_or_else(|_| Uuid::nil()),
        kind: kind_parse(&row.get::<String, _>("kind")),
        zone_name: row.get("zone_name"),
        status: SessionStatus::parse(&row.get::<String, _>("status")).unwrap_or(SessionStatus::Closed),
        pid: row.get("pid"),
        port: row.get("port"),
        created_at: chrono::DateTime::parse_from_rfc3339(&row.get::<String, _>("created_at")).unwrap().with_timezone(&chrono::Utc),
        last_seen: chrono::DateTime::parse_from_rfc3339(&row.get::<String, _>("last_seen")).unwrap().with_timezone(&chrono::Utc),
    }
}

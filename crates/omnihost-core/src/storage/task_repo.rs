//! Persistence for the task queue: priority+FIFO claiming, zone-level
//! serialization, and crash-safe pending/running reset at startup.

use sqlx::{Row, SqlitePool};

use crate::error::PersistError;
use crate::model::{NewTask, Task, TaskStatus};

pub async fn enqueue(pool: &SqlitePool, task: &NewTask) -> Result<Task, PersistError> {
    let now = chrono::Utc::now();
    let id = sqlx::query(
        "INSERT INTO task (zone_name, operation, priority, status, created_by, metadata, created_at)
         VALUES (?, ?, ?, 'pending', ?, ?, ?)",
    )
    .bind(&task.zone_name)
    .bind(&task.operation)
    .bind(task.priority)
    .bind(&task.created_by)
    .bind(task.metadata.to_string())
    .bind(now.to_rfc3339())
    .execute(pool)
    .await?
    .last_insert_rowid();

    Ok(Task {
        id,
        zone_name: task.zone_name.clone(),
        operation: task.operation.clone(),
        priority: task.priority,
        status: TaskStatus::Pending,
        created_by: task.created_by.clone(),
        metadata: task.metadata.clone(),
        result: None,
        error: None,
        created_at: now,
        started_at: None,
        completed_at: None,
    })
}

/// Claims the highest-priority, oldest pending task whose zone (if any) has
/// no other task currently `running`, marking it `running` in the same
/// transaction to avoid a race between two worker ticks.
pub async fn claim_next_pending(pool: &SqlitePool) -> Result<Option<Task>, PersistError> {
    let mut tx = pool.begin().await?;

    let row = sqlx::query(
        "SELECT * FROM task
         WHERE status = 'pending'
           AND (zone_name IS NULL OR zone_name NOT IN (
               SELECT zone_name FROM task WHERE status = 'running' AND zone_name IS NOT NULL
           ))
         ORDER BY priority DESC, id ASC
         LIMIT 1",
    )
    .fetch_optional(&mut *tx)
    .await?;

    let Some(row) = row else {
        tx.commit().await?;
        return Ok(None);
    };

    let id: i64 = row.get("id");
    let started_at = chrono::Utc::now();
    sqlx::query("UPDATE task SET status = 'running', started_at = ? WHERE id = ?")
        .bind(started_at.to_rfc3339())
        .bind(id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    let mut task = row_to_task(&row);
    task.status = TaskStatus::Running;
    task.started_at = Some(started_at);
    Ok(Some(task))
}

pub async fn mark_completed(pool: &SqlitePool, id: i64, result: serde_json::Value) -> Result<(), PersistError> {
    sqlx::query("UPDATE task SET status = 'completed', result = ?, completed_at = ? WHERE id = ?")
        .bind(result.to_string())
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn mark_failed(pool: &SqlitePool, id: i64, error: &str) -> Result<(), PersistError> {
    sqlx::query("UPDATE task SET status = 'failed', error = ?, completed_at = ? WHERE id = ?")
        .bind(error)
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Run once at startup: any task stuck `pending`/`running` from a prior
/// process is cancelled rather than silently resumed (§4.6 crash-safety).
pub async fn cancel_stale_at_startup(pool: &SqlitePool) -> Result<u64, PersistError> {
    let result = sqlx::query(
        "UPDATE task SET status = 'cancelled', error = 'cancelled at startup: process restarted', completed_at = ?
         WHERE status IN ('pending', 'running')",
    )
    .bind(chrono::Utc::now().to_rfc3339())
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

pub async fn get(pool: &SqlitePool, id: i64) -> Result<Option<Task>, PersistError> {
    let row = sqlx::query("SELECT * FROM task WHERE id = ?").bind(id).fetch_optional(pool).await?;
    Ok(row.map(|r| row_to_task(&r)))
}

pub async fn list(pool: &SqlitePool, zone_name: Option<&str>, status: Option<TaskStatus>, limit: i64, offset: i64) -> Result<Vec<Task>, PersistError> {
    let mut qb: sqlx::QueryBuilder<sqlx::Sqlite> = sqlx::QueryBuilder::new("SELECT * FROM task WHERE 1 = 1");
    if let Some(z) = zone_name {
        qb.push(" AND zone_name = ").push_bind(z.to_string());
    }
    if let Some(s) = status {
        qb.push(" AND status = ").push_bind(s.as_str().to_string());
    }
    qb.push(" ORDER BY id DESC LIMIT ").push_bind(limit).push(" OFFSET ").push_bind(offset);
    let rows = qb.build().fetch_all(pool).await?;
    Ok(rows.iter().map(row_to_task).collect())
}

/// Purges terminal tasks older than `retention` — registered with the
/// Cleanup Service under the `task` name.
pub async fn purge_terminal(pool: &SqlitePool, retention: chrono::Duration) -> Result<u64, PersistError> {
    let cutoff = chrono::Utc::now() - retention;
    let result = sqlx::query("DELETE FROM task WHERE status IN ('completed', 'failed', 'cancelled') AND completed_at < ?")
        .bind(cutoff.to_rfc3339())
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

fn parse_ts(s: Option<String>) -> Option<chrono::DateTime<chrono::Utc>> {
    s.and_then(|s| chrono::DateTime::parse_from_rfc3339(&s).ok()).map(|d| d.with_timezone(&chrono::Utc))
}

fn row_to_task(row: &sqlx::sqlite::SqliteRow) -> Task {
    Task {
        id: row.get("id"),
        zone_name: row.get("zone_name"),
        operation: row.get("operation"),
        priority: row.get("priority"),
        status: TaskStatus::parse(&row.get::<String, _>("status")).unwrap_or(TaskStatus::Failed),
        created_by: row.get("created_by"),
        metadata: serde_json::from_str(row.get::<String, _>("metadata").as_str()).unwrap_or(serde_json::json!({})),
        result: row.get::<Option<String>, _>("result").and_then(|s| serde_json::from_str(&s).ok()),
        error: row.get("error"),
        created_at: chrono::DateTime::parse_from_rfc3339(&row.get::<String, _>("created_at")).unwrap().with_timezone(&chrono::Utc),
        started_at: parse_ts(row.get("started_at")),
        completed_at: parse_ts(row.get("completed_at")),
    }
}

//! Worker loop: claims the next eligible task, dispatches on `operation`,
//! and writes back terminal status. One worker per daemon process is
//! sufficient — zone-level serialization happens in `claim_next_pending`'s
//! SQL, not via multiple concurrent workers.

use std::time::Duration;

use sqlx::SqlitePool;
use tracing::{debug, error, info, warn};

use crate::error::TaskError;
use crate::model::Task;
use crate::runner::CommandSpec;
use crate::storage::task_repo;

#[derive(Debug, Clone, Copy)]
pub struct TaskQueueConfig {
    pub poll_interval: Duration,
    pub command_timeout: Duration,
}

impl Default for TaskQueueConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            command_timeout: Duration::from_secs(60),
        }
    }
}

pub struct TaskQueue {
    pool: SqlitePool,
    config: TaskQueueConfig,
}

impl TaskQueue {
    pub fn new(pool: SqlitePool, config: TaskQueueConfig) -> Self {
        Self { pool, config }
    }

    /// Cancels any task left `pending`/`running` by a prior process. Must be
    /// called once before `spawn`, at daemon startup.
    pub async fn cancel_stale_at_startup(&self) -> Result<u64, crate::error::PersistError> {
        let cancelled = task_repo::cancel_stale_at_startup(&self.pool).await?;
        if cancelled > 0 {
            warn!(cancelled, "task queue: cancelled stale tasks from a previous process");
        }
        Ok(cancelled)
    }

    /// Installs the poll loop as a background task.
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(self.config.poll_interval);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tick.tick().await;
                if let Err(e) = self.poll_once().await {
                    error!(error = %e, "task queue: poll failed");
                }
            }
        })
    }

    /// Claims and executes at most one task. Exposed directly so tests (and
    /// the poll loop) share the same code path.
    pub async fn poll_once(&self) -> Result<(), crate::error::PersistError> {
        let Some(task) = task_repo::claim_next_pending(&self.pool).await? else {
            return Ok(());
        };

        debug!(id = task.id, operation = %task.operation, zone = ?task.zone_name, "task queue: claimed task");
        let timeout = self.config.command_timeout;
        match dispatch(&task, timeout).await {
            Ok(result) => {
                task_repo::mark_completed(&self.pool, task.id, result).await?;
                info!(id = task.id, operation = %task.operation, "task queue: completed");
            }
            Err(e) => {
                task_repo::mark_failed(&self.pool, task.id, &e.message).await?;
                warn!(id = task.id, operation = %task.operation, error = %e, "task queue: failed");
            }
        }
        Ok(())
    }
}

/// Dispatches a claimed task on its `operation` name. Zone lifecycle verbs
/// shell out to `zoneadm`/`zlogin`; etherstub verbs to `dladm`; anything else
/// is rejected up front so a typo'd operation fails fast instead of silently
/// no-opping.
async fn dispatch(task: &Task, timeout: Duration) -> Result<serde_json::Value, TaskError> {
    let spec = match task.operation.as_str() {
        "zone_boot" | "zone_halt" | "zone_reboot" | "zone_ready" | "zone_shutdown" => {
            let zone = task.zone_name.as_deref().ok_or_else(|| TaskError::new(format!("operation '{}' requires a zone_name", task.operation)))?;
            match task.operation.as_str() {
                "zone_boot" => CommandSpec::new("zoneadm", &["-z", zone, "boot"]),
                "zone_halt" => CommandSpec::new("zoneadm", &["-z", zone, "halt"]),
                "zone_reboot" => CommandSpec::new("zoneadm", &["-z", zone, "reboot"]),
                "zone_ready" => CommandSpec::new("zoneadm", &["-z", zone, "ready"]),
                "zone_shutdown" => CommandSpec::new("zlogin", &["-S", zone, "shutdown", "-y", "-g", "0", "-i", "5"]),
                _ => unreachable!(),
            }
        }
        "etherstub_create" => {
            let name = etherstub_name(task)?;
            CommandSpec::new("dladm", &["create-etherstub", name])
        }
        "etherstub_delete" => {
            let name = etherstub_name(task)?;
            CommandSpec::new("dladm", &["delete-etherstub", name])
        }
        other => return Err(TaskError::new(format!("unknown operation '{other}'"))),
    };

    let output = tokio::task::spawn_blocking(move || crate::runner::run(&spec.with_timeout(timeout)))
        .await
        .map_err(|e| TaskError::new(format!("task execution panicked: {e}")))?;

    if !output.success {
        return Err(TaskError::new(format!("'{}' exited non-zero: {}", task.operation, output.stderr)));
    }

    Ok(serde_json::json!({ "stdout": output.stdout, "duration_ms": output.duration.as_millis() as u64 }))
}

fn etherstub_name(task: &Task) -> Result<&str, TaskError> {
    task.metadata
        .get("name")
        .and_then(|v| v.as_str())
        .ok_or_else(|| TaskError::new(format!("operation '{}' requires metadata.name", task.operation)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NewTask;

    #[tokio::test]
    async fn rejects_operation_without_zone_name() {
        let task = Task {
            id: 1,
            zone_name: None,
            operation: "zone_boot".to_string(),
            priority: 0,
            status: crate::model::TaskStatus::Running,
            created_by: None,
            metadata: serde_json::json!({}),
            result: None,
            error: None,
            created_at: chrono::Utc::now(),
            started_at: None,
            completed_at: None,
        };
        let err = dispatch(&task, Duration::from_secs(5)).await.unwrap_err();
        assert!(err.message.contains("requires a zone_name"));
    }

    #[tokio::test]
    async fn poll_once_is_a_noop_on_empty_queue() {
        let pool = crate::storage::open_in_memory().await.unwrap();
        let queue = TaskQueue::new(pool, TaskQueueConfig::default());
        queue.poll_once().await.unwrap();
    }

    #[tokio::test]
    async fn cancel_stale_at_startup_clears_leftover_running_task() {
        let pool = crate::storage::open_in_memory().await.unwrap();
        let task = task_repo::enqueue(
            &pool,
            &NewTask { zone_name: Some("webapp".into()), operation: "zone_boot".into(), priority: 0, created_by: None, metadata: serde_json::json!({}) },
        )
        .await
        .unwrap();
        sqlx::query("UPDATE task SET status = 'running' WHERE id = ?").bind(task.id).execute(&pool).await.unwrap();

        let queue = TaskQueue::new(pool.clone(), TaskQueueConfig::default());
        let cancelled = queue.cancel_stale_at_startup().await.unwrap();
        assert_eq!(cancelled, 1);

        let refreshed = task_repo::get(&pool, task.id).await.unwrap().unwrap();
        assert_eq!(refreshed.status, crate::model::TaskStatus::Cancelled);
    }
}

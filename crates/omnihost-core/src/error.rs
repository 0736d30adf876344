//! Hand-rolled error types shared across the crate.
//!
//! No `thiserror`/`anyhow`: each subsystem gets a small explicit enum with a
//! manual `Display` impl, the same shape the teacher repo uses for
//! `ParseError`/`CollectError`.

use std::fmt;

/// Failure parsing a single command's textual output.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
}

impl ParseError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "parse error: {}", self.message)
    }
}

impl std::error::Error for ParseError {}

/// Failure executing a subprocess.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandError {
    Timeout { binary: String, timeout_secs: u64 },
    Spawn { binary: String, reason: String },
    NonZeroExit { binary: String, exit: i32, stderr: String },
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Timeout { binary, timeout_secs } => {
                write!(f, "command '{binary}' timed out after {timeout_secs}s")
            }
            CommandError::Spawn { binary, reason } => {
                write!(f, "failed to spawn '{binary}': {reason}")
            }
            CommandError::NonZeroExit { binary, exit, stderr } => {
                write!(f, "'{binary}' exited {exit}: {stderr}")
            }
        }
    }
}

impl std::error::Error for CommandError {}

/// Failure in the persistence layer.
#[derive(Debug)]
pub enum PersistError {
    Database(sqlx::Error),
    Serialize(String),
}

impl fmt::Display for PersistError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistError::Database(e) => write!(f, "database error: {e}"),
            PersistError::Serialize(e) => write!(f, "serialization error: {e}"),
        }
    }
}

impl std::error::Error for PersistError {}

impl From<sqlx::Error> for PersistError {
    fn from(e: sqlx::Error) -> Self {
        PersistError::Database(e)
    }
}

impl From<serde_json::Error> for PersistError {
    fn from(e: serde_json::Error) -> Self {
        PersistError::Serialize(e.to_string())
    }
}

/// Outcome of a single collector pass, returned up to the Scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectOutcome {
    /// Collected and persisted successfully.
    Success,
    /// Ran but failed (command error, parse error, db error); counted against
    /// the collector's consecutive-error counter.
    Failed,
    /// Single-flight latch was held; this invocation was a no-op.
    Busy,
    /// Error threshold reached; the Scheduler should keep the timer but not
    /// expect real work until the counter decays.
    Disabled,
}

/// Failure executing or scheduling a task-queue operation.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskError {
    pub message: String,
}

impl TaskError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
        }
    }
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task error: {}", self.message)
    }
}

impl std::error::Error for TaskError {}

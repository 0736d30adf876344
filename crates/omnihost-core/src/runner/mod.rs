//! Command Runner — bounded-timeout subprocess execution.
//!
//! Every collector and the task executor shell out through here. A command
//! is always given a wall-clock timeout; on expiry the child is killed and
//! `success=false` is reported, but the caller never hangs.

use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

/// Default timeout applied when a caller doesn't specify one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub exit: Option<i32>,
    pub timed_out: bool,
    pub duration: Duration,
}

impl CommandOutput {
    fn timed_out(binary: &str, timeout: Duration) -> Self {
        warn!(binary, timeout_secs = timeout.as_secs(), "command timed out");
        Self {
            success: false,
            stdout: String::new(),
            stderr: format!("'{binary}' timed out after {}s", timeout.as_secs()),
            exit: None,
            timed_out: true,
            duration: timeout,
        }
    }

    fn spawn_failed(binary: &str, reason: &str) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr: format!("failed to spawn '{binary}': {reason}"),
            exit: None,
            timed_out: false,
            duration: Duration::ZERO,
        }
    }
}

/// One command to run, as a thunk so the parallel runner can build the
/// `Command` lazily on its own thread.
pub struct CommandSpec {
    pub binary: String,
    pub args: Vec<String>,
    pub timeout: Duration,
}

impl CommandSpec {
    pub fn new(binary: impl Into<String>, args: &[&str]) -> Self {
        Self {
            binary: binary.into(),
            args: args.iter().map(|s| s.to_string()).collect(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Runs a single command, blocking the calling thread. Callers on an async
/// runtime should wrap this in `tokio::task::spawn_blocking`.
///
/// stdout/stderr are drained on their own threads while the poll loop waits
/// on the child, not after `try_wait` reports exit: a command that writes
/// more than the pipe buffer (illumos probes like `zfs get all` or
/// `prtconf` easily do) would otherwise block on the write and never exit,
/// running out the clock on a healthy command.
pub fn run(spec: &CommandSpec) -> CommandOutput {
    let start = Instant::now();

    let mut child = match Command::new(&spec.binary)
        .args(&spec.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
    {
        Ok(c) => c,
        Err(e) => return CommandOutput::spawn_failed(&spec.binary, &e.to_string()),
    };

    let mut child_stdout = child.stdout.take();
    let mut child_stderr = child.stderr.take();

    std::thread::scope(|scope| {
        let stdout_handle = scope.spawn(move || {
            use std::io::Read;
            let mut buf = String::new();
            if let Some(mut out) = child_stdout.take() {
                let _ = out.read_to_string(&mut buf);
            }
            buf
        });
        let stderr_handle = scope.spawn(move || {
            use std::io::Read;
            let mut buf = String::new();
            if let Some(mut err) = child_stderr.take() {
                let _ = err.read_to_string(&mut buf);
            }
            buf
        });

        // Poll for completion with a short sleep; on timeout, kill and reap.
        let poll_interval = Duration::from_millis(25);
        loop {
            match child.try_wait() {
                Ok(Some(status)) => {
                    let stdout = stdout_handle.join().unwrap_or_default();
                    let stderr = stderr_handle.join().unwrap_or_default();
                    let exit = status.code();
                    let success = status.success();
                    let duration = start.elapsed();
                    debug!(binary = %spec.binary, success, duration_ms = duration.as_millis() as u64, "command completed");
                    return CommandOutput {
                        success,
                        stdout,
                        stderr,
                        exit,
                        timed_out: false,
                        duration,
                    };
                }
                Ok(None) => {
                    if start.elapsed() >= spec.timeout {
                        let _ = child.kill();
                        let _ = child.wait();
                        return CommandOutput::timed_out(&spec.binary, spec.timeout);
                    }
                    std::thread::sleep(poll_interval);
                }
                Err(e) => return CommandOutput::spawn_failed(&spec.binary, &e.to_string()),
            }
        }
    })
}

/// Runs several commands concurrently (one OS thread each), returning
/// results in the same order as `specs`. A failure in one never aborts the
/// others — each slot is independently `Ok`/settled.
pub fn run_parallel(specs: &[CommandSpec]) -> Vec<CommandOutput> {
    std::thread::scope(|scope| {
        let handles: Vec<_> = specs.iter().map(|spec| scope.spawn(|| run(spec))).collect();
        handles.into_iter().map(|h| h.join().unwrap_or_else(|_| CommandOutput::spawn_failed("?", "thread panicked"))).collect()
    })
}

/// Runs a command whose absence is non-fatal (e.g. `pptadm` when PPT isn't
/// configured). Logs at debug and returns an empty string instead of
/// propagating the failure.
pub fn run_safe(spec: &CommandSpec) -> Option<String> {
    let out = run(spec);
    if out.success {
        Some(out.stdout)
    } else {
        debug!(binary = %spec.binary, stderr = %out.stderr, "optional command unavailable, degrading silently");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_true_succeeds() {
        let spec = CommandSpec::new("true", &[]);
        let out = run(&spec);
        assert!(out.success);
        assert!(!out.timed_out);
    }

    #[test]
    fn run_false_fails_without_hanging() {
        let spec = CommandSpec::new("false", &[]);
        let out = run(&spec);
        assert!(!out.success);
        assert_eq!(out.exit, Some(1));
    }

    #[test]
    fn run_missing_binary_reports_spawn_failure() {
        let spec = CommandSpec::new("omnihost-does-not-exist-xyz", &[]);
        let out = run(&spec);
        assert!(!out.success);
        assert!(!out.timed_out);
    }

    #[test]
    fn run_times_out_without_hanging() {
        let spec = CommandSpec::new("sleep", &["5"]).with_timeout(Duration::from_millis(100));
        let out = run(&spec);
        assert!(!out.success);
        assert!(out.timed_out);
        assert!(out.duration < Duration::from_secs(5));
    }

    #[test]
    fn run_parallel_preserves_order_and_isolates_failures() {
        let specs = vec![
            CommandSpec::new("true", &[]),
            CommandSpec::new("false", &[]),
            CommandSpec::new("true", &[]),
        ];
        let results = run_parallel(&specs);
        assert_eq!(results.len(), 3);
        assert!(results[0].success);
        assert!(!results[1].success);
        assert!(results[2].success);
    }

    #[test]
    fn run_safe_degrades_silently_on_missing_binary() {
        let spec = CommandSpec::new("omnihost-does-not-exist-xyz", &[]);
        assert_eq!(run_safe(&spec), None);
    }
}

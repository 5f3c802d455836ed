//! # Process-spawn collaborator.
//!
//! The supervisor core does not talk to the OS directly; it goes through the
//! [`Spawner`] seam, which provides the full capability set it needs:
//!
//! - start the configured command with per-stream output redirection,
//! - send it a polite interrupt signal,
//! - forcibly kill it,
//! - retrieve its exit status, distinguishing "exited with code N" from
//!   "killed by signal" from "failed to start".
//!
//! [`CommandSpawner`] is the production implementation over
//! [`tokio::process`]. Tests drive the supervisor loop through the same seam
//! with scripted fakes.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;

use crate::config::ProcessConfig;
use crate::error::ProcessError;

/// How one instance of the wrapped process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    /// Exited on its own with the given code.
    Exited(i32),
    /// Terminated by the given signal.
    Signaled(i32),
}

impl ExitOutcome {
    fn from_status(status: std::process::ExitStatus) -> Self {
        match status.code() {
            Some(code) => ExitOutcome::Exited(code),
            None => {
                #[cfg(unix)]
                {
                    use std::os::unix::process::ExitStatusExt;
                    ExitOutcome::Signaled(status.signal().unwrap_or(libc::SIGKILL))
                }
                #[cfg(not(unix))]
                {
                    ExitOutcome::Signaled(9)
                }
            }
        }
    }
}

/// Handle to one running instance of the wrapped process.
#[async_trait]
pub trait ProcessHandle: Send {
    /// OS process id, while the process is running.
    fn pid(&self) -> Option<u32>;

    /// Waits for the process to end and returns how it ended.
    ///
    /// Cancel safe; may be called again after a kill.
    async fn wait(&mut self) -> Result<ExitOutcome, ProcessError>;

    /// Sends the polite interrupt signal (SIGINT on unix).
    fn interrupt(&mut self);

    /// Forcibly kills the process and reaps it.
    async fn force_kill(&mut self);
}

/// A freshly spawned instance plus its stderr-activity signal.
pub struct SpawnedProcess {
    /// Control handle for the instance.
    pub handle: Box<dyn ProcessHandle>,
    /// Receives the byte count of each observed stderr line, present only
    /// when fail-on-stderr is configured and stderr is not hidden.
    pub stderr_activity: Option<mpsc::Receiver<usize>>,
}

/// Spawns instances of the wrapped command.
#[async_trait]
pub trait Spawner: Send + Sync + 'static {
    /// Starts a new instance of the command.
    async fn spawn(&self) -> Result<SpawnedProcess, ProcessError>;
}

/// Production [`Spawner`] over [`tokio::process::Command`].
///
/// Standard output and error of the child are forwarded line by line to the
/// log (targets `wrapped::stdout` / `wrapped::stderr`) unless hidden by
/// configuration; a hidden stream is discarded at the OS level. Hiding stderr
/// also disables fail-on-stderr detection, since nothing observes the stream.
pub struct CommandSpawner {
    path: PathBuf,
    args: Vec<String>,
    hide_stdout: bool,
    hide_stderr: bool,
    fail_on_stderr: bool,
}

impl CommandSpawner {
    /// Creates a spawner for the configured command.
    pub fn new(config: &ProcessConfig) -> Self {
        Self {
            path: config.path.clone(),
            args: config.args.clone(),
            hide_stdout: config.hide_stdout,
            hide_stderr: config.hide_stderr,
            fail_on_stderr: config.fail_on_stderr,
        }
    }
}

#[async_trait]
impl Spawner for CommandSpawner {
    async fn spawn(&self) -> Result<SpawnedProcess, ProcessError> {
        let mut cmd = Command::new(&self.path);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(if self.hide_stdout {
                Stdio::null()
            } else {
                Stdio::piped()
            })
            .stderr(if self.hide_stderr {
                Stdio::null()
            } else {
                Stdio::piped()
            })
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| ProcessError::Spawn {
            error: format!("{}: {e}", self.path.display()),
        })?;

        if let Some(stdout) = child.stdout.take() {
            forward_stdout(stdout);
        }

        let stderr_activity = match child.stderr.take() {
            Some(stderr) if self.fail_on_stderr => {
                let (tx, rx) = mpsc::channel(8);
                forward_stderr(stderr, Some(tx));
                Some(rx)
            }
            Some(stderr) => {
                forward_stderr(stderr, None);
                None
            }
            None => None,
        };

        Ok(SpawnedProcess {
            handle: Box::new(CommandHandle {
                child,
                status: None,
            }),
            stderr_activity,
        })
    }
}

/// Forwards child stdout lines to the log at info level.
fn forward_stdout(stream: impl AsyncRead + Unpin + Send + 'static) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            tracing::info!(target: "wrapped::stdout", "{line}");
        }
    });
}

/// Forwards child stderr lines to the log at error level, signalling the
/// observed byte count when an activity channel is given.
///
/// The signal uses `try_send`: detection must never stall the child's stderr
/// pipe when the supervisor is busy elsewhere.
fn forward_stderr(
    stream: impl AsyncRead + Unpin + Send + 'static,
    activity: Option<mpsc::Sender<usize>>,
) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            tracing::error!(target: "wrapped::stderr", "{line}");
            if let Some(tx) = &activity {
                let _ = tx.try_send(line.len());
            }
        }
    });
}

struct CommandHandle {
    child: Child,
    status: Option<ExitOutcome>,
}

#[async_trait]
impl ProcessHandle for CommandHandle {
    fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    async fn wait(&mut self) -> Result<ExitOutcome, ProcessError> {
        if let Some(status) = self.status {
            return Ok(status);
        }

        let status = self
            .child
            .wait()
            .await
            .map_err(|e| ProcessError::Wait {
                error: e.to_string(),
            })?;

        let outcome = ExitOutcome::from_status(status);
        self.status = Some(outcome);
        Ok(outcome)
    }

    fn interrupt(&mut self) {
        #[cfg(unix)]
        if let Some(pid) = self.child.id() {
            // Safety: plain kill(2) on a pid we own; worst case ESRCH.
            unsafe {
                libc::kill(pid as libc::pid_t, libc::SIGINT);
            }
        }
        #[cfg(not(unix))]
        {
            let _ = self.child.start_kill();
        }
    }

    async fn force_kill(&mut self) {
        if self.status.is_none() {
            let _ = self.child.kill().await;
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    fn spawner(path: &str, args: &[&str], fail_on_stderr: bool) -> CommandSpawner {
        let config = ProcessConfig {
            path: path.into(),
            args: args.iter().map(|s| s.to_string()).collect(),
            fail_on_stderr,
            ..ProcessConfig::for_command(path)
        };
        CommandSpawner::new(&config)
    }

    #[tokio::test]
    async fn test_exit_code_is_reported() {
        let mut spawned = spawner("sh", &["-c", "exit 7"], false)
            .spawn()
            .await
            .unwrap();

        let outcome = timeout(Duration::from_secs(5), spawned.handle.wait())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome, ExitOutcome::Exited(7));
    }

    #[tokio::test]
    async fn test_missing_binary_is_a_spawn_error() {
        let err = spawner("/nonexistent/procvisor-test-binary", &[], false)
            .spawn()
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ProcessError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_interrupt_terminates_the_child() {
        let mut spawned = spawner("sleep", &["30"], false).spawn().await.unwrap();

        spawned.handle.interrupt();
        let outcome = timeout(Duration::from_secs(5), spawned.handle.wait())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome, ExitOutcome::Signaled(libc::SIGINT));
    }

    #[tokio::test]
    async fn test_force_kill_reports_sigkill() {
        let mut spawned = spawner("sleep", &["30"], false).spawn().await.unwrap();

        spawned.handle.force_kill().await;
        let outcome = timeout(Duration::from_secs(5), spawned.handle.wait())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome, ExitOutcome::Signaled(libc::SIGKILL));
    }

    #[tokio::test]
    async fn test_wait_after_kill_returns_cached_outcome() {
        let mut spawned = spawner("sleep", &["30"], false).spawn().await.unwrap();

        spawned.handle.force_kill().await;
        let first = spawned.handle.wait().await.unwrap();
        let second = spawned.handle.wait().await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_stderr_activity_signal() {
        let mut spawned = spawner("sh", &["-c", "echo oops 1>&2; sleep 2"], true)
            .spawn()
            .await
            .unwrap();

        let mut activity = spawned.stderr_activity.take().unwrap();
        let n = timeout(Duration::from_secs(5), activity.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(n, "oops".len());

        spawned.handle.force_kill().await;
    }

    #[tokio::test]
    async fn test_no_activity_channel_without_fail_on_stderr() {
        let spawned = spawner("sh", &["-c", "exit 0"], false).spawn().await.unwrap();
        assert!(spawned.stderr_activity.is_none());
    }
}

//! # ProcessSupervisor: lifecycle owner of the wrapped process.
//!
//! Supervises zero-or-more sequential instances of one external command:
//! - restarts per [`RestartPolicy`],
//! - delays per [`BackoffPolicy`] (doubling, never reset),
//! - escalates to a kill when the grace period expires after an interrupt,
//! - reports every observable transition as a [`SupervisionEvent`].
//!
//! ## Event flow
//! ```text
//! start() ──► spawn ok   ──► {Running}            (always the first event
//!         └─► spawn fail ──► {Error, spawn error}  after a launch attempt)
//!
//! while running:
//!   stderr activity (fail-on-stderr) ──► {Error}   (process keeps running)
//!   process exit code 0              ──► {Stopped}
//!   process exit code N != 0         ──► {Error, exit status N}
//!   killed by signal                 ──► {Error, signal kill}
//!
//! after every exit:
//!   can_restart(cancelling, exit_code)?
//!     ├─ yes ──► sleep(backoff, cancellable) ──► spawn again
//!     └─ no  ──► {last status, last error, terminal} ──► channel closes
//! ```
//!
//! ## Rules
//! - Instances run **sequentially**; there is never more than one child.
//! - Events are emitted by a single writer over a single channel, so the
//!   consumer observes them strictly in order.
//! - Exactly one terminal event is emitted, last, even when cancellation is
//!   triggered more than once.
//! - Cancellation while an instance runs sends the polite interrupt and arms
//!   the kill timer; cancellation while a restart is pending skips the
//!   restart entirely.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::ProcessConfig;
use crate::error::ProcessError;
use crate::events::{ProcessStatus, SupervisionEvent};
use crate::policies::{BackoffPolicy, RestartPolicy, RestartState};
use crate::supervisor::spawn::{
    CommandSpawner, ExitOutcome, SpawnedProcess, Spawner,
};
use crate::supervisor::state::SupervisorState;

/// Supervises the full lifecycle of the wrapped command.
pub struct ProcessSupervisor {
    spawner: Arc<dyn Spawner>,
    restart: RestartPolicy,
    backoff: BackoffPolicy,
    stop_grace: Duration,
}

impl ProcessSupervisor {
    /// Creates a supervisor for the configured command.
    pub fn new(config: &ProcessConfig) -> Self {
        Self::with_spawner(
            Arc::new(CommandSpawner::new(config)),
            config.restart,
            config.backoff,
            config.stop_grace,
        )
    }

    /// Creates a supervisor over an explicit [`Spawner`] implementation.
    pub fn with_spawner(
        spawner: Arc<dyn Spawner>,
        restart: RestartPolicy,
        backoff: BackoffPolicy,
        stop_grace: Duration,
    ) -> Self {
        Self {
            spawner,
            restart,
            backoff,
            stop_grace,
        }
    }

    /// Begins supervision immediately (no delay before the first launch).
    ///
    /// Returns the ordered event stream and a handle that completes only
    /// after the supervisor has fully quiesced: child reaped, terminal event
    /// emitted, no further events pending.
    pub fn start(
        self,
        token: CancellationToken,
    ) -> (mpsc::Receiver<SupervisionEvent>, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(1);
        let handle = tokio::spawn(self.run(token, tx));
        (rx, handle)
    }

    async fn run(self, token: CancellationToken, events: mpsc::Sender<SupervisionEvent>) {
        let mut state = SupervisorState::Idle;
        let mut restarts = RestartState::new(self.backoff);
        let mut last_status = ProcessStatus::Stopped;
        let mut last_error: Option<ProcessError> = None;

        loop {
            if token.is_cancelled() {
                break;
            }
            advance(&mut state, SupervisorState::Starting);

            match self.spawner.spawn().await {
                Err(err) => {
                    tracing::error!(error = %err, "cannot start the wrapped process");
                    last_status = ProcessStatus::Error;
                    last_error = Some(err.clone());
                    emit(
                        &events,
                        SupervisionEvent::transition(ProcessStatus::Error).with_error(err),
                    )
                    .await;
                }
                Ok(spawned) => {
                    advance(&mut state, SupervisorState::Running);
                    tracing::info!("wrapped process started");
                    last_status = ProcessStatus::Running;
                    last_error = None;
                    emit(
                        &events,
                        SupervisionEvent::transition(ProcessStatus::Running),
                    )
                    .await;

                    let outcome = self.monitor(spawned, &token, &events, &mut state).await;
                    let (status, error) = parse_exit(outcome);
                    match &error {
                        None => tracing::debug!("wrapped process completed without errors"),
                        Some(err) => tracing::error!(error = %err, "wrapped process failed"),
                    }

                    last_status = status;
                    last_error = error.clone();
                    let mut ev = SupervisionEvent::transition(status);
                    if let Some(err) = error {
                        ev = ev.with_error(err);
                    }
                    emit(&events, ev).await;
                }
            }

            let exit_code = last_error.as_ref().map_or(0, ProcessError::exit_code);
            restarts.record_exit(exit_code);

            if !self.restart.can_restart(token.is_cancelled(), exit_code) {
                break;
            }

            advance(&mut state, SupervisorState::RestartScheduled);
            let delay = restarts.next_delay();
            tracing::debug!(?delay, "wrapped process will restart");

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = token.cancelled() => {
                    tracing::debug!("restart was scheduled but not started, exiting now");
                    break;
                }
            }
        }

        advance(&mut state, SupervisorState::Done);
        let _ = events
            .send(SupervisionEvent::terminal(last_status, last_error))
            .await;
        tracing::debug!("supervision finished");
    }

    /// Watches one running instance until it exits.
    ///
    /// Reacts to stderr activity (transient `Error` status) and to
    /// cancellation (interrupt, then kill once the grace period expires).
    async fn monitor(
        &self,
        spawned: SpawnedProcess,
        token: &CancellationToken,
        events: &mpsc::Sender<SupervisionEvent>,
        state: &mut SupervisorState,
    ) -> Result<ExitOutcome, ProcessError> {
        let SpawnedProcess {
            mut handle,
            mut stderr_activity,
        } = spawned;

        loop {
            tokio::select! {
                res = handle.wait() => return res,

                Some(bytes) = stderr_signal(&mut stderr_activity) => {
                    tracing::debug!(bytes, "wrapped process logged an error");
                    emit(events, SupervisionEvent::transition(ProcessStatus::Error)).await;
                }

                _ = token.cancelled() => {
                    advance(state, SupervisorState::Terminating);
                    tracing::info!(pid = handle.pid(), "interrupting the wrapped process");
                    handle.interrupt();

                    return match tokio::time::timeout(self.stop_grace, handle.wait()).await {
                        Ok(res) => res,
                        Err(_elapsed) => {
                            tracing::warn!("grace period expired, killing the wrapped process");
                            handle.force_kill().await;
                            handle.wait().await
                        }
                    };
                }
            }
        }
    }
}

/// Moves the state machine forward, tracing every transition.
fn advance(state: &mut SupervisorState, next: SupervisorState) {
    debug_assert!(
        state.can_transition(next),
        "illegal supervision transition {state} -> {next}"
    );
    tracing::trace!(from = %state, to = %next, "supervision state");
    *state = next;
}

async fn emit(events: &mpsc::Sender<SupervisionEvent>, ev: SupervisionEvent) {
    // The consumer hanging up is not our problem to report.
    let _ = events.send(ev).await;
}

/// Resolves the recv on an optional stderr-activity channel; pends forever
/// when detection is not configured.
async fn stderr_signal(rx: &mut Option<mpsc::Receiver<usize>>) -> Option<usize> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Maps how an instance ended to the status and error to report.
fn parse_exit(outcome: Result<ExitOutcome, ProcessError>) -> (ProcessStatus, Option<ProcessError>) {
    match outcome {
        Ok(ExitOutcome::Exited(0)) => (ProcessStatus::Stopped, None),
        Ok(ExitOutcome::Exited(code)) => (
            ProcessStatus::Error,
            Some(ProcessError::ExitStatus { code }),
        ),
        Ok(ExitOutcome::Signaled(signal)) => (
            ProcessStatus::Error,
            Some(ProcessError::SignalKilled { signal }),
        ),
        Err(err) => (ProcessStatus::Error, Some(err)),
    }
}

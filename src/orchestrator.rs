//! # Orchestrator: wires supervision to health and sequences shutdown.
//!
//! Composes the [`ProcessSupervisor`] and the [`HealthAggregator`] without
//! giving them references to each other: status events flow in on one
//! channel, derived booleans flow out on another, and cancellation plus
//! "done" signals sequence the teardown.
//!
//! ```text
//!             ┌──────────────────┐  SupervisionEvent   ┌──────────────┐
//!  SIGINT ──► │   orchestrator   │ ◄────────────────── │  supervisor  │
//!  SIGTERM    │                  │  cancel / done      │  (wrapped    │
//!             │  Running  → true │ ──────────────────► │   process)   │
//!             │  Stopped  → false│                     └──────────────┘
//!             │  Error    → false│  alive / ready      ┌──────────────┐
//!             │                  │ ──────────────────► │  aggregator  │
//!             │                  │  cancel / done      │  (http)      │
//!             └──────────────────┘ ──────────────────► └──────────────┘
//! ```
//!
//! ## Shutdown triggers (first one wins)
//! 1. **Operator interrupt** — mark not-ready, cancel the supervisor, wait
//!    for its terminal event, then stop the aggregator; return the
//!    supervisor's terminal error.
//! 2. **Supervisor terminal event** — forward the final alive value, mark
//!    not-ready, drain the aggregator; return the terminal error.
//! 3. **Aggregator failure** — cancel the supervisor, wait for it to fully
//!    stop, return the aggregator's error.

use std::future::Future;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::RuntimeError;
use crate::events::SupervisionEvent;
use crate::health::HealthAggregator;
use crate::signals;
use crate::supervisor::ProcessSupervisor;

/// Composes one supervisor and one aggregator for a full run.
pub struct Orchestrator {
    config: Config,
}

impl Orchestrator {
    /// Creates an orchestrator for the resolved configuration.
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Runs until the wrapped process ends for good, the operator interrupts,
    /// or the listener fails; returns the error surfaced per the trigger
    /// rules.
    pub async fn run(self) -> Result<(), RuntimeError> {
        let interrupt = signals::shutdown_signal();
        self.run_with_shutdown(async move {
            if let Err(error) = interrupt.await {
                // Without signal listeners the wrapper still supervises; it
                // just cannot be stopped from the terminal.
                tracing::error!(%error, "cannot install the signal handlers");
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Same as [`Orchestrator::run`], with an explicit shutdown trigger in
    /// place of the operator signal.
    pub async fn run_with_shutdown(
        self,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), RuntimeError> {
        let server_token = CancellationToken::new();
        let (health, mut server_done) = HealthAggregator::new(&self.config.server)
            .start(server_token.clone())
            .await?;

        let wrapper_token = CancellationToken::new();
        let (mut events, mut wrapper_done) =
            ProcessSupervisor::new(&self.config.process).start(wrapper_token.clone());

        tokio::pin!(shutdown);
        let mut interrupted = false;

        loop {
            tokio::select! {
                _ = &mut shutdown, if !interrupted => {
                    tracing::info!("shutdown requested, stopping the wrapped process");
                    interrupted = true;
                    let _ = health.ready_tx.send(false).await;
                    wrapper_token.cancel();
                }

                maybe = events.recv() => {
                    let Some(ev) = maybe else {
                        // The supervisor task died without a terminal event.
                        wrapper_token.cancel();
                        let _ = (&mut wrapper_done).await;
                        server_token.cancel();
                        let _ = drain_server(&mut server_done).await;
                        return Ok(());
                    };

                    let _ = health.alive_tx.send(ev.status.is_alive()).await;
                    if !ev.terminal {
                        continue;
                    }

                    let _ = health.ready_tx.send(false).await;
                    wrapper_token.cancel();
                    let _ = (&mut wrapper_done).await;

                    server_token.cancel();
                    if let Err(error) = drain_server(&mut server_done).await {
                        tracing::warn!(error, "http server did not shut down cleanly");
                    }

                    return match ev.error {
                        Some(err) => Err(RuntimeError::Process(err)),
                        None => Ok(()),
                    };
                }

                server_result = &mut server_done => {
                    wrapper_token.cancel();
                    drain_supervisor(&mut events, &mut wrapper_done).await;
                    return Err(server_failure(server_result));
                }
            }
        }
    }
}

/// Waits for the supervisor to fully stop while consuming any events still
/// in flight, so the supervisor never blocks on its own stream.
async fn drain_supervisor(
    events: &mut mpsc::Receiver<SupervisionEvent>,
    done: &mut JoinHandle<()>,
) {
    let mut stream_open = true;
    loop {
        if !stream_open {
            let _ = (&mut *done).await;
            return;
        }
        tokio::select! {
            maybe = events.recv() => {
                if maybe.is_none() {
                    stream_open = false;
                }
            }
            _ = &mut *done => return,
        }
    }
}

async fn drain_server(done: &mut JoinHandle<Result<(), RuntimeError>>) -> Result<(), String> {
    match (&mut *done).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e.to_string()),
        Err(e) => Err(e.to_string()),
    }
}

fn server_failure(
    joined: Result<Result<(), RuntimeError>, tokio::task::JoinError>,
) -> RuntimeError {
    match joined {
        Ok(Err(err)) => err,
        Ok(Ok(())) => RuntimeError::Listener {
            addr: "unknown".to_string(),
            error: "listener stopped unexpectedly".to_string(),
        },
        Err(join) => RuntimeError::Listener {
            addr: "unknown".to_string(),
            error: join.to_string(),
        },
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    use crate::config::{ProcessConfig, ServerConfig};
    use crate::error::ProcessError;
    use crate::policies::{BackoffPolicy, RestartPolicy};

    fn config(path: &str, args: &[&str], restart: RestartPolicy) -> Config {
        Config {
            process: ProcessConfig {
                args: args.iter().map(|s| s.to_string()).collect(),
                restart,
                hide_stdout: true,
                hide_stderr: true,
                stop_grace: Duration::from_secs(5),
                backoff: BackoffPolicy {
                    first: Duration::from_millis(10),
                    factor: 2.0,
                    max: Duration::from_secs(1),
                },
                ..ProcessConfig::for_command(path)
            },
            server: ServerConfig {
                address: "127.0.0.1:0".parse().unwrap(),
                ping_interval: Duration::ZERO,
                shutdown_timeout: Duration::from_secs(1),
            },
            log_level: "warn".to_string(),
        }
    }

    #[tokio::test]
    async fn test_clean_child_run_returns_ok() {
        let orchestrator = Orchestrator::new(config("sh", &["-c", "exit 0"], RestartPolicy::Never));
        let result = timeout(
            Duration::from_secs(10),
            orchestrator.run_with_shutdown(std::future::pending()),
        )
        .await
        .unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_failing_child_surfaces_its_exit_code() {
        let orchestrator = Orchestrator::new(config("sh", &["-c", "exit 7"], RestartPolicy::Never));
        let err = timeout(
            Duration::from_secs(10),
            orchestrator.run_with_shutdown(std::future::pending()),
        )
        .await
        .unwrap()
        .err()
        .unwrap();
        assert_eq!(err.exit_code(), 7);
    }

    #[tokio::test]
    async fn test_missing_binary_surfaces_spawn_error() {
        let orchestrator = Orchestrator::new(config(
            "/nonexistent/procvisor-test-binary",
            &[],
            RestartPolicy::Never,
        ));
        let err = timeout(
            Duration::from_secs(10),
            orchestrator.run_with_shutdown(std::future::pending()),
        )
        .await
        .unwrap()
        .err()
        .unwrap();
        assert!(matches!(
            err,
            RuntimeError::Process(ProcessError::Spawn { .. })
        ));
        assert_eq!(err.exit_code(), 1);
    }

    #[tokio::test]
    async fn test_interrupt_is_clean_when_child_exits_zero() {
        // The child honors the interrupt and exits cleanly, so the run
        // returns no error even though it was stopped from outside.
        let orchestrator = Orchestrator::new(config(
            "sh",
            &["-c", "trap 'exit 0' INT TERM; while true; do sleep 0.05; done"],
            RestartPolicy::Always,
        ));
        let result = timeout(
            Duration::from_secs(10),
            orchestrator.run_with_shutdown(async {
                tokio::time::sleep(Duration::from_millis(300)).await;
            }),
        )
        .await
        .unwrap();
        assert!(result.is_ok(), "{result:?}");
    }

    #[tokio::test]
    async fn test_bind_failure_surfaces_listener_error() {
        let taken = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = taken.local_addr().unwrap();

        let mut cfg = config("sleep", &["5"], RestartPolicy::Never);
        cfg.server.address = addr;

        let err = timeout(
            Duration::from_secs(10),
            Orchestrator::new(cfg).run_with_shutdown(std::future::pending()),
        )
        .await
        .unwrap()
        .err()
        .unwrap();
        assert!(matches!(err, RuntimeError::Listener { .. }));
    }
}

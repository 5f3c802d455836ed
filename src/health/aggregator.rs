//! # HealthAggregator: single-writer owner of the alive/ready booleans.
//!
//! Runs one event loop multiplexing over every input that can change health:
//!
//! ```text
//!   alive sink (orchestrator) ──┐
//!   ready sink (orchestrator) ──┤
//!   /ping (http handler)      ──┼──► aggregator loop ──► HealthState snapshot
//!   heartbeat expiry          ──┤         │                  ▲
//!   cancellation              ──┘         │                  │
//!                                         ▼                  │
//!                              bounded graceful        /alive /ready
//!                              http shutdown            handlers
//! ```
//!
//! ## Rules
//! - The externally visible alive value is always
//!   `externally_alive && heartbeat_alive`; readiness is independent.
//! - A ping rearms the heartbeat; an expiry clears `heartbeat_alive` until
//!   the next ping. A zero interval makes the heartbeat permanently alive.
//! - On cancellation, readiness drops **before** the listener stops
//!   accepting; the done handle resolves only once the listener has fully
//!   stopped (gracefully, or aborted after the shutdown timeout).

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;
use crate::error::RuntimeError;
use crate::health::heartbeat::Heartbeat;
use crate::health::router::build_router;
use crate::health::state::HealthState;

/// Health endpoint server plus the aggregation loop behind it.
pub struct HealthAggregator {
    address: SocketAddr,
    ping_interval: Duration,
    shutdown_timeout: Duration,
}

/// Write side handed to the orchestrator, plus synchronized reads.
pub struct HealthHandle {
    /// Push-only sink for the externally-derived alive boolean.
    pub alive_tx: mpsc::Sender<bool>,
    /// Push-only sink for the readiness boolean.
    pub ready_tx: mpsc::Sender<bool>,
    ping_tx: mpsc::Sender<()>,
    state: Arc<HealthState>,
    local_addr: SocketAddr,
}

impl HealthHandle {
    /// Point-in-time alive read, safe for concurrent callers.
    pub fn is_alive(&self) -> bool {
        self.state.is_alive()
    }

    /// Point-in-time ready read, safe for concurrent callers.
    pub fn is_ready(&self) -> bool {
        self.state.is_ready()
    }

    /// Resets the heartbeat timer, exactly as a `/ping` request does.
    pub async fn ping(&self) {
        let _ = self.ping_tx.send(()).await;
    }

    /// The address the listener is actually bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

impl HealthAggregator {
    /// Creates an aggregator for the configured listener.
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            address: config.address,
            ping_interval: config.ping_interval,
            shutdown_timeout: config.shutdown_timeout,
        }
    }

    /// Binds the listener and starts serving.
    ///
    /// Readiness is true once this returns. The returned task resolves only
    /// after a full graceful shutdown of the listener, or with the listener
    /// error if serving fails.
    pub async fn start(
        self,
        token: CancellationToken,
    ) -> Result<(HealthHandle, JoinHandle<Result<(), RuntimeError>>), RuntimeError> {
        let listener =
            TcpListener::bind(self.address)
                .await
                .map_err(|e| RuntimeError::Listener {
                    addr: self.address.to_string(),
                    error: e.to_string(),
                })?;
        let local_addr = listener.local_addr().map_err(|e| RuntimeError::Listener {
            addr: self.address.to_string(),
            error: e.to_string(),
        })?;
        tracing::info!(%local_addr, "starting http server");

        let state = Arc::new(HealthState::default());
        let (alive_tx, alive_rx) = mpsc::channel(8);
        let (ready_tx, ready_rx) = mpsc::channel(8);
        let (ping_tx, ping_rx) = mpsc::channel(1);

        let router = build_router(state.clone(), ping_tx.clone());
        let graceful = CancellationToken::new();
        let serve_shutdown = graceful.clone();
        let server = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(serve_shutdown.cancelled_owned())
                .await
        });

        state.set_ready(true);

        let handle = HealthHandle {
            alive_tx,
            ready_tx,
            ping_tx,
            state: state.clone(),
            local_addr,
        };
        let worker = AggregatorLoop {
            state,
            alive_rx,
            ready_rx,
            ping_rx,
            heartbeat: Heartbeat::new(self.ping_interval),
            token,
            graceful,
            server,
            shutdown_timeout: self.shutdown_timeout,
            addr: local_addr,
        };
        Ok((handle, tokio::spawn(worker.run())))
    }
}

struct AggregatorLoop {
    state: Arc<HealthState>,
    alive_rx: mpsc::Receiver<bool>,
    ready_rx: mpsc::Receiver<bool>,
    ping_rx: mpsc::Receiver<()>,
    heartbeat: Heartbeat,
    token: CancellationToken,
    graceful: CancellationToken,
    server: JoinHandle<std::io::Result<()>>,
    shutdown_timeout: Duration,
    addr: SocketAddr,
}

impl AggregatorLoop {
    async fn run(mut self) -> Result<(), RuntimeError> {
        let mut external_alive = false;
        let mut heartbeat_alive = true;

        loop {
            tokio::select! {
                _ = self.token.cancelled() => {
                    tracing::debug!("health aggregator context is closing");
                    self.state.set_ready(false);
                    return self.shutdown().await;
                }

                result = &mut self.server => {
                    self.state.set_ready(false);
                    return Err(listener_failure(self.addr, result));
                }

                Some(alive) = self.alive_rx.recv() => {
                    external_alive = alive;
                    self.update_alive(external_alive && heartbeat_alive);
                }

                Some(ready) = self.ready_rx.recv() => {
                    tracing::debug!(ready, "ready status changed");
                    self.state.set_ready(ready);
                }

                Some(()) = self.ping_rx.recv() => {
                    heartbeat_alive = true;
                    self.update_alive(external_alive && heartbeat_alive);
                    if self.heartbeat.enabled() {
                        self.heartbeat.rearm();
                        tracing::trace!("heartbeat timer rearmed");
                    }
                }

                _ = self.heartbeat.expired() => {
                    tracing::debug!("heartbeat timer expired");
                    heartbeat_alive = false;
                    self.update_alive(external_alive && heartbeat_alive);
                    self.heartbeat.rearm();
                }
            }
        }
    }

    fn update_alive(&self, alive: bool) {
        self.state.set_alive(alive);
        tracing::debug!(alive, "alive status changed");
    }

    /// Bounded graceful shutdown: stop accepting, finish in-flight requests,
    /// hard-stop once the shutdown timeout expires.
    async fn shutdown(&mut self) -> Result<(), RuntimeError> {
        tracing::info!("shutting down the http server");
        self.graceful.cancel();

        let deadline = tokio::time::sleep(self.shutdown_timeout);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                joined = &mut self.server => {
                    return match serve_result(joined) {
                        Ok(()) => {
                            tracing::info!("http server shutdown complete");
                            Ok(())
                        }
                        Err(error) => Err(RuntimeError::Listener {
                            addr: self.addr.to_string(),
                            error,
                        }),
                    };
                }

                // In-flight handlers must stay unblocked on their channels
                // while the listener drains; updates no longer matter.
                Some(_) = self.ping_rx.recv() => {}
                Some(_) = self.alive_rx.recv() => {}
                Some(_) = self.ready_rx.recv() => {}

                _ = &mut deadline => {
                    tracing::warn!(
                        timeout = ?self.shutdown_timeout,
                        "http shutdown timeout exceeded, aborting the listener"
                    );
                    self.server.abort();
                    return Ok(());
                }
            }
        }
    }
}

fn serve_result(joined: Result<std::io::Result<()>, tokio::task::JoinError>) -> Result<(), String> {
    match joined {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e.to_string()),
        Err(e) => Err(e.to_string()),
    }
}

fn listener_failure(
    addr: SocketAddr,
    joined: Result<std::io::Result<()>, tokio::task::JoinError>,
) -> RuntimeError {
    let error = match serve_result(joined) {
        Ok(()) => "listener stopped unexpectedly".to_string(),
        Err(e) => e,
    };
    tracing::error!(%addr, error, "http server failed");
    RuntimeError::Listener {
        addr: addr.to_string(),
        error,
    }
}

//! # procvisor
//!
//! **Procvisor** wraps a single executable and exposes its derived health as
//! http liveness/readiness/heartbeat endpoints, for use under a container
//! scheduler such as Kubernetes.
//!
//! ## Architecture
//! ```text
//!                ┌─────────────────────────────────────────────┐
//!                │  Orchestrator                               │
//!                │  - forwards status → alive                  │
//!                │  - sequences the two-phase shutdown         │
//!                └───────┬─────────────────────────┬───────────┘
//!                        │ cancel/done             │ cancel/done
//!                        ▼                         ▼
//!        ┌───────────────────────────┐   ┌───────────────────────────┐
//!        │  ProcessSupervisor        │   │  HealthAggregator         │
//!        │  - spawn/monitor/restart  │   │  - alive = external && hb │
//!        │  - backoff (doubling)     │   │  - heartbeat expiry timer │
//!        │  - interrupt, then kill   │   │  - ready = listener state │
//!        └────────────┬──────────────┘   └────────────┬──────────────┘
//!                     │ SupervisionEvent              │ GET /ready
//!                     ▼                               │ GET /alive
//!               wrapped process                       │ GET /ping
//!               (one at a time)                       ▼
//!                                                http clients
//! ```
//!
//! Each component runs as one event loop over a `select` multiplexer; they
//! share no mutable state and talk only through channels. Cancellation is
//! advisory and idempotent; each component owns exactly one "done" signal
//! that resolves after it has fully quiesced.
//!
//! ## Features
//! | Area            | Description                                      | Key types                              |
//! |-----------------|--------------------------------------------------|----------------------------------------|
//! | **Supervision** | Run, restart, and stop the wrapped executable.   | [`ProcessSupervisor`], [`Spawner`]     |
//! | **Policies**    | Restart decisions and restart pacing.            | [`RestartPolicy`], [`BackoffPolicy`]   |
//! | **Health**      | Liveness/readiness state and http endpoints.     | [`HealthAggregator`], [`HealthHandle`] |
//! | **Composition** | Wiring and deterministic shutdown ordering.      | [`Orchestrator`]                       |
//! | **Errors**      | Typed failures and the final process exit code.  | [`ProcessError`], [`RuntimeError`]     |
//!
//! ## Example
//! ```no_run
//! use procvisor::{Config, Orchestrator, ProcessConfig, ServerConfig};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), procvisor::RuntimeError> {
//!     let config = Config {
//!         process: ProcessConfig::for_command("/usr/local/bin/worker"),
//!         server: ServerConfig {
//!             address: "0.0.0.0:6060".parse().unwrap(),
//!             ping_interval: Duration::from_secs(600),
//!             shutdown_timeout: Duration::from_secs(15),
//!         },
//!         log_level: "info".to_string(),
//!     };
//!
//!     Orchestrator::new(config).run().await
//! }
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod health;
pub mod orchestrator;
pub mod policies;
pub mod signals;
pub mod supervisor;

// ---- Public re-exports ----

pub use config::{Config, ConfigError, FileConfig, Overrides, ProcessConfig, ServerConfig};
pub use error::{ProcessError, RuntimeError};
pub use events::{ProcessStatus, SupervisionEvent};
pub use health::{HealthAggregator, HealthHandle};
pub use orchestrator::Orchestrator;
pub use policies::{BackoffPolicy, RestartPolicy};
pub use supervisor::{CommandSpawner, ProcessSupervisor, Spawner};

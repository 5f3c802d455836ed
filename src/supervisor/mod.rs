//! Process supervision: spawn, monitor, restart, and kill the wrapped
//! command, reporting every transition as a
//! [`SupervisionEvent`](crate::SupervisionEvent).

mod actor;
mod spawn;
mod state;

pub use actor::ProcessSupervisor;
pub use spawn::{CommandSpawner, ExitOutcome, ProcessHandle, SpawnedProcess, Spawner};
pub use state::SupervisorState;

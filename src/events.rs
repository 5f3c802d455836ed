//! # Supervision events emitted by the process supervisor.
//!
//! [`SupervisionEvent`] is the single message type flowing from the
//! [`ProcessSupervisor`](crate::ProcessSupervisor) to its consumer. Events are
//! produced by one writer over one channel, so consumers always observe them
//! in emission order.
//!
//! ## Rules
//! - Exactly one event per observable transition of the wrapped process.
//! - Exactly one event carries `terminal = true`; it is the last event before
//!   the channel closes, and no further events follow it.

use crate::error::ProcessError;

/// Observable status of the wrapped process.
///
/// Transitions are emitted, never queried back; the supervisor is the sole
/// writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    /// The process is not running and ended cleanly (or never started).
    Stopped,
    /// The process is currently running.
    Running,
    /// The process failed: spawn error, non-zero exit, or a logged error
    /// while fail-on-stderr is configured.
    Error,
}

impl ProcessStatus {
    /// Whether this status counts as "externally alive" for health purposes.
    #[inline]
    pub fn is_alive(self) -> bool {
        matches!(self, ProcessStatus::Running)
    }
}

/// One observable transition of the wrapped process.
#[derive(Debug, Clone)]
pub struct SupervisionEvent {
    /// Status after the transition.
    pub status: ProcessStatus,
    /// Error associated with the transition, when there is one.
    pub error: Option<ProcessError>,
    /// Marks the final event; the emitting channel closes right after it.
    pub terminal: bool,
}

impl SupervisionEvent {
    /// Creates a non-terminal transition event.
    pub fn transition(status: ProcessStatus) -> Self {
        Self {
            status,
            error: None,
            terminal: false,
        }
    }

    /// Creates the terminal event carrying the last known status and error.
    pub fn terminal(status: ProcessStatus, error: Option<ProcessError>) -> Self {
        Self {
            status,
            error,
            terminal: true,
        }
    }

    /// Attaches an error to the event.
    #[inline]
    pub fn with_error(mut self, error: ProcessError) -> Self {
        self.error = Some(error);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_running_is_alive() {
        assert!(ProcessStatus::Running.is_alive());
        assert!(!ProcessStatus::Stopped.is_alive());
        assert!(!ProcessStatus::Error.is_alive());
    }

    #[test]
    fn test_transition_is_not_terminal() {
        let ev = SupervisionEvent::transition(ProcessStatus::Running);
        assert!(!ev.terminal);
        assert!(ev.error.is_none());
    }

    #[test]
    fn test_terminal_keeps_error() {
        let ev = SupervisionEvent::terminal(
            ProcessStatus::Error,
            Some(ProcessError::ExitStatus { code: 3 }),
        );
        assert!(ev.terminal);
        assert_eq!(ev.error, Some(ProcessError::ExitStatus { code: 3 }));
    }
}

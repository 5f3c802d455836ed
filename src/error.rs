//! Error types used by the procvisor runtime and the wrapped process.
//!
//! This module defines two main error enums:
//!
//! - [`ProcessError`] — failures of the wrapped process itself (spawn,
//!   exit status, signal kill).
//! - [`RuntimeError`] — failures of the surrounding runtime (http listener,
//!   supervision) and the value ultimately returned by the orchestrator.
//!
//! Every error is a value delivered over a channel or a return slot; nothing
//! crosses a loop boundary as a panic. The final process exit code is derived
//! from the surfaced error with [`RuntimeError::exit_code`].

use thiserror::Error;

/// Exit code reported when the wrapped process was terminated by a signal.
///
/// Mirrors the shell convention of reporting signal deaths with a single
/// distinguished value, so external process-status consumers can tell "clean"
/// and "forced" endings apart without parsing error strings.
pub const SIGNAL_EXIT_CODE: i32 = 255;

/// Generic failure code used when no child exit code is available.
pub const GENERIC_EXIT_CODE: i32 = 1;

/// # Errors produced by the wrapped process.
///
/// These are reported through [`SupervisionEvent`](crate::SupervisionEvent)
/// and never terminate the supervisor loop by themselves; the restart policy
/// decides what happens next.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcessError {
    /// The executable could not be started (missing binary, permissions).
    #[error("cannot start the wrapped process: {error}")]
    Spawn {
        /// The underlying spawn error message.
        error: String,
    },

    /// The process exited on its own with a non-zero status.
    #[error("the process ended with exit status {code}")]
    ExitStatus {
        /// The numeric exit code.
        code: i32,
    },

    /// The process was terminated by a signal, e.g. after exceeding the
    /// graceful-stop period and being force-killed.
    #[error("the process was killed by signal {signal}")]
    SignalKilled {
        /// The signal number that ended the process.
        signal: i32,
    },

    /// Waiting on the process failed at the OS level.
    #[error("cannot wait on the wrapped process: {error}")]
    Wait {
        /// The underlying wait error message.
        error: String,
    },
}

impl ProcessError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ProcessError::Spawn { .. } => "process_spawn",
            ProcessError::ExitStatus { .. } => "process_exit_status",
            ProcessError::SignalKilled { .. } => "process_signal_killed",
            ProcessError::Wait { .. } => "process_wait",
        }
    }

    /// Flattens the error into the exit code surfaced at the outer boundary.
    ///
    /// - `ExitStatus` carries the child's own code.
    /// - `SignalKilled` maps to the distinguished [`SIGNAL_EXIT_CODE`].
    /// - Everything else maps to [`GENERIC_EXIT_CODE`].
    pub fn exit_code(&self) -> i32 {
        match self {
            ProcessError::ExitStatus { code } => *code,
            ProcessError::SignalKilled { .. } => SIGNAL_EXIT_CODE,
            ProcessError::Spawn { .. } | ProcessError::Wait { .. } => GENERIC_EXIT_CODE,
        }
    }
}

/// # Errors produced by the procvisor runtime.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// The http listener failed to bind, or stopped serving unexpectedly.
    #[error("http listener failed on {addr}: {error}")]
    Listener {
        /// The configured bind address.
        addr: String,
        /// The underlying listener error message.
        error: String,
    },

    /// The supervised process ended with an error; carries the final
    /// [`ProcessError`] reported by the supervisor's terminal event.
    #[error(transparent)]
    Process(#[from] ProcessError),
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::Listener { .. } => "runtime_listener",
            RuntimeError::Process(e) => e.as_label(),
        }
    }

    /// The process exit code to surface for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            RuntimeError::Listener { .. } => GENERIC_EXIT_CODE,
            RuntimeError::Process(e) => e.exit_code(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_carries_child_status() {
        let err = ProcessError::ExitStatus { code: 42 };
        assert_eq!(err.exit_code(), 42);
    }

    #[test]
    fn test_signal_kill_uses_distinguished_code() {
        let err = ProcessError::SignalKilled { signal: 9 };
        assert_eq!(err.exit_code(), SIGNAL_EXIT_CODE);
    }

    #[test]
    fn test_spawn_and_wait_use_generic_code() {
        let spawn = ProcessError::Spawn {
            error: "no such file".into(),
        };
        let wait = ProcessError::Wait {
            error: "interrupted".into(),
        };
        assert_eq!(spawn.exit_code(), GENERIC_EXIT_CODE);
        assert_eq!(wait.exit_code(), GENERIC_EXIT_CODE);
    }

    #[test]
    fn test_runtime_error_delegates_to_process() {
        let err = RuntimeError::Process(ProcessError::ExitStatus { code: 7 });
        assert_eq!(err.exit_code(), 7);
        assert_eq!(err.as_label(), "process_exit_status");
    }

    #[test]
    fn test_listener_error_is_generic() {
        let err = RuntimeError::Listener {
            addr: "0.0.0.0:6060".into(),
            error: "address in use".into(),
        };
        assert_eq!(err.exit_code(), GENERIC_EXIT_CODE);
        assert_eq!(err.as_label(), "runtime_listener");
    }
}

//! # Restart policy for the wrapped process.
//!
//! [`RestartPolicy`] determines whether the wrapped process is relaunched
//! after it ends, based on whether the runtime is shutting down and on the
//! exit code of the attempt that just finished.
//!
//! ## Decision table
//!
//! | Policy    | cancelling | exit code | restart? |
//! |-----------|------------|-----------|----------|
//! | `Never`   | any        | any       | no       |
//! | `OnError` | yes        | any       | no       |
//! | `OnError` | no         | 0         | no       |
//! | `OnError` | no         | != 0      | yes      |
//! | `Always`  | yes        | any       | no       |
//! | `Always`  | no         | any       | yes      |
//!
//! Cancellation always wins: once shutdown has started, no policy relaunches
//! the process.

use serde::{Deserialize, Serialize};

/// Policy controlling whether the wrapped process is restarted after it ends.
///
/// Immutable for the lifetime of one supervisor instance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RestartPolicy {
    /// Never restart: the process runs once.
    #[default]
    Never,
    /// Restart only when the process ends with a non-zero exit code.
    OnError,
    /// Restart after every exit, clean or not.
    Always,
}

impl RestartPolicy {
    /// Decides whether the process can be relaunched.
    ///
    /// `cancelling` is true once shutdown has been requested; `exit_code` is
    /// the code of the attempt that just ended (spawn failures report their
    /// generic non-zero code).
    pub fn can_restart(self, cancelling: bool, exit_code: i32) -> bool {
        match self {
            RestartPolicy::Never => false,
            RestartPolicy::OnError => !cancelling && exit_code != 0,
            RestartPolicy::Always => !cancelling,
        }
    }
}

impl std::fmt::Display for RestartPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RestartPolicy::Never => "never",
            RestartPolicy::OnError => "on-error",
            RestartPolicy::Always => "always",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_table() {
        // (policy, cancelling, exit_code, expected)
        let table = [
            (RestartPolicy::Never, false, 0, false),
            (RestartPolicy::Never, false, 1, false),
            (RestartPolicy::Never, true, 0, false),
            (RestartPolicy::Never, true, 1, false),
            (RestartPolicy::OnError, false, 0, false),
            (RestartPolicy::OnError, false, 1, true),
            (RestartPolicy::OnError, true, 0, false),
            (RestartPolicy::OnError, true, 1, false),
            (RestartPolicy::Always, false, 0, true),
            (RestartPolicy::Always, false, 1, true),
            (RestartPolicy::Always, true, 0, false),
            (RestartPolicy::Always, true, 1, false),
        ];

        for (policy, cancelling, code, expected) in table {
            assert_eq!(
                policy.can_restart(cancelling, code),
                expected,
                "{policy} cancelling={cancelling} exit_code={code}"
            );
        }
    }

    #[test]
    fn test_negative_exit_code_counts_as_error() {
        assert!(RestartPolicy::OnError.can_restart(false, -1));
        assert!(RestartPolicy::OnError.can_restart(false, 255));
    }
}

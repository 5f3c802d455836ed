//! # Backoff policy for restart pacing.
//!
//! [`BackoffPolicy`] controls how the delay between successive restarts of
//! the wrapped process grows. [`RestartState`] owns the mutable side: the
//! current delay, which doubles (by `factor`) after every restart attempt and
//! is **never reset** while the supervisor instance lives, keeping the
//! restart cadence monotonically non-decreasing.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use procvisor::BackoffPolicy;
//! use procvisor::policies::RestartState;
//!
//! let mut state = RestartState::new(BackoffPolicy::default());
//! assert_eq!(state.next_delay(), Duration::from_secs(1));
//! assert_eq!(state.next_delay(), Duration::from_secs(2));
//! assert_eq!(state.next_delay(), Duration::from_secs(4));
//! ```

use std::time::Duration;

/// Restart backoff policy.
///
/// The first restart waits [`BackoffPolicy::first`]; each following restart
/// multiplies the previous delay by [`BackoffPolicy::factor`], clamped to
/// [`BackoffPolicy::max`].
#[derive(Clone, Copy, Debug)]
pub struct BackoffPolicy {
    /// Delay before the first restart.
    pub first: Duration,
    /// Multiplicative growth factor (`>= 1.0` recommended).
    pub factor: f64,
    /// Maximum delay cap.
    pub max: Duration,
}

impl Default for BackoffPolicy {
    /// Returns the reference pacing: `first = 1s`, `factor = 2.0`,
    /// `max = 5m`.
    fn default() -> Self {
        Self {
            first: Duration::from_secs(1),
            factor: 2.0,
            max: Duration::from_secs(300),
        }
    }
}

impl BackoffPolicy {
    /// Computes the delay following `prev`, clamped to [`BackoffPolicy::max`].
    ///
    /// `None` means no restart has happened yet and yields `first`.
    pub fn next(&self, prev: Option<Duration>) -> Duration {
        let max_secs = self.max.as_secs_f64();

        let base = match prev {
            None => return self.first.min(self.max),
            Some(prev) => prev.as_secs_f64() * self.factor,
        };

        if !base.is_finite() || base < 0.0 || base > max_secs {
            self.max
        } else {
            Duration::from_secs_f64(base)
        }
    }
}

/// Mutable restart state owned by one supervisor instance.
///
/// Tracks the current backoff delay and the exit code of the last ended
/// attempt. Private to the supervisor; nothing resets it from outside.
#[derive(Debug)]
pub struct RestartState {
    policy: BackoffPolicy,
    current: Option<Duration>,
    last_exit_code: Option<i32>,
}

impl RestartState {
    /// Creates a fresh state: no restart performed, no exit recorded.
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            current: None,
            last_exit_code: None,
        }
    }

    /// Advances the backoff and returns the delay to wait before the next
    /// restart. The returned delay becomes the new current backoff.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.policy.next(self.current);
        self.current = Some(delay);
        delay
    }

    /// Records the exit code of the attempt that just ended.
    pub fn record_exit(&mut self, code: i32) {
        self.last_exit_code = Some(code);
    }

    /// The exit code of the last ended attempt, if any attempt ended.
    pub fn last_exit_code(&self) -> Option<i32> {
        self.last_exit_code
    }

    /// The current backoff delay (`None` until the first restart).
    pub fn current_backoff(&self) -> Option<Duration> {
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delays_double_from_first() {
        let mut state = RestartState::new(BackoffPolicy {
            first: Duration::from_millis(100),
            factor: 2.0,
            max: Duration::from_secs(30),
        });

        assert_eq!(state.next_delay(), Duration::from_millis(100));
        assert_eq!(state.next_delay(), Duration::from_millis(200));
        assert_eq!(state.next_delay(), Duration::from_millis(400));
        assert_eq!(state.next_delay(), Duration::from_millis(800));
    }

    #[test]
    fn test_delay_clamped_to_max() {
        let mut state = RestartState::new(BackoffPolicy {
            first: Duration::from_secs(1),
            factor: 2.0,
            max: Duration::from_secs(4),
        });

        assert_eq!(state.next_delay(), Duration::from_secs(1));
        assert_eq!(state.next_delay(), Duration::from_secs(2));
        assert_eq!(state.next_delay(), Duration::from_secs(4));
        assert_eq!(state.next_delay(), Duration::from_secs(4));
    }

    #[test]
    fn test_first_exceeding_max_is_clamped() {
        let mut state = RestartState::new(BackoffPolicy {
            first: Duration::from_secs(10),
            factor: 2.0,
            max: Duration::from_secs(5),
        });
        assert_eq!(state.next_delay(), Duration::from_secs(5));
    }

    #[test]
    fn test_backoff_never_resets() {
        let mut state = RestartState::new(BackoffPolicy::default());
        state.next_delay();
        state.next_delay();
        // A clean exit records a code but does not touch the delay.
        state.record_exit(0);
        assert_eq!(state.next_delay(), Duration::from_secs(4));
    }

    #[test]
    fn test_exit_code_recording() {
        let mut state = RestartState::new(BackoffPolicy::default());
        assert_eq!(state.last_exit_code(), None);
        state.record_exit(137);
        assert_eq!(state.last_exit_code(), Some(137));
    }

    #[test]
    fn test_current_backoff_tracks_last_delay() {
        let mut state = RestartState::new(BackoffPolicy::default());
        assert_eq!(state.current_backoff(), None);
        state.next_delay();
        assert_eq!(state.current_backoff(), Some(Duration::from_secs(1)));
    }
}

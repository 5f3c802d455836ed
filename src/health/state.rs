//! Shared health snapshot read by the http handlers.

use std::sync::atomic::{AtomicBool, Ordering};

/// Point-in-time alive/ready snapshot.
///
/// Written only by the aggregator loop; handlers take lock-free reads and
/// never block on channels.
#[derive(Debug, Default)]
pub struct HealthState {
    alive: AtomicBool,
    ready: AtomicBool,
}

impl HealthState {
    /// Whether the wrapped process (and its heartbeat, if configured)
    /// currently indicates it is functioning.
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Whether the listener has completed startup and not begun shutdown.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    pub(crate) fn set_alive(&self, alive: bool) {
        self.alive.store(alive, Ordering::SeqCst);
    }

    pub(crate) fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_not_alive_not_ready() {
        let state = HealthState::default();
        assert!(!state.is_alive());
        assert!(!state.is_ready());
    }

    #[test]
    fn test_flags_are_independent() {
        let state = HealthState::default();
        state.set_alive(true);
        assert!(state.is_alive());
        assert!(!state.is_ready());

        state.set_ready(true);
        state.set_alive(false);
        assert!(!state.is_alive());
        assert!(state.is_ready());
    }
}

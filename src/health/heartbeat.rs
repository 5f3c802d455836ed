//! # Heartbeat expiry timer.
//!
//! A single-shot timer that the aggregator rearms on every `/ping`. When it
//! fires, the heartbeat side of liveness goes false until the next rearm.
//! A zero interval disables the timer permanently: [`Heartbeat::expired`]
//! never resolves and `heartbeat_alive` stays true.
//!
//! Rearming is a plain deadline reset on [`tokio::time::Sleep`], which has no
//! fired-but-unconsumed signal to drain; the drain-before-reset discipline
//! required with OS-level one-shot timers collapses to [`Heartbeat::rearm`]
//! here. The timer still must be rearmed after every observed expiry, since a
//! completed sleep stays completed.

use std::pin::Pin;
use std::time::Duration;

use tokio::time::{Instant, Sleep};

/// Single-shot, rearmable heartbeat timer.
pub struct Heartbeat {
    interval: Duration,
    sleep: Pin<Box<Sleep>>,
}

impl Heartbeat {
    /// Creates the timer and arms it for one full interval.
    ///
    /// `interval == 0` creates a permanently disabled timer.
    pub fn new(interval: Duration) -> Self {
        let deadline = if interval.is_zero() {
            // Never consulted: `expired` pends forever when disabled.
            Instant::now()
        } else {
            Instant::now() + interval
        };
        Self {
            interval,
            sleep: Box::pin(tokio::time::sleep_until(deadline)),
        }
    }

    /// Whether the timer participates in liveness at all.
    pub fn enabled(&self) -> bool {
        !self.interval.is_zero()
    }

    /// Resolves when the heartbeat interval elapses; pends forever when the
    /// timer is disabled. Call [`Heartbeat::rearm`] after each expiry.
    pub async fn expired(&mut self) {
        if !self.enabled() {
            return std::future::pending().await;
        }
        self.sleep.as_mut().await;
    }

    /// Restarts the countdown from now. No-op when disabled.
    pub fn rearm(&mut self) {
        if self.enabled() {
            self.sleep.as_mut().reset(Instant::now() + self.interval);
        }
    }
}

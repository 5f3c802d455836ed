//! Policies governing restart decisions and restart pacing.

mod backoff;
mod restart;

pub use backoff::{BackoffPolicy, RestartState};
pub use restart::RestartPolicy;

//! Health aggregation: the alive/ready booleans, the heartbeat timer, and
//! the http endpoints that expose them.

mod aggregator;
mod heartbeat;
mod router;
mod state;

pub use aggregator::{HealthAggregator, HealthHandle};
pub use heartbeat::Heartbeat;
pub use state::HealthState;

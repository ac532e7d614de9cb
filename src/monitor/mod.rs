//! Monitoring core: statistics, availability state machine, report clock
//! and the alert decider that ties them together.
//!
//! Nothing in here performs I/O. The scheduler feeds outcomes in and hands
//! the resulting events to the notifiers.

mod decider;
mod events;
mod report;
mod state;
mod window;

pub use decider::*;
pub use events::*;

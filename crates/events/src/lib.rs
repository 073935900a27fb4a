//! Terminal job event bus.

pub mod bus;

pub use bus::{JobEvent, JobEventBus};

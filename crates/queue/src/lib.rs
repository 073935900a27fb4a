//! Job queue, worker pool, producer execution, and result tracking.
//!
//! [`JobQueue`] accepts submissions and drives up to W concurrent
//! executions of the external artifact producer. Terminal events flow
//! through the [`mediavault_events`] bus to a single
//! [`coordinator::CompletionCoordinator`], which writes the result tracker
//! and the cache as one logical sequence.

pub mod coordinator;
pub mod producer;
pub mod queue;
pub mod tracker;

pub use coordinator::CompletionCoordinator;
pub use producer::{CommandProducer, Producer, ProducerError};
pub use queue::{JobQueue, QueueStats};
pub use tracker::ResultTracker;

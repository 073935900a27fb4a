//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`JobEventBus`] carries terminal job events from the worker pool to the
//! completion coordinator. Workers publish exactly one event per job,
//! strictly after the job became active; the coordinator consumes them and
//! performs the tracker write, cache write, and artifact reclamation as one
//! logical sequence. It is designed to be shared via `Arc<JobEventBus>`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use mediavault_core::JobId;

// ---------------------------------------------------------------------------
// JobEvent
// ---------------------------------------------------------------------------

/// A terminal event for a single job. Delivered at most once per job.
#[derive(Debug, Clone, Serialize)]
pub enum JobEvent {
    /// The producer exited successfully and deposited at least one file.
    Completed {
        job_id: JobId,
        /// Raw identifier the job was submitted with (cache key is derived
        /// from this by the coordinator).
        identifier: String,
        /// Relative paths under the job's artifact directory.
        produced_files: Vec<String>,
        finished_at: DateTime<Utc>,
    },
    /// The producer failed, timed out, or produced no output.
    Failed {
        job_id: JobId,
        error: String,
        finished_at: DateTime<Utc>,
    },
}

impl JobEvent {
    /// The job this event belongs to.
    pub fn job_id(&self) -> JobId {
        match self {
            Self::Completed { job_id, .. } | Self::Failed { job_id, .. } => *job_id,
        }
    }
}

// ---------------------------------------------------------------------------
// JobEventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 256;

/// In-process fan-out bus for terminal job events.
///
/// Wraps a [`broadcast::Sender`] so the coordinator (and any diagnostic
/// subscriber) can independently receive every published event.
pub struct JobEventBus {
    sender: broadcast::Sender<JobEvent>,
}

impl JobEventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full the oldest un-consumed messages are dropped
    /// and slow receivers observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// If there are no active subscribers the event is silently dropped.
    pub fn publish(&self, event: JobEvent) {
        // Ignore the SendError -- it only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    /// Subscribe to all events published on this bus.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.sender.subscribe()
    }
}

impl Default for JobEventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_and_receive_completed_event() {
        let bus = JobEventBus::default();
        let mut rx = bus.subscribe();

        let job_id = uuid::Uuid::now_v7();
        bus.publish(JobEvent::Completed {
            job_id,
            identifier: "https://example.com/v".into(),
            produced_files: vec!["video.mp4".into()],
            finished_at: Utc::now(),
        });

        let received = rx.recv().await.expect("should receive the event");
        assert_eq!(received.job_id(), job_id);
        match received {
            JobEvent::Completed { produced_files, .. } => {
                assert_eq!(produced_files, vec!["video.mp4".to_string()]);
            }
            other => panic!("expected Completed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() {
        let bus = JobEventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        let job_id = uuid::Uuid::now_v7();
        bus.publish(JobEvent::Failed {
            job_id,
            error: "timed out".into(),
            finished_at: Utc::now(),
        });

        assert_eq!(rx1.recv().await.unwrap().job_id(), job_id);
        assert_eq!(rx2.recv().await.unwrap().job_id(), job_id);
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let bus = JobEventBus::default();
        bus.publish(JobEvent::Failed {
            job_id: uuid::Uuid::now_v7(),
            error: "orphan".into(),
            finished_at: Utc::now(),
        });
    }
}

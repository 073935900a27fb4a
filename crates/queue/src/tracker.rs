//! Short-lived, in-memory record of terminal job outcomes.
//!
//! The tracker serves status polling without cache involvement: it holds
//! outcomes for failed jobs too, and is pruned on a fixed retention window
//! independent of the cache TTL to bound memory growth from jobs that are
//! never polled.

use std::collections::HashMap;

use chrono::{Duration, Utc};
use tokio::sync::RwLock;

use mediavault_core::{JobId, JobOutcome};

/// Concurrency-safe map of job id to terminal outcome.
///
/// Shared via `Arc<ResultTracker>` between the completion coordinator,
/// the status handlers, the janitor, and the admin clear path.
#[derive(Default)]
pub struct ResultTracker {
    outcomes: RwLock<HashMap<JobId, JobOutcome>>,
}

impl ResultTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a terminal outcome. Called exactly once per terminal job;
    /// a duplicate recording is a bug upstream and is dropped with a
    /// warning, keeping the first outcome.
    pub async fn record(&self, outcome: JobOutcome) {
        let mut outcomes = self.outcomes.write().await;
        if let Some(existing) = outcomes.get(&outcome.job_id) {
            tracing::warn!(
                job_id = %outcome.job_id,
                existing_status = ?existing.status,
                "Duplicate outcome recording dropped",
            );
            return;
        }
        outcomes.insert(outcome.job_id, outcome);
    }

    /// Look up the outcome for a job, if it has one and has not been
    /// pruned. Callers fall back to the queue's own bookkeeping for jobs
    /// that are still queued or active.
    pub async fn get(&self, job_id: JobId) -> Option<JobOutcome> {
        self.outcomes.read().await.get(&job_id).cloned()
    }

    /// Remove one entry.
    pub async fn prune(&self, job_id: JobId) -> bool {
        self.outcomes.write().await.remove(&job_id).is_some()
    }

    /// Remove every outcome recorded longer than `retention` ago.
    /// Driven by the background janitor. Returns the number pruned.
    pub async fn prune_older_than(&self, retention: Duration) -> usize {
        let cutoff = Utc::now() - retention;
        let mut outcomes = self.outcomes.write().await;
        let before = outcomes.len();
        outcomes.retain(|_, o| o.recorded_at > cutoff);
        before - outcomes.len()
    }

    /// Drop all outcomes (admin clear).
    pub async fn clear(&self) -> usize {
        let mut outcomes = self.outcomes.write().await;
        let cleared = outcomes.len();
        outcomes.clear();
        cleared
    }

    pub async fn len(&self) -> usize {
        self.outcomes.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.outcomes.read().await.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

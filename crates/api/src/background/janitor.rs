//! Periodic cleanup of expired cache entries and stale job bookkeeping.
//!
//! Spawns a background task that evicts cache records past their TTL,
//! deletes their artifact directories, and prunes terminal job outcomes
//! and queue entries older than the result retention window. Expiry itself
//! is enforced lazily on read; this loop only reclaims storage and memory
//! for entries nobody asked for again. Runs on a fixed interval using
//! `tokio::time::interval`.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use mediavault_cache::{ArtifactStore, CacheStore};
use mediavault_queue::{JobQueue, ResultTracker};

/// Run the janitor loop until `cancel` is triggered.
pub async fn run(
    cache: Arc<CacheStore>,
    tracker: Arc<ResultTracker>,
    queue: Arc<JobQueue>,
    artifacts: Arc<ArtifactStore>,
    interval: Duration,
    result_retention: chrono::Duration,
    cancel: CancellationToken,
) {
    tracing::info!(
        interval_secs = interval.as_secs(),
        retention_secs = result_retention.num_seconds(),
        "Janitor started"
    );

    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Janitor stopping");
                break;
            }
            _ = ticker.tick() => {
                sweep(&cache, &tracker, &queue, &artifacts, result_retention).await;
            }
        }
    }
}

/// One janitor pass: evict expired cache entries (reclaiming their
/// directories) and prune old terminal outcomes and queue entries.
pub async fn sweep(
    cache: &CacheStore,
    tracker: &ResultTracker,
    queue: &JobQueue,
    artifacts: &ArtifactStore,
    result_retention: chrono::Duration,
) {
    let evicted = cache.evict_expired().await;
    for record in &evicted {
        match artifacts.remove_job_dir(record.job_id) {
            Ok(_) => {
                tracing::info!(
                    key = %record.key,
                    job_id = %record.job_id,
                    "Janitor: evicted expired cache entry"
                );
            }
            Err(e) => {
                tracing::error!(
                    job_id = %record.job_id,
                    error = %e,
                    "Janitor: failed to remove artifact directory"
                );
            }
        }
    }

    let pruned_outcomes = tracker.prune_older_than(result_retention).await;
    let pruned_jobs = queue.prune_terminal_older_than(result_retention).await;
    if !evicted.is_empty() || pruned_outcomes > 0 || pruned_jobs > 0 {
        tracing::info!(
            evicted = evicted.len(),
            pruned_outcomes,
            pruned_jobs,
            "Janitor pass complete"
        );
    } else {
        tracing::debug!("Janitor pass: nothing to clean");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

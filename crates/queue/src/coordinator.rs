//! Single consumer of terminal job events.
//!
//! One coordinator task subscribes to the [`JobEventBus`] and, for every
//! event, performs the completion sequence in order: record the outcome in
//! the result tracker, write the cache record (completions only), and
//! reclaim whatever artifact directory the event made unreachable -- the
//! failed job's own directory, or the directory of a cache record the new
//! completion superseded. Keeping this in one place makes the completion
//! path a single logical sequence instead of scattered callbacks.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;

use mediavault_cache::{ArtifactStore, CacheStore};
use mediavault_core::{normalize_identifier, CacheRecord, JobOutcome};
use mediavault_events::JobEvent;

use crate::tracker::ResultTracker;

/// Consumes the event bus and applies terminal outcomes to the tracker,
/// cache, and artifact store.
pub struct CompletionCoordinator {
    tracker: Arc<ResultTracker>,
    cache: Arc<CacheStore>,
    artifacts: Arc<ArtifactStore>,
    /// TTL applied to every new cache record, in seconds.
    cache_ttl_secs: i64,
}

impl CompletionCoordinator {
    pub fn new(
        tracker: Arc<ResultTracker>,
        cache: Arc<CacheStore>,
        artifacts: Arc<ArtifactStore>,
        cache_ttl_secs: i64,
    ) -> Self {
        Self {
            tracker,
            cache,
            artifacts,
            cache_ttl_secs,
        }
    }

    /// Run until the bus closes. Spawned once at startup:
    ///
    /// ```ignore
    /// tokio::spawn(coordinator.run(bus.subscribe()));
    /// ```
    pub async fn run(self, mut rx: tokio::sync::broadcast::Receiver<JobEvent>) {
        loop {
            match rx.recv().await {
                Ok(event) => self.handle(event).await,
                Err(RecvError::Lagged(missed)) => {
                    tracing::error!(missed, "Completion coordinator lagged; events lost");
                }
                Err(RecvError::Closed) => break,
            }
        }
        tracing::debug!("Completion coordinator stopped");
    }

    /// Expose the handler for tests that drive events directly.
    pub async fn handle(&self, event: JobEvent) {
        match event {
            JobEvent::Completed {
                job_id,
                identifier,
                produced_files,
                ..
            } => {
                self.tracker
                    .record(JobOutcome::completed(job_id, produced_files.clone()))
                    .await;

                let key = normalize_identifier(&identifier);
                let record =
                    CacheRecord::new(key.clone(), produced_files, job_id, self.cache_ttl_secs);
                let superseded = self.cache.put(record).await;

                tracing::info!(
                    job_id = %job_id,
                    key = %key,
                    ttl_secs = self.cache_ttl_secs,
                    "Result cached",
                );

                // The overwritten record is no longer reachable from the
                // cache; its directory would otherwise leak until a restart
                // sweep.
                if let Some(old) = superseded {
                    if old.job_id != job_id {
                        if let Err(e) = self.artifacts.remove_job_dir(old.job_id) {
                            tracing::warn!(
                                job_id = %old.job_id,
                                error = %e,
                                "Failed to reclaim superseded artifact directory",
                            );
                        }
                    }
                }
            }
            JobEvent::Failed { job_id, error, .. } => {
                self.tracker
                    .record(JobOutcome::failed(job_id, error.clone()))
                    .await;

                // Nothing references a failed job's directory; delete it now
                // rather than leaving it for the startup sweep.
                if let Err(e) = self.artifacts.remove_job_dir(job_id) {
                    tracing::warn!(
                        job_id = %job_id,
                        error = %e,
                        "Failed to remove failed job's artifact directory",
                    );
                }

                tracing::warn!(job_id = %job_id, error = %error, "Failure recorded");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use mediavault_core::OutcomeStatus;
    use mediavault_events::JobEventBus;

    struct Fixture {
        _tmp: tempfile::TempDir,
        tracker: Arc<ResultTracker>,
        cache: Arc<CacheStore>,
        artifacts: Arc<ArtifactStore>,
        coordinator: CompletionCoordinator,
    }

    fn fixture(ttl_secs: i64) -> Fixture {
        let tmp = tempfile::tempdir().unwrap();
        let artifacts = Arc::new(ArtifactStore::new(tmp.path().join("artifacts")).unwrap());
        let tracker = Arc::new(ResultTracker::new());
        let cache = Arc::new(CacheStore::new(Arc::clone(&artifacts)));
        let coordinator = CompletionCoordinator::new(
            Arc::clone(&tracker),
            Arc::clone(&cache),
            Arc::clone(&artifacts),
            ttl_secs,
        );
        Fixture {
            _tmp: tmp,
            tracker,
            cache,
            artifacts,
            coordinator,
        }
    }

    fn deposit(artifacts: &ArtifactStore, job_id: mediavault_core::JobId, name: &str) {
        let dir = artifacts.create_job_dir(job_id).unwrap();
        std::fs::write(dir.join(name), b"vv").unwrap();
    }

    #[tokio::test]
    async fn completion_records_outcome_and_caches_result() {
        let fx = fixture(3600);
        let job_id = uuid::Uuid::now_v7();
        deposit(&fx.artifacts, job_id, "video.mp4");

        fx.coordinator
            .handle(JobEvent::Completed {
                job_id,
                identifier: "https://Example.com/v".into(),
                produced_files: vec!["video.mp4".into()],
                finished_at: Utc::now(),
            })
            .await;

        let outcome = fx.tracker.get(job_id).await.expect("outcome recorded");
        assert_eq!(outcome.status, OutcomeStatus::Completed);

        let record = fx
            .cache
            .get(&normalize_identifier("https://example.com/v"))
            .await
            .expect("cache entry written");
        assert_eq!(record.job_id, job_id);
        assert_eq!(record.ttl_secs, 3600);
    }

    #[tokio::test]
    async fn failure_records_outcome_without_cache_write_and_reclaims_dir() {
        let fx = fixture(3600);
        let job_id = uuid::Uuid::now_v7();
        deposit(&fx.artifacts, job_id, "partial.mp4");

        fx.coordinator
            .handle(JobEvent::Failed {
                job_id,
                error: "Producer timed out after 60000ms".into(),
                finished_at: Utc::now(),
            })
            .await;

        let outcome = fx.tracker.get(job_id).await.expect("outcome recorded");
        assert_eq!(outcome.status, OutcomeStatus::Failed);
        assert!(outcome.error.as_deref().unwrap().contains("timed out"));

        assert!(fx.cache.is_empty().await);
        assert!(!fx.artifacts.job_dir(job_id).exists());
    }

    #[tokio::test]
    async fn new_completion_for_same_key_reclaims_superseded_directory() {
        let fx = fixture(3600);
        let first = uuid::Uuid::now_v7();
        let second = uuid::Uuid::now_v7();
        deposit(&fx.artifacts, first, "v.mp4");
        deposit(&fx.artifacts, second, "v.mp4");

        for job_id in [first, second] {
            fx.coordinator
                .handle(JobEvent::Completed {
                    job_id,
                    identifier: "https://example.com/v".into(),
                    produced_files: vec!["v.mp4".into()],
                    finished_at: Utc::now(),
                })
                .await;
        }

        let record = fx
            .cache
            .get(&normalize_identifier("https://example.com/v"))
            .await
            .unwrap();
        assert_eq!(record.job_id, second);
        assert!(!fx.artifacts.job_dir(first).exists());
        assert!(fx.artifacts.job_dir(second).exists());
    }

    #[tokio::test]
    async fn run_consumes_events_from_the_bus() {
        let fx = fixture(3600);
        let bus = Arc::new(JobEventBus::default());
        let job_id = uuid::Uuid::now_v7();
        deposit(&fx.artifacts, job_id, "video.mp4");

        let tracker = Arc::clone(&fx.tracker);
        let handle = tokio::spawn(fx.coordinator.run(bus.subscribe()));

        bus.publish(JobEvent::Completed {
            job_id,
            identifier: "https://example.com/v".into(),
            produced_files: vec!["video.mp4".into()],
            finished_at: Utc::now(),
        });

        // Wait for the coordinator to apply the event.
        tokio::time::timeout(std::time::Duration::from_secs(5), async {
            while tracker.get(job_id).await.is_none() {
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("coordinator should record the outcome");

        drop(bus);
        handle.await.unwrap();
    }
}

//! Bounded-concurrency job queue and worker pool.
//!
//! [`JobQueue`] owns all job bookkeeping. Submissions are pushed onto an
//! unbounded channel (submission never blocks on execution) and consumed by
//! W worker tasks; the worker count is the only bound on simultaneous
//! producer invocations. Each job carries a child [`CancellationToken`] of
//! the queue's master token, so [`JobQueue::clear_all`] cancels exactly the
//! jobs it owns -- there is no per-process-name kill anywhere.
//!
//! Bookkeeping is bounded: terminal entries are pruned on the result
//! retention window ([`JobQueue::prune_terminal_older_than`], driven by the
//! janitor), while cumulative completed/failed counters keep
//! [`JobQueue::stats`] accurate across pruning.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use mediavault_cache::ArtifactStore;
use mediavault_core::{normalize_identifier, CacheKey, Job, JobId, JobState};
use mediavault_events::{JobEvent, JobEventBus};

use crate::producer::{Producer, ProducerError};

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Aggregate queue counters, one per job state plus the total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub queued: usize,
    pub active: usize,
    pub completed: usize,
    pub failed: usize,
    pub total: usize,
}

// ---------------------------------------------------------------------------
// JobQueue
// ---------------------------------------------------------------------------

/// Internal bookkeeping for a single job.
struct ManagedJob {
    job: Job,
    /// Per-job cancellation token (child of the master token).
    cancel: CancellationToken,
    /// Set when the job reaches a terminal state; terminal entries are
    /// pruned by the janitor once this is older than the retention window.
    finished_at: Option<DateTime<Utc>>,
}

/// Job queue and worker pool.
///
/// Created once at startup via [`JobQueue::start`]; the returned `Arc` is
/// cheaply cloneable into request handlers.
///
/// Lock ordering: `jobs` before `in_flight`, everywhere.
pub struct JobQueue {
    jobs: RwLock<HashMap<JobId, ManagedJob>>,
    /// Jobs currently queued or active, by cache key. A second submission
    /// for a key already in flight returns the existing job id instead of
    /// enqueueing duplicate work.
    in_flight: RwLock<HashMap<CacheKey, JobId>>,
    work_tx: mpsc::UnboundedSender<JobId>,
    artifacts: Arc<ArtifactStore>,
    producer: Arc<dyn Producer>,
    bus: Arc<JobEventBus>,
    producer_timeout: Duration,
    /// Master cancellation token -- cancelled during shutdown.
    cancel: CancellationToken,
    /// Cumulative terminal counters. The `jobs` map only holds entries
    /// until the janitor prunes them, so stats cannot be derived from it
    /// alone; these survive pruning and reset only on `clear_all`.
    completed_total: AtomicUsize,
    failed_total: AtomicUsize,
}

impl JobQueue {
    /// Spawn `concurrency` worker tasks and return the shared queue handle.
    pub fn start(
        concurrency: usize,
        producer_timeout: Duration,
        artifacts: Arc<ArtifactStore>,
        producer: Arc<dyn Producer>,
        bus: Arc<JobEventBus>,
    ) -> Arc<Self> {
        let (work_tx, work_rx) = mpsc::unbounded_channel();
        let queue = Arc::new(Self {
            jobs: RwLock::new(HashMap::new()),
            in_flight: RwLock::new(HashMap::new()),
            work_tx,
            artifacts,
            producer,
            bus,
            producer_timeout,
            cancel: CancellationToken::new(),
            completed_total: AtomicUsize::new(0),
            failed_total: AtomicUsize::new(0),
        });

        let work_rx = Arc::new(Mutex::new(work_rx));
        for worker in 0..concurrency.max(1) {
            let queue = Arc::clone(&queue);
            let work_rx = Arc::clone(&work_rx);
            tokio::spawn(async move {
                queue.worker_loop(worker, work_rx).await;
            });
        }

        queue
    }

    // -- submission ---------------------------------------------------------

    /// Enqueue a job for `identifier` and return its id.
    ///
    /// If a job for the same normalized identifier is already queued or
    /// active, that job's id is returned instead of creating a duplicate.
    /// Never blocks on job execution.
    pub async fn submit(&self, identifier: &str) -> JobId {
        let key = normalize_identifier(identifier);

        let mut jobs = self.jobs.write().await;
        let mut in_flight = self.in_flight.write().await;

        if let Some(&existing) = in_flight.get(&key) {
            tracing::info!(
                job_id = %existing,
                key = %key,
                "Submission deduplicated onto in-flight job",
            );
            return existing;
        }

        let job = Job::new(identifier.trim().to_string(), key.clone());
        let job_id = job.id;
        jobs.insert(
            job_id,
            ManagedJob {
                job,
                cancel: self.cancel.child_token(),
                finished_at: None,
            },
        );
        in_flight.insert(key, job_id);

        // Only fails when every worker is gone (shutdown); the job would
        // then be reaped by clear_all or the next startup sweep.
        let _ = self.work_tx.send(job_id);

        tracing::info!(job_id = %job_id, "Job queued");
        job_id
    }

    /// Current snapshot of a job's bookkeeping, if the queue still tracks
    /// it. Status queries use this as the fallback when the result tracker
    /// has no outcome yet.
    pub async fn get(&self, job_id: JobId) -> Option<Job> {
        self.jobs.read().await.get(&job_id).map(|m| m.job.clone())
    }

    // -- queue control ------------------------------------------------------

    /// Aggregate counters: live queued/active jobs plus cumulative
    /// completed/failed totals (which survive terminal-entry pruning).
    pub async fn stats(&self) -> QueueStats {
        let jobs = self.jobs.read().await;
        let mut stats = QueueStats {
            completed: self.completed_total.load(Ordering::Relaxed),
            failed: self.failed_total.load(Ordering::Relaxed),
            ..QueueStats::default()
        };
        for managed in jobs.values() {
            match managed.job.state {
                JobState::Queued => stats.queued += 1,
                JobState::Active => stats.active += 1,
                // Counted by the cumulative totals above.
                JobState::Completed | JobState::Failed => {}
            }
        }
        stats.total = stats.queued + stats.active + stats.completed + stats.failed;
        stats
    }

    /// Forcibly drop all job bookkeeping and cancel all in-flight work.
    ///
    /// Non-graceful by design: running producer processes are killed via
    /// their per-job cancellation tokens, queued work is abandoned, no
    /// terminal events are published for cancelled jobs, and the cumulative
    /// counters are reset. Returns the pre-clear counters.
    pub async fn clear_all(&self) -> QueueStats {
        let mut jobs = self.jobs.write().await;
        let mut in_flight = self.in_flight.write().await;

        let mut stats = QueueStats {
            completed: self.completed_total.swap(0, Ordering::Relaxed),
            failed: self.failed_total.swap(0, Ordering::Relaxed),
            ..QueueStats::default()
        };
        for managed in jobs.values() {
            match managed.job.state {
                JobState::Queued => stats.queued += 1,
                JobState::Active => stats.active += 1,
                JobState::Completed | JobState::Failed => {}
            }
            managed.cancel.cancel();
        }
        stats.total = stats.queued + stats.active + stats.completed + stats.failed;

        jobs.clear();
        in_flight.clear();

        tracing::warn!(
            cleared = stats.total,
            active_killed = stats.active,
            "Queue cleared; in-flight work abandoned",
        );
        stats
    }

    /// Drop terminal job entries that finished longer than `retention` ago.
    ///
    /// Driven by the background janitor on the same retention window as the
    /// result tracker, so the `jobs` map stays bounded by the submission
    /// rate within that window instead of growing for the process lifetime.
    /// Queued and active jobs are never touched. Returns the number pruned.
    pub async fn prune_terminal_older_than(&self, retention: chrono::Duration) -> usize {
        let cutoff = Utc::now() - retention;
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|_, managed| match managed.finished_at {
            Some(finished_at) => finished_at > cutoff,
            None => true,
        });
        before - jobs.len()
    }

    /// Stop all workers. Pending and running jobs are abandoned.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    // -- workers ------------------------------------------------------------

    async fn worker_loop(
        self: Arc<Self>,
        worker: usize,
        work_rx: Arc<Mutex<mpsc::UnboundedReceiver<JobId>>>,
    ) {
        tracing::debug!(worker, "Worker started");
        loop {
            let job_id = tokio::select! {
                _ = self.cancel.cancelled() => break,
                received = async { work_rx.lock().await.recv().await } => match received {
                    Some(id) => id,
                    None => break,
                },
            };
            self.run_job(worker, job_id).await;
        }
        tracing::debug!(worker, "Worker stopped");
    }

    /// Execute one job end to end and publish exactly one terminal event.
    async fn run_job(&self, worker: usize, job_id: JobId) {
        // Transition queued -> active and snapshot what the worker needs.
        let (identifier, key, job_cancel) = {
            let mut jobs = self.jobs.write().await;
            match jobs.get_mut(&job_id) {
                Some(managed) if managed.job.state == JobState::Queued => {
                    managed.job.state = JobState::Active;
                    (
                        managed.job.identifier.clone(),
                        managed.job.key.clone(),
                        managed.cancel.clone(),
                    )
                }
                Some(managed) => {
                    tracing::warn!(
                        job_id = %job_id,
                        state = managed.job.state.as_str(),
                        "Dequeued job not in queued state; skipping",
                    );
                    return;
                }
                // Cleared between enqueue and dequeue.
                None => return,
            }
        };

        tracing::info!(worker, job_id = %job_id, identifier = %identifier, "Job active");

        let dir = match self.artifacts.create_job_dir(job_id) {
            Ok(dir) => dir,
            Err(e) => {
                self.finish(
                    job_id,
                    &key,
                    &identifier,
                    Err(format!("Failed to create artifact directory: {e}")),
                )
                .await;
                return;
            }
        };

        let execution = tokio::select! {
            _ = job_cancel.cancelled() => {
                // clear_all already dropped the bookkeeping; the producer
                // child is killed when its future is dropped. Reclaim the
                // directory and publish nothing.
                if let Err(e) = self.artifacts.remove_job_dir(job_id) {
                    tracing::warn!(job_id = %job_id, error = %e, "Failed to reclaim cancelled job directory");
                }
                tracing::info!(worker, job_id = %job_id, "Job cancelled");
                return;
            }
            result = self.producer.execute(&identifier, &dir, self.producer_timeout) => result,
        };

        let outcome = match execution {
            Ok(()) => match self.artifacts.enumerate_files(job_id) {
                Ok(files) if files.is_empty() => Err(ProducerError::NoOutput.to_string()),
                Ok(files) => Ok(files),
                Err(e) => Err(format!("Failed to enumerate produced files: {e}")),
            },
            Err(e) => Err(e.to_string()),
        };

        self.finish(job_id, &key, &identifier, outcome).await;
    }

    /// Record the terminal state, release the in-flight slot, and publish
    /// the terminal event (strictly after the state transition).
    async fn finish(
        &self,
        job_id: JobId,
        key: &CacheKey,
        identifier: &str,
        outcome: Result<Vec<String>, String>,
    ) {
        let terminal = if outcome.is_ok() {
            JobState::Completed
        } else {
            JobState::Failed
        };

        {
            let mut jobs = self.jobs.write().await;
            let mut in_flight = self.in_flight.write().await;
            if let Some(managed) = jobs.get_mut(&job_id) {
                managed.job.state = terminal;
                managed.finished_at = Some(Utc::now());
                // Cleared jobs (absent from the map) were already counted
                // and discarded by clear_all; don't resurrect them here.
                match terminal {
                    JobState::Completed => {
                        self.completed_total.fetch_add(1, Ordering::Relaxed);
                    }
                    JobState::Failed => {
                        self.failed_total.fetch_add(1, Ordering::Relaxed);
                    }
                    _ => {}
                }
            }
            if in_flight.get(key) == Some(&job_id) {
                in_flight.remove(key);
            }
        }

        match outcome {
            Ok(produced_files) => {
                tracing::info!(
                    job_id = %job_id,
                    files = produced_files.len(),
                    "Job completed",
                );
                self.bus.publish(JobEvent::Completed {
                    job_id,
                    identifier: identifier.to_string(),
                    produced_files,
                    finished_at: Utc::now(),
                });
            }
            Err(error) => {
                tracing::warn!(job_id = %job_id, error = %error, "Job failed");
                self.bus.publish(JobEvent::Failed {
                    job_id,
                    error,
                    finished_at: Utc::now(),
                });
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Job model, state machine, and cache record types.
//!
//! A [`Job`] is one execution attempt of the external producer for a given
//! identifier. Its id is generated at submission time and is distinct from
//! the cache key -- several jobs may reference the same key over time.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::identity::CacheKey;

/// Unique identifier of a single job (UUIDv7, generated at submission).
pub type JobId = uuid::Uuid;

// ---------------------------------------------------------------------------
// Job state machine
// ---------------------------------------------------------------------------

/// Queued, waiting for a worker.
pub const STATE_QUEUED: &str = "queued";
/// Picked up by a worker; producer is running.
pub const STATE_ACTIVE: &str = "active";
/// Producer finished and deposited at least one file.
pub const STATE_COMPLETED: &str = "completed";
/// Producer failed, timed out, or produced no output.
pub const STATE_FAILED: &str = "failed";

/// All valid job states.
pub const VALID_STATES: &[&str] = &[STATE_QUEUED, STATE_ACTIVE, STATE_COMPLETED, STATE_FAILED];

/// Lifecycle state of a job: `Queued → Active → {Completed | Failed}`.
///
/// Terminal states are immutable; transitions are checked by
/// [`JobState::can_transition_to`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Queued,
    Active,
    Completed,
    Failed,
}

impl JobState {
    /// Return the wire string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => STATE_QUEUED,
            Self::Active => STATE_ACTIVE,
            Self::Completed => STATE_COMPLETED,
            Self::Failed => STATE_FAILED,
        }
    }

    /// Parse from a string, returning an error for unknown states.
    pub fn from_str(s: &str) -> Result<Self, CoreError> {
        match s {
            STATE_QUEUED => Ok(Self::Queued),
            STATE_ACTIVE => Ok(Self::Active),
            STATE_COMPLETED => Ok(Self::Completed),
            STATE_FAILED => Ok(Self::Failed),
            other => Err(CoreError::Validation(format!(
                "Unknown job state: '{other}'. Valid states: {}",
                VALID_STATES.join(", ")
            ))),
        }
    }

    /// Whether this state is terminal (`Completed` or `Failed`).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether a transition from `self` to `next` is legal.
    ///
    /// Terminal states never revert; `Queued` can only become `Active`,
    /// and `Active` can only become terminal.
    pub fn can_transition_to(&self, next: JobState) -> bool {
        match (self, next) {
            (Self::Queued, Self::Active) => true,
            (Self::Active, Self::Completed) | (Self::Active, Self::Failed) => true,
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

/// One execution attempt of the external producer.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: JobId,
    /// Raw identifier as the caller supplied it (passed to the producer).
    pub identifier: String,
    /// Normalized cache key derived from `identifier`.
    pub key: CacheKey,
    pub state: JobState,
    pub submitted_at: DateTime<Utc>,
}

impl Job {
    /// Create a new job in `Queued` state with a fresh UUIDv7 id.
    pub fn new(identifier: String, key: CacheKey) -> Self {
        Self {
            id: uuid::Uuid::now_v7(),
            identifier,
            key,
            state: JobState::Queued,
            submitted_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Job outcome
// ---------------------------------------------------------------------------

/// Terminal status carried by a [`JobOutcome`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Completed,
    Failed,
}

/// Terminal result of a job, held by the result tracker for status polling.
///
/// Independent of the cache: it exists for failed jobs too and is pruned
/// after a fixed retention window rather than the cache TTL.
#[derive(Debug, Clone, Serialize)]
pub struct JobOutcome {
    pub job_id: JobId,
    pub status: OutcomeStatus,
    /// Relative paths of produced files (completed jobs only).
    pub produced_files: Vec<String>,
    /// Human-readable execution error (failed jobs only).
    pub error: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl JobOutcome {
    /// Outcome for a successfully completed job.
    pub fn completed(job_id: JobId, produced_files: Vec<String>) -> Self {
        Self {
            job_id,
            status: OutcomeStatus::Completed,
            produced_files,
            error: None,
            recorded_at: Utc::now(),
        }
    }

    /// Outcome for a failed job.
    pub fn failed(job_id: JobId, error: impl Into<String>) -> Self {
        Self {
            job_id,
            status: OutcomeStatus::Failed,
            produced_files: Vec::new(),
            error: Some(error.into()),
            recorded_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Cache record
// ---------------------------------------------------------------------------

/// Cached result of a completed job.
///
/// Created only on successful completion. Valid only while every path in
/// `produced_files`, resolved under the job's artifact directory, exists on
/// disk. `cached_at + ttl` is the single source of truth for expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheRecord {
    pub key: CacheKey,
    /// Relative paths under `<artifact_root>/<job_id>/`, in enumeration order.
    pub produced_files: Vec<String>,
    pub job_id: JobId,
    pub cached_at: DateTime<Utc>,
    /// Time-to-live in whole seconds.
    pub ttl_secs: i64,
}

impl CacheRecord {
    pub fn new(key: CacheKey, produced_files: Vec<String>, job_id: JobId, ttl_secs: i64) -> Self {
        Self {
            key,
            produced_files,
            job_id,
            cached_at: Utc::now(),
            ttl_secs,
        }
    }

    /// Absolute expiry instant (`cached_at + ttl`).
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.cached_at + Duration::seconds(self.ttl_secs)
    }

    /// Whether the record is expired at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at()
    }

    /// Remaining TTL in seconds at `now` (zero if expired).
    pub fn remaining_ttl_secs(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at() - now).num_seconds().max(0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Handlers for queue statistics and the administrative clear operation.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use mediavault_queue::QueueStats;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

/// Response for GET /queue/stats.
#[derive(Debug, Serialize)]
pub struct QueueStatsResponse {
    pub waiting: usize,
    pub active: usize,
    pub completed: usize,
    pub failed: usize,
    pub total: usize,
}

impl From<QueueStats> for QueueStatsResponse {
    fn from(stats: QueueStats) -> Self {
        Self {
            waiting: stats.queued,
            active: stats.active,
            completed: stats.completed,
            failed: stats.failed,
            total: stats.total,
        }
    }
}

/// Response for DELETE /queue.
#[derive(Debug, Serialize)]
pub struct ClearQueueResponse {
    /// Counts as they were immediately before the clear.
    pub cleared: QueueStatsResponse,
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// GET /api/v1/queue/stats
pub async fn get_queue_stats(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let stats = state.queue.stats().await;
    Ok(Json(DataResponse {
        data: QueueStatsResponse::from(stats),
    }))
}

// ---------------------------------------------------------------------------
// Clear
// ---------------------------------------------------------------------------

/// DELETE /api/v1/queue
///
/// Destructive, non-graceful administrative operation: kills running
/// producer processes via their cancellation tokens, abandons queued work,
/// drops all job bookkeeping, and clears the result tracker. Returns the
/// pre-clear counts.
pub async fn clear_queue(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let cleared = state.queue.clear_all().await;
    let outcomes = state.tracker.clear().await;

    tracing::warn!(
        cleared_jobs = cleared.total,
        cleared_outcomes = outcomes,
        "Queue forcibly cleared",
    );

    Ok(Json(DataResponse {
        data: ClearQueueResponse {
            cleared: cleared.into(),
        },
    }))
}

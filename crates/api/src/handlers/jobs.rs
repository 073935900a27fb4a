//! Handlers for the `/jobs` resource (status polling).

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use mediavault_core::{CoreError, JobId, JobState, OutcomeStatus};

use crate::error::{AppError, AppResult};
use crate::handlers::{artifact_files, ArtifactFile};
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

/// Response for GET /jobs/{id}.
#[derive(Debug, Serialize)]
pub struct JobStatusResponse {
    pub job_id: JobId,
    pub status: JobState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<ArtifactFile>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// GET /api/v1/jobs/{id}
///
/// Report the best currently-known state of a job. The result tracker is
/// consulted first (terminal outcomes); if absent, the queue's own
/// bookkeeping covers jobs that are still queued or active. Never blocks
/// on an in-flight job. Unknown ids yield 404.
pub async fn get_job_status(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
) -> AppResult<impl IntoResponse> {
    if let Some(outcome) = state.tracker.get(job_id).await {
        let resp = match outcome.status {
            OutcomeStatus::Completed => JobStatusResponse {
                job_id,
                status: JobState::Completed,
                files: Some(artifact_files(
                    &state.config,
                    job_id,
                    &outcome.produced_files,
                )),
                error: None,
            },
            OutcomeStatus::Failed => JobStatusResponse {
                job_id,
                status: JobState::Failed,
                files: None,
                error: outcome.error,
            },
        };
        return Ok(Json(DataResponse { data: resp }));
    }

    let job = state
        .queue
        .get(job_id)
        .await
        .ok_or(AppError::Core(CoreError::JobNotFound(job_id)))?;

    Ok(Json(DataResponse {
        data: JobStatusResponse {
            job_id,
            status: job.state,
            files: None,
            error: None,
        },
    }))
}

//! Handlers for the `/downloads` resource.
//!
//! Submission is the only write path: the identifier is validated, the
//! cache consulted, and only on a miss does a job reach the queue. A cache
//! hit never touches the queue.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use mediavault_core::{normalize_identifier, validate_download_url, JobId};

use crate::error::AppResult;
use crate::handlers::{artifact_files, ArtifactFile};
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

/// Request body for POST /downloads.
#[derive(Debug, Deserialize)]
pub struct SubmitDownloadRequest {
    pub url: String,
}

/// Response for POST /downloads.
#[derive(Debug, Serialize)]
pub struct SubmitDownloadResponse {
    pub job_id: JobId,
    /// Whether the result was served from cache without queueing work.
    pub cached: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<ArtifactFile>>,
}

// ---------------------------------------------------------------------------
// Submit
// ---------------------------------------------------------------------------

/// POST /api/v1/downloads
///
/// Submit a download request. Returns 200 with the cached result when a
/// valid cache entry exists; otherwise 202 with the id of the queued job
/// (which may be an already-in-flight job for the same identifier).
/// Execution errors are never reported here -- only through status polling.
pub async fn submit_download(
    State(state): State<AppState>,
    Json(input): Json<SubmitDownloadRequest>,
) -> AppResult<impl IntoResponse> {
    validate_download_url(&input.url)?;
    let key = normalize_identifier(&input.url);

    if let Some(record) = state.cache.get(&key).await {
        tracing::info!(key = %key, job_id = %record.job_id, "Cache hit");
        let resp = SubmitDownloadResponse {
            job_id: record.job_id,
            cached: true,
            cached_at: Some(record.cached_at),
            files: Some(artifact_files(
                &state.config,
                record.job_id,
                &record.produced_files,
            )),
        };
        return Ok((StatusCode::OK, Json(DataResponse { data: resp })));
    }

    let job_id = state.queue.submit(&input.url).await;

    tracing::info!(job_id = %job_id, key = %key, "Download submitted");

    let resp = SubmitDownloadResponse {
        job_id,
        cached: false,
        cached_at: None,
        files: None,
    };
    Ok((StatusCode::ACCEPTED, Json(DataResponse { data: resp })))
}

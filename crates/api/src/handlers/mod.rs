//! HTTP request handlers, grouped by resource.

pub mod cache;
pub mod downloads;
pub mod jobs;
pub mod queue;

use serde::Serialize;

use mediavault_core::JobId;

use crate::config::ServerConfig;

/// One produced file of a job, with its public URL.
#[derive(Debug, Serialize)]
pub struct ArtifactFile {
    /// Path relative to the job's artifact directory.
    pub path: String,
    /// Absolute URL the file is served at.
    pub url: String,
}

/// Build the public URL for one produced file.
///
/// Artifact URLs combine the configured base address with the job id and
/// the relative produced-file path; the same layout is served statically
/// under `/artifacts`.
pub fn artifact_url(config: &ServerConfig, job_id: JobId, rel: &str) -> String {
    format!(
        "{}/artifacts/{job_id}/{rel}",
        config.public_base_url.trim_end_matches('/')
    )
}

/// Map produced-file paths to [`ArtifactFile`]s.
pub fn artifact_files(config: &ServerConfig, job_id: JobId, files: &[String]) -> Vec<ArtifactFile> {
    files
        .iter()
        .map(|rel| ArtifactFile {
            path: rel.clone(),
            url: artifact_url(config, job_id, rel),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

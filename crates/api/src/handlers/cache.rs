//! Handlers for cache inspection.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

use mediavault_core::CacheKey;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

/// One cache entry in the stats listing.
#[derive(Debug, Serialize)]
pub struct CacheEntryStats {
    pub key: CacheKey,
    /// Primary produced file (first in sorted order), if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    pub file_size_bytes: u64,
    pub cached_at: DateTime<Utc>,
    /// Remaining seconds until expiry.
    pub ttl_seconds: i64,
    pub expires_at: DateTime<Utc>,
}

/// Response for GET /cache/stats.
#[derive(Debug, Serialize)]
pub struct CacheStatsResponse {
    pub total_cached: usize,
    pub total_size_bytes: u64,
    /// Configured TTL applied to new entries, in days.
    pub ttl_days: f64,
    pub entries: Vec<CacheEntryStats>,
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// GET /api/v1/cache/stats
///
/// Snapshot of all live cache entries with sizes read from disk. Expired
/// entries are excluded; they are reclaimed by the janitor, not here.
pub async fn get_cache_stats(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let listed = state.cache.list_all().await;

    let mut total_size_bytes = 0u64;
    let mut entries = Vec::with_capacity(listed.len());
    for (record, remaining) in listed {
        let size = state
            .artifacts
            .total_size(record.job_id, &record.produced_files);
        total_size_bytes += size;
        entries.push(CacheEntryStats {
            file_name: record.produced_files.first().cloned(),
            file_size_bytes: size,
            cached_at: record.cached_at,
            ttl_seconds: remaining,
            expires_at: record.expires_at(),
            key: record.key,
        });
    }

    // Stable ordering for clients: newest first.
    entries.sort_by(|a, b| b.cached_at.cmp(&a.cached_at));

    Ok(Json(DataResponse {
        data: CacheStatsResponse {
            total_cached: entries.len(),
            total_size_bytes,
            ttl_days: state.config.cache_ttl_secs as f64 / 86_400.0,
            entries,
        },
    }))
}

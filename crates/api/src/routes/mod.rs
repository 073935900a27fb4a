pub mod health;

use axum::routing::{delete, get, post};
use axum::Router;

use crate::handlers;
use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /downloads          submit a download (POST)
/// /jobs/{id}          poll job status (GET)
/// /queue/stats        queue counters (GET)
/// /queue              force-clear everything (DELETE)
/// /cache/stats        cache inventory and sizes (GET)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/downloads", post(handlers::downloads::submit_download))
        .route("/jobs/{id}", get(handlers::jobs::get_job_status))
        .route("/queue/stats", get(handlers::queue::get_queue_stats))
        .route("/queue", delete(handlers::queue::clear_queue))
        .route("/cache/stats", get(handlers::cache::get_cache_stats))
}

use std::sync::Arc;

use mediavault_cache::{ArtifactStore, CacheStore};
use mediavault_queue::{JobQueue, ResultTracker};

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration (TTL, concurrency, public base URL).
    pub config: Arc<ServerConfig>,
    /// Result cache keyed by normalized identifier.
    pub cache: Arc<CacheStore>,
    /// On-disk artifact directory store.
    pub artifacts: Arc<ArtifactStore>,
    /// Job queue and worker pool.
    pub queue: Arc<JobQueue>,
    /// Terminal outcome tracker for status polling.
    pub tracker: Arc<ResultTracker>,
}

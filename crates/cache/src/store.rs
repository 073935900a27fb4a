//! TTL result cache keyed by normalized identifier.
//!
//! Backing store is an in-memory map guarded by an async `RwLock`; expiry
//! is computed lazily from `cached_at + ttl` on every read, so the map can
//! never serve an entry past its TTL even if the janitor is behind.
//!
//! NOTE: [`CacheStore::get`] mutates -- an entry found expired, or whose
//! backing files are missing from disk, is removed (and its artifact
//! directory reclaimed) before `None` is returned. This self-healing is
//! part of the contract, not a side effect to be relied on elsewhere.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;

use mediavault_core::{CacheKey, CacheRecord};

use crate::artifacts::ArtifactStore;

/// Concurrency-safe cache of completed download results.
///
/// Shared via `Arc<CacheStore>` between the submission path, the completion
/// coordinator, the janitor, and the stats handlers.
pub struct CacheStore {
    entries: RwLock<HashMap<CacheKey, CacheRecord>>,
    artifacts: Arc<ArtifactStore>,
}

impl CacheStore {
    pub fn new(artifacts: Arc<ArtifactStore>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            artifacts,
        }
    }

    /// Look up a valid cache record for `key`.
    ///
    /// Returns `None` -- after removing the entry and reclaiming its
    /// directory -- when the record is expired or any backing file is gone
    /// (stale). Stale entries are never surfaced to callers.
    pub async fn get(&self, key: &CacheKey) -> Option<CacheRecord> {
        let record = self.entries.read().await.get(key).cloned()?;

        if record.is_expired(Utc::now()) {
            tracing::debug!(key = %key, job_id = %record.job_id, "Cache entry expired on read");
            self.remove_and_reclaim(key, &record).await;
            return None;
        }

        if !self
            .artifacts
            .files_exist(record.job_id, &record.produced_files)
        {
            tracing::warn!(
                key = %key,
                job_id = %record.job_id,
                "Cache entry stale (backing files missing); invalidating",
            );
            self.remove_and_reclaim(key, &record).await;
            return None;
        }

        Some(record)
    }

    /// Insert `record`, overwriting any existing entry for its key.
    ///
    /// Returns the superseded record, if any, so the caller can reclaim
    /// the old job's artifact directory (the old record is no longer
    /// reachable from the cache once overwritten).
    pub async fn put(&self, record: CacheRecord) -> Option<CacheRecord> {
        let mut entries = self.entries.write().await;
        entries.insert(record.key.clone(), record)
    }

    /// Snapshot all non-expired entries with their remaining TTL in seconds.
    ///
    /// Read-only: expired entries are skipped, not removed (the janitor and
    /// `get` handle removal).
    pub async fn list_all(&self) -> Vec<(CacheRecord, i64)> {
        let now = Utc::now();
        self.entries
            .read()
            .await
            .values()
            .filter(|r| !r.is_expired(now))
            .map(|r| (r.clone(), r.remaining_ttl_secs(now)))
            .collect()
    }

    /// Explicitly remove the entry for `key`, returning it if present.
    ///
    /// Does not touch the artifact directory; callers that need reclamation
    /// do it against the returned record.
    pub async fn invalidate(&self, key: &CacheKey) -> Option<CacheRecord> {
        self.entries.write().await.remove(key)
    }

    /// Remove and return every expired record.
    ///
    /// Driven by the background janitor, which deletes the returned
    /// records' artifact directories in the same pass -- keeping cache
    /// expiry and artifact deletion on the single `cached_at + ttl` clock.
    pub async fn evict_expired(&self) -> Vec<CacheRecord> {
        let now = Utc::now();
        let mut entries = self.entries.write().await;
        let expired_keys: Vec<CacheKey> = entries
            .iter()
            .filter(|(_, r)| r.is_expired(now))
            .map(|(k, _)| k.clone())
            .collect();

        expired_keys
            .into_iter()
            .filter_map(|k| entries.remove(&k))
            .collect()
    }

    /// Number of non-expired entries.
    pub async fn len(&self) -> usize {
        let now = Utc::now();
        self.entries
            .read()
            .await
            .values()
            .filter(|r| !r.is_expired(now))
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Remove the entry and best-effort delete its artifact directory.
    ///
    /// `get` releases its read lock before calling this, so a fresh record
    /// for the same key may have landed in between; removal is keyed on the
    /// job id so only the record we actually found stale is dropped.
    async fn remove_and_reclaim(&self, key: &CacheKey, record: &CacheRecord) {
        {
            let mut entries = self.entries.write().await;
            match entries.get(key) {
                Some(current) if current.job_id == record.job_id => {
                    entries.remove(key);
                }
                // Superseded or already removed; nothing of ours to drop.
                _ => return,
            }
        }
        if let Err(e) = self.artifacts.remove_job_dir(record.job_id) {
            tracing::warn!(
                job_id = %record.job_id,
                error = %e,
                "Failed to remove artifact directory for invalidated cache entry",
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

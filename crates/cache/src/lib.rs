//! Result cache and artifact directory lifecycle.
//!
//! [`CacheStore`] maps normalized cache keys to cached download results;
//! [`ArtifactStore`] owns the on-disk directories backing those results.
//! Expiry is computed lazily from `cached_at + ttl` -- there are no
//! per-entry deletion timers; the API crate's janitor task drives periodic
//! eviction and the startup sweep reclaims directories orphaned by
//! restarts.

pub mod artifacts;
pub mod store;

pub use artifacts::ArtifactStore;
pub use store::CacheStore;

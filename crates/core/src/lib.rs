//! Domain types shared across the mediavault workspace.
//!
//! This crate has no internal dependencies. It defines the error taxonomy,
//! identifier validation and cache-key normalization, and the job / cache
//! record model that every other crate builds on.

pub mod error;
pub mod identity;
pub mod job;

pub use error::CoreError;
pub use identity::{normalize_identifier, validate_download_url, CacheKey};
pub use job::{CacheRecord, Job, JobId, JobOutcome, JobState, OutcomeStatus};

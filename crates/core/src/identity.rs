//! Download identifier validation and cache-key normalization.
//!
//! The cache key is the canonical identity of a download request: two raw
//! identifiers that normalize identically hit the same cache entry. The
//! normalization here must be the only way a [`CacheKey`] is ever derived --
//! the submission path and every read path go through [`normalize_identifier`]
//! so hit/miss symmetry cannot break.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// CacheKey
// ---------------------------------------------------------------------------

/// Canonical, normalized form of a download identifier.
///
/// Only constructable via [`normalize_identifier`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Derive the canonical cache key for a raw identifier.
///
/// Pure and deterministic: surrounding whitespace is trimmed and the result
/// is case-folded. Idempotent -- normalizing an already-normalized value is
/// a no-op.
pub fn normalize_identifier(raw: &str) -> CacheKey {
    CacheKey(raw.trim().to_lowercase())
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate that a download URL is non-empty and uses an http(s) scheme.
///
/// Runs before normalization; a rejected identifier never creates a job.
pub fn validate_download_url(url: &str) -> Result<(), CoreError> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation(
            "Download URL must not be empty".to_string(),
        ));
    }
    if !trimmed.starts_with("http://") && !trimmed.starts_with("https://") {
        return Err(CoreError::Validation(format!(
            "Download URL must start with http:// or https://, got: '{trimmed}'"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // -- normalize_identifier -------------------------------------------------

    #[test]
    fn normalization_trims_and_folds_case() {
        assert_eq!(
            normalize_identifier("  https://Example.COM/Video  "),
            normalize_identifier("https://example.com/video")
        );
    }

    #[test]
    fn normalization_is_idempotent() {
        let once = normalize_identifier(" https://A.example/X ");
        let twice = normalize_identifier(once.as_str());
        assert_eq!(once, twice);
    }

    #[test]
    fn distinct_identifiers_produce_distinct_keys() {
        assert_ne!(
            normalize_identifier("https://example.com/a"),
            normalize_identifier("https://example.com/b")
        );
    }

    #[test]
    fn cache_key_displays_normalized_form() {
        let key = normalize_identifier("  HTTPS://Example.com/clip ");
        assert_eq!(key.to_string(), "https://example.com/clip");
    }

    // -- validate_download_url ------------------------------------------------

    #[test]
    fn valid_urls_accepted() {
        assert!(validate_download_url("https://example.com/watch?v=abc").is_ok());
        assert!(validate_download_url("http://example.com/file").is_ok());
    }

    #[test]
    fn empty_url_rejected() {
        assert!(validate_download_url("").is_err());
        assert!(validate_download_url("   ").is_err());
    }

    #[test]
    fn non_http_url_rejected() {
        assert!(validate_download_url("ftp://example.com/file").is_err());
        assert!(validate_download_url("just-a-string").is_err());
    }
}

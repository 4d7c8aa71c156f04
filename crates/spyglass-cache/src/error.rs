//! Error types for the spyglass-cache crate.

use thiserror::Error;

/// Errors that can occur against a cache backend.
///
/// A missing key is never an error: lookups report it through
/// [`RetrieveStatus::KeyMiss`](crate::RetrieveStatus::KeyMiss) so callers
/// can branch on category rather than message text. The error variants
/// cover the two remaining categories: the caller handed the cache
/// something unusable, or the cached representation itself is broken.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The payload does not serialize, or the cached entry holds a
    /// different type than the destination.
    #[error("invalid cache input for key {key:?}: {message}")]
    InvalidInput {
        /// The cache key the operation targeted.
        key: String,
        /// What was wrong with the input.
        message: String,
    },

    /// The cached representation cannot be decoded.
    #[error("unrecognized cached representation for key {key:?}: {message}")]
    Internal {
        /// The cache key the operation targeted.
        key: String,
        /// Why decoding failed.
        message: String,
    },
}

/// Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_invalid_input() {
        let err = CacheError::InvalidInput {
            key: "range:abc".to_string(),
            message: "type mismatch".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid cache input for key \"range:abc\": type mismatch"
        );
    }

    #[test]
    fn error_display_internal() {
        let err = CacheError::Internal {
            key: "range:abc".to_string(),
            message: "truncated payload".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "unrecognized cached representation for key \"range:abc\": truncated payload"
        );
    }
}

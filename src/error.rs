//! Error types for the cache core
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for cache, dedup and warming operations.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key is absent or its TTL has elapsed
    #[error("Key not found: {0}")]
    NotFound(String),

    /// The owning store task is not running or the call timed out
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// The update function panicked; the entry was left unchanged
    #[error("Update failed: {0}")]
    UpdateFailed(String),

    /// Key does not follow the `namespace:entity:id` format
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Value could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CacheError {
    /// Returns true for the non-exceptional "absent or expired" case.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CacheError::NotFound(_))
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache core.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            CacheError::NotFound("esi:character:1".into()).to_string(),
            "Key not found: esi:character:1"
        );
        assert_eq!(
            CacheError::StoreUnavailable("main".into()).to_string(),
            "Store unavailable: main"
        );
    }

    #[test]
    fn test_serialization_from_serde() {
        let err = serde_json::from_str::<u32>("not json").unwrap_err();
        let err: CacheError = err.into();
        assert!(matches!(err, CacheError::Serialization(_)));
        assert!(!err.is_not_found());
    }
}

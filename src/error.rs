//! Error types shared by the feed core.

use thiserror::Error;

/// Result alias for feed core operations.
pub type Result<T> = std::result::Result<T, FeedError>;

/// Failure reported by a [`crate::store::KvStore`] backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("value at {key} is not an integer: {value}")]
    NotAnInteger { key: String, value: String },
    #[error("store error: {0}")]
    Other(String),
}

/// Errors surfaced by the feed core to its callers.
#[derive(Debug, Error)]
pub enum FeedError {
    /// Unknown forum/feed name or malformed cursor. Nothing was mutated.
    #[error("invalid request: {0}")]
    Validation(String),

    /// Missing post, or a feed that has not been built yet.
    #[error("not found: {0}")]
    NotFound(String),

    /// A counter, field-map or set operation failed.
    #[error(transparent)]
    Storage(#[from] StoreError),

    /// Snapshot construction failed; the previous snapshot is kept.
    #[error("rebuild of feed {feed} failed: {message}")]
    Rebuild { feed: String, message: String },

    /// A freshly allocated id already has a stored record.
    #[error("integrity violation: {0}")]
    Integrity(String),

    /// A stored record could not be decoded.
    #[error("corrupt record {key}: {message}")]
    Corrupt { key: String, message: String },
}

impl FeedError {
    pub(crate) fn corrupt(key: &str, message: impl Into<String>) -> Self {
        Self::Corrupt {
            key: key.to_string(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_is_transparent() {
        let err: FeedError = StoreError::Other("connection reset".to_string()).into();
        assert_eq!(err.to_string(), "store error: connection reset");
    }

    #[test]
    fn test_rebuild_message() {
        let err = FeedError::Rebuild {
            feed: "Fun".to_string(),
            message: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "rebuild of feed Fun failed: boom");
    }
}

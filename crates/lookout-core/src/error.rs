//! Error types for Lookout core operations.
//!
//! This module defines the error hierarchy for all core operations.
//! Errors are descriptive at the core level; the CLI layer maps these
//! to user-friendly messages and exit codes.

use thiserror::Error;
use uuid::Uuid;

/// Result type alias for Lookout operations.
pub type Result<T> = std::result::Result<T, LookoutError>;

/// Core error type for Lookout operations.
#[derive(Debug, Error)]
pub enum LookoutError {
    /// Bad search name or filter shape; rejected before anything is written
    #[error("Validation error: {0}")]
    Validation(String),

    /// Saved search not found by ID
    #[error("Saved search not found: {0}")]
    NotFound(Uuid),

    /// Caller does not own the saved search
    #[error("User {user_id} is not allowed to modify saved search {search_id}")]
    Unauthorized { search_id: Uuid, user_id: String },

    /// The listing index could not answer a query (transient)
    #[error("Listing index unavailable: {0}")]
    IndexUnavailable(String),

    /// Storage backend error (generic)
    #[error("Storage error: {0}")]
    Storage(String),

    /// SQLite-specific storage error
    #[error("SQLite error: {source}")]
    Sqlite {
        #[from]
        source: rusqlite::Error,
    },

    /// JSON serialization/deserialization error
    #[error("JSON error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    /// I/O error
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl LookoutError {
    /// Whether the failure is transient and the operation should be retried later.
    pub fn is_transient(&self) -> bool {
        matches!(self, LookoutError::IndexUnavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_index_unavailable_is_transient() {
        assert!(LookoutError::IndexUnavailable("down".to_string()).is_transient());
        assert!(!LookoutError::Validation("bad".to_string()).is_transient());
        assert!(!LookoutError::NotFound(Uuid::new_v4()).is_transient());
    }

    #[test]
    fn test_unauthorized_message_names_both_parties() {
        let search_id = Uuid::new_v4();
        let err = LookoutError::Unauthorized {
            search_id,
            user_id: "mallory".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("mallory"));
        assert!(message.contains(&search_id.to_string()));
    }
}

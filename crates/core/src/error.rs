//! Error types for the CCOM domain.
//!
//! Storage failures are carried across the keeper boundary inside an
//! [`Outcome`](crate::outcome::Outcome). Configuration errors live in
//! `ccom-config`.

use std::path::PathBuf;
use thiserror::Error;

/// Failures of the SQLite context store.
#[derive(Debug, Clone, Error)]
pub enum MemoryError {
    #[error("Context store unavailable at {path}: {reason}")]
    Unavailable { path: PathBuf, reason: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Serialization failed: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for MemoryError {
    fn from(e: serde_json::Error) -> Self {
        MemoryError::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_error_names_the_path() {
        let err = MemoryError::Unavailable {
            path: PathBuf::from("/readonly/.ccom/context.db"),
            reason: "permission denied".into(),
        };
        assert!(err.to_string().contains("/readonly/.ccom/context.db"));
        assert!(err.to_string().contains("permission denied"));
    }

    #[test]
    fn serde_errors_convert_to_memory_errors() {
        let bad = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: MemoryError = bad.into();
        assert!(matches!(err, MemoryError::Serialization(_)));
    }
}

//! Error types for the replica store.

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in the replica store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Underlying SQLite error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A stored JSON column failed to parse.
    #[error("corrupt column data: {0}")]
    CorruptColumn(#[from] serde_json::Error),

    /// A stored timestamp failed to parse as RFC 3339.
    #[error("invalid timestamp {value:?}: {source}")]
    InvalidTimestamp {
        /// The offending text.
        value: String,
        /// Parse failure.
        source: chrono::ParseError,
    },

    /// No row exists for the given identifier.
    #[error("no event with id {0}")]
    NotFound(String),
}

impl StoreError {
    /// Creates an invalid-timestamp error.
    pub fn invalid_timestamp(value: impl Into<String>, source: chrono::ParseError) -> Self {
        Self::InvalidTimestamp {
            value: value.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = StoreError::NotFound("a1".into());
        assert_eq!(err.to_string(), "no event with id a1");
    }
}

//! Server error types.

use localndr_protocol::ChangeError;
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors produced while handling a write-back request.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The change-set failed validation; nothing was applied.
    #[error("Invalid changes: {0}")]
    Invalid(#[from] ChangeError),

    /// The batch was valid but could not be applied; the transaction
    /// rolled back.
    #[error("Failed to apply changes: {0}")]
    Apply(#[from] rusqlite::Error),

    /// Anything else.
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Returns true if the client sent something the server will never
    /// accept (HTTP 400).
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Invalid(_))
    }

    /// HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        if self.is_client_error() {
            400
        } else {
            500
        }
    }
}

//! Error types for the sync engine.

use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The initial snapshot could not be established.
    ///
    /// Terminal for this engine instance; recovery is a restart.
    #[error("bootstrap failed: {0}")]
    Bootstrap(String),

    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// The write-back endpoint rejected the batch as invalid (HTTP 400).
    #[error("changes rejected: {0}")]
    ApplyRejected(String),

    /// The write-back endpoint failed to apply the batch (HTTP 500).
    #[error("changes failed to apply: {0}")]
    ApplyFailed(String),

    /// Local store error during sync.
    #[error("store error: {0}")]
    Store(#[from] localndr_replica::StoreError),

    /// A change-set failed validation before it went on the wire.
    #[error("invalid change-set: {0}")]
    Change(#[from] localndr_protocol::ChangeError),

    /// Protocol error (unparseable response or message).
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl SyncError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if a later attempt could succeed.
    ///
    /// Rejected batches (400) carry data the server will never accept,
    /// so retrying the same payload is pointless; apply failures (500)
    /// and retryable transport faults are worth another attempt once
    /// something dirties the table again.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { retryable, .. } => *retryable,
            Self::ApplyFailed(_) => true,
            Self::Bootstrap(_)
            | Self::ApplyRejected(_)
            | Self::Store(_)
            | Self::Change(_)
            | Self::Protocol(_) => false,
        }
    }
}

//! Error types for the store module.

use thiserror::Error;

use sealnote_escrow::EscrowCryptoError;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Handle serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Resource or blob not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// The write raced another writer (e.g., resource id already taken).
    #[error("conflict: {0}")]
    Conflict(String),

    /// The input proof does not cover the submission.
    #[error("invalid input proof: {0}")]
    InvalidProof(String),

    /// Invalid data in storage or in a request.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),
}

impl From<EscrowCryptoError> for StoreError {
    fn from(e: EscrowCryptoError) -> Self {
        match e {
            EscrowCryptoError::InvalidProof(msg) | EscrowCryptoError::ContextMismatch(msg) => {
                StoreError::InvalidProof(msg)
            }
            EscrowCryptoError::SerializationError(msg) => StoreError::Serialization(msg),
            other => StoreError::InvalidData(other.to_string()),
        }
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

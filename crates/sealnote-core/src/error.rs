//! Error types for Sealnote Core.

use thiserror::Error;

/// Errors raised by core primitives.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("decoding error: {0}")]
    DecodingError(String),

    /// Chunks could not be reassembled into a key.
    #[error("incomplete key chunks: {missing} of {total} missing")]
    IncompleteChunks { missing: usize, total: usize },

    #[error("invalid payload locator: {0}")]
    InvalidLocator(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

//! Error types for the escrow scheme.

use thiserror::Error;

/// Errors that can occur while sealing, opening, or proving handles.
#[derive(Debug, Error)]
pub enum EscrowCryptoError {
    /// Sealing a chunk to the network key failed.
    #[error("sealing error: {0}")]
    Sealing(String),

    /// A handle could not be opened with the network secret.
    #[error("handle could not be opened")]
    Opening,

    /// An opened handle did not carry a well-formed value.
    #[error("malformed handle payload: {0}")]
    MalformedPayload(String),

    /// The input proof does not cover the submitted handles.
    #[error("invalid input proof: {0}")]
    InvalidProof(String),

    /// A handle's context does not match where it is being stored.
    #[error("handle context mismatch: {0}")]
    ContextMismatch(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// Core error.
    #[error("core error: {0}")]
    CoreError(#[from] sealnote_core::CoreError),
}

/// Result type for escrow operations.
pub type Result<T> = std::result::Result<T, EscrowCryptoError>;

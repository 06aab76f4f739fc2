//! Error types for the oracle module.

use thiserror::Error;

use crate::messages::DenialCode;

/// Errors that can occur while talking to the decryption oracle.
#[derive(Debug, Error)]
pub enum OracleError {
    /// Transport failure or timeout. Worth retrying later.
    #[error("oracle unavailable: {0}")]
    Unavailable(String),

    /// The oracle refused the request, or answered with something that does
    /// not conform to the reply schema.
    #[error("oracle rejected request: {0}")]
    Rejected(String),

    /// The authorization could not be built.
    #[error("invalid authorization: {0}")]
    InvalidAuthorization(#[from] AuthorizationError),

    /// Batch exceeds the per-request handle limit.
    #[error("too many handles: {count} (max {max})")]
    TooManyHandles { count: usize, max: usize },

    /// Message encoding error.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Store operation failed (oracle side).
    #[error("store error: {0}")]
    StoreError(#[from] sealnote_store::StoreError),
}

/// Reasons a decryption authorization is not acceptable.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthorizationError {
    #[error("bad signature")]
    BadSignature,

    #[error("not valid until {start}, now {now}")]
    NotYetValid { start: i64, now: i64 },

    #[error("expired at {expires_at}, now {now}")]
    Expired { expires_at: i64, now: i64 },

    /// Validity must be between 1 and the maximum number of days.
    #[error("invalid duration: {0} days")]
    InvalidDuration(u32),

    #[error("no context addresses")]
    EmptyContext,

    #[error("encoding error: {0}")]
    Encoding(String),
}

impl AuthorizationError {
    /// The wire code an oracle answers with.
    pub fn code(&self) -> DenialCode {
        match self {
            Self::BadSignature => DenialCode::BadSignature,
            Self::NotYetValid { .. } => DenialCode::NotYetValid,
            Self::Expired { .. } => DenialCode::Expired,
            Self::InvalidDuration(_) | Self::EmptyContext | Self::Encoding(_) => {
                DenialCode::MalformedRequest
            }
        }
    }
}

/// Result type for oracle operations.
pub type Result<T> = std::result::Result<T, OracleError>;

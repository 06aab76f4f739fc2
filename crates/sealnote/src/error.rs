//! Error types for the escrow engine.

use sealnote_core::ResourceRef;
use sealnote_escrow::{CipherError, EscrowCryptoError};
use sealnote_oracle::OracleError;
use sealnote_store::StoreError;
use thiserror::Error;

/// Errors that can occur during engine operations.
#[derive(Debug, Error)]
pub enum EscrowError {
    /// The payload did not authenticate under the reconstructed key.
    ///
    /// Typical after the owner re-keyed the note with a content update.
    #[error("payload failed authentication under the recovered key")]
    CipherAuthenticationFailure,

    /// The oracle could not be reached in time. Retrying may help.
    #[error("oracle unavailable: {0}")]
    OracleUnavailable(String),

    /// The oracle refused the request or answered out of schema.
    #[error("oracle rejected request: {0}")]
    OracleRejected(String),

    /// The oracle answered, but not with usable key material.
    #[error("oracle returned no usable key material: {0}")]
    OracleDecryptionFailure(String),

    #[error("resource {resource} is already shared with {grantee}")]
    AlreadyShared {
        resource: ResourceRef,
        grantee: sealnote_core::PrincipalId,
    },

    #[error("resource {resource} is not shared with {grantee}")]
    NotShared {
        resource: ResourceRef,
        grantee: sealnote_core::PrincipalId,
    },

    /// Sharing with oneself or with a malformed key.
    #[error("invalid grantee: {0}")]
    InvalidGrantee(String),

    /// No capability for the caller. Also returned for missing resources and
    /// for resources the caller does not own.
    #[error("capability not found: {0}")]
    CapabilityNotFound(String),

    /// No session is connected.
    #[error("not connected")]
    NotConnected,

    /// The operation needs the resource unlocked first.
    #[error("resource {0} is locked")]
    Locked(ResourceRef),

    /// Categories are 0 through 7.
    #[error("invalid category: {0}")]
    InvalidCategory(u64),

    /// Blob store failure.
    #[error("blob store error: {0}")]
    Blob(StoreError),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(StoreError),

    /// Sealing or proof failure.
    #[error("escrow error: {0}")]
    Escrow(#[from] EscrowCryptoError),
}

impl From<StoreError> for EscrowError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(what) => Self::CapabilityNotFound(what),
            other => Self::Store(other),
        }
    }
}

impl From<OracleError> for EscrowError {
    fn from(e: OracleError) -> Self {
        match e {
            OracleError::Unavailable(reason) => Self::OracleUnavailable(reason),
            OracleError::StoreError(e) => Self::Store(e),
            other => Self::OracleRejected(other.to_string()),
        }
    }
}

impl From<CipherError> for EscrowError {
    fn from(e: CipherError) -> Self {
        match e {
            CipherError::AuthenticationFailure => Self::CipherAuthenticationFailure,
            CipherError::EncryptionFailed => {
                Self::Escrow(EscrowCryptoError::Sealing(e.to_string()))
            }
        }
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EscrowError>;

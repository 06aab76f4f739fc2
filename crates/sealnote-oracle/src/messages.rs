//! Oracle wire message types.
//!
//! A request carries a batch of sealed handles, the resources they belong
//! to, and one signed authorization. The reply either maps handle ids to
//! cleartext values or denies the whole request. Both travel as CBOR.

use serde::{Deserialize, Serialize};

use sealnote_core::ResourceRef;
use sealnote_escrow::{EncryptedChunkHandle, HandleId};

use crate::authorization::DecryptionAuthorization;
use crate::error::{OracleError, Result};

/// Current protocol version.
pub const PROTOCOL_VERSION: u8 = 1;

/// Message size limits.
pub mod limits {
    /// Max handles in one request.
    pub const MAX_HANDLES_PER_REQUEST: usize = 64;
    /// Max resources named by one authorization.
    pub const MAX_CONTEXT_ADDRESSES: usize = 64;
    /// Max bytes of a denial reason.
    pub const MAX_DENIAL_REASON: usize = 256;
}

/// A batched decryption request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleRequest {
    /// Protocol version for compatibility checking.
    pub protocol_version: u8,
    /// The handles to decrypt, in the caller's order.
    pub handles: Vec<EncryptedChunkHandle>,
    /// Resources the handles belong to.
    pub context_addresses: Vec<ResourceRef>,
    /// Requester's signed, time-bounded authorization.
    pub authorization: DecryptionAuthorization,
}

impl OracleRequest {
    /// Check if this request respects size limits.
    pub fn validate_limits(&self) -> std::result::Result<(), &'static str> {
        if self.handles.is_empty() {
            return Err("no handles");
        }
        if self.handles.len() > limits::MAX_HANDLES_PER_REQUEST {
            return Err("too many handles");
        }
        if self.context_addresses.len() > limits::MAX_CONTEXT_ADDRESSES {
            return Err("too many context addresses");
        }
        Ok(())
    }

    /// Serialize to CBOR bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        to_cbor(self)
    }

    /// Deserialize from CBOR bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        from_cbor(bytes)
    }
}

/// One decrypted value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptedValue {
    pub handle: HandleId,
    pub value: u64,
}

/// The oracle's answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OracleReply {
    /// Values for the handles the requester may read. Handles the requester
    /// is not authorized for are absent.
    Decrypted { values: Vec<DecryptedValue> },

    /// The whole request was refused.
    Denied {
        /// Error code for programmatic handling.
        code: DenialCode,
        /// Human-readable description.
        reason: String,
    },
}

impl OracleReply {
    /// Build a denial, truncating the reason to the wire limit.
    pub fn denied(code: DenialCode, reason: impl Into<String>) -> Self {
        let mut reason = reason.into();
        if reason.len() > limits::MAX_DENIAL_REASON {
            let mut cut = limits::MAX_DENIAL_REASON;
            while !reason.is_char_boundary(cut) {
                cut -= 1;
            }
            reason.truncate(cut);
        }
        Self::Denied { code, reason }
    }

    /// Serialize to CBOR bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        to_cbor(self)
    }

    /// Deserialize from CBOR bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        from_cbor(bytes)
    }
}

/// Why an oracle denied a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u16)]
pub enum DenialCode {
    /// Protocol version mismatch.
    VersionMismatch = 1,
    /// Request could not be parsed or violates limits.
    MalformedRequest = 2,
    /// Authorization signature does not verify.
    BadSignature = 3,
    /// Authorization window has not started.
    NotYetValid = 4,
    /// Authorization window has passed.
    Expired = 5,
    /// A handle belongs to a resource the authorization does not name.
    ContextMismatch = 6,
    /// Internal error on the oracle.
    InternalError = 7,
}

fn to_cbor<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).map_err(|e| OracleError::Encoding(e.to_string()))?;
    Ok(buf)
}

fn from_cbor<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    ciborium::from_reader(bytes).map_err(|e| OracleError::Encoding(e.to_string()))
}

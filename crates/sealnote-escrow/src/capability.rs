//! Capability records.
//!
//! A capability is a read-only right for one grantee to request decryption
//! of one resource's key chunks. The owner holds a self-capability from the
//! moment the resource is created; every other grantee gets its own fresh
//! handle set, never a copy of the owner's.

use serde::{Deserialize, Serialize};

use sealnote_core::{PrincipalId, ResourceRef, CHUNK_COUNT};

use crate::error::{EscrowCryptoError, Result};
use crate::handle::{EncryptedChunkHandle, HandleId};
use crate::input::EncryptedInput;

/// The four handles of one key, in chunk order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkHandles([EncryptedChunkHandle; CHUNK_COUNT]);

impl ChunkHandles {
    pub fn new(handles: [EncryptedChunkHandle; CHUNK_COUNT]) -> Self {
        Self(handles)
    }

    /// Take the handles out of a verified key submission.
    pub fn from_input(input: EncryptedInput) -> Result<Self> {
        let len = input.handles.len();
        let handles: [EncryptedChunkHandle; CHUNK_COUNT] =
            input.handles.try_into().map_err(|_| {
                EscrowCryptoError::ContextMismatch(format!(
                    "expected {} handles, got {}",
                    CHUNK_COUNT, len
                ))
            })?;
        Ok(Self(handles))
    }

    pub fn iter(&self) -> impl Iterator<Item = &EncryptedChunkHandle> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[EncryptedChunkHandle] {
        &self.0
    }

    /// Handle ids in chunk order.
    pub fn ids(&self) -> [HandleId; CHUNK_COUNT] {
        std::array::from_fn(|i| self.0[i].id())
    }
}

/// One grantee's decrypt right on one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capability {
    pub resource: ResourceRef,
    /// Always the resource owner.
    pub grantor: PrincipalId,
    pub grantee: PrincipalId,
    pub handles: ChunkHandles,
    /// Unix milliseconds.
    pub created_at: i64,
}

impl Capability {
    /// True for the owner's own capability.
    pub fn is_self(&self) -> bool {
        self.grantor == self.grantee
    }
}

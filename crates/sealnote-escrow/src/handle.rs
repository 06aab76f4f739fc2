//! Encrypted chunk handles.
//!
//! A handle is one `u64` sealed to the oracle network's X25519 key: an
//! ephemeral public key, a nonce, and the ChaCha20-Poly1305 ciphertext of
//! the value's eight big-endian bytes. The [`HandleContext`] naming the
//! resource, the authorized party and the chunk position is carried in clear
//! and bound as associated data, so a handle cannot be replayed under a
//! different context.

use serde::{Deserialize, Serialize};
use std::fmt;

use sealnote_core::{domain_hash, Blake3Hash, PrincipalId, ResourceRef, CHUNK_WIDTH};

use crate::crypto::{EphemeralKeyPair, NetworkPublicKey, NetworkSecret, SealNonce};
use crate::error::{EscrowCryptoError, Result};

const HANDLE_ID_DOMAIN: &str = "sealnote-escrow v1 handle id";

/// Length of a context's fixed-width encoding.
pub const CONTEXT_LEN: usize = 32 + 8 + 32 + 1 + 1;

/// What a sealed value is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HandlePurpose {
    /// One of the four chunks of a content key.
    KeyChunk,
    /// The resource's category value.
    Category,
}

impl HandlePurpose {
    fn code(self) -> u8 {
        match self {
            Self::KeyChunk => 0,
            Self::Category => 1,
        }
    }
}

/// Binding context of a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HandleContext {
    /// The resource the value belongs to.
    pub resource: ResourceRef,
    /// The principal allowed to request decryption.
    pub party: PrincipalId,
    /// Chunk position (always 0 for a category).
    pub position: u8,
    pub purpose: HandlePurpose,
}

impl HandleContext {
    /// Context for key chunk `position` of `resource`, authorized for `party`.
    pub fn key_chunk(resource: ResourceRef, party: PrincipalId, position: u8) -> Self {
        Self {
            resource,
            party,
            position,
            purpose: HandlePurpose::KeyChunk,
        }
    }

    /// Context for the category of `resource`, authorized for `party`.
    pub fn category(resource: ResourceRef, party: PrincipalId) -> Self {
        Self {
            resource,
            party,
            position: 0,
            purpose: HandlePurpose::Category,
        }
    }

    /// Fixed-width encoding used as associated data.
    pub fn to_bytes(&self) -> [u8; CONTEXT_LEN] {
        let mut out = [0u8; CONTEXT_LEN];
        out[..32].copy_from_slice(self.resource.owner.as_bytes());
        out[32..40].copy_from_slice(&self.resource.id.get().to_be_bytes());
        out[40..72].copy_from_slice(self.party.as_bytes());
        out[72] = self.position;
        out[73] = self.purpose.code();
        out
    }
}

/// Content-derived identifier of a handle.
///
/// Keys ACL rows and oracle replies.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HandleId(pub Blake3Hash);

impl HandleId {
    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        self.0.as_bytes()
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        self.0.to_hex()
    }
}

impl fmt::Debug for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HandleId({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex()[..16])
    }
}

/// One value sealed to the oracle network key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedChunkHandle {
    /// Binding context, in clear.
    pub context: HandleContext,

    /// Ephemeral X25519 public key (sender's side of ECDH).
    pub ephemeral_public: NetworkPublicKey,

    /// Nonce used for encryption.
    pub nonce: SealNonce,

    /// The value's big-endian bytes, encrypted with the derived wrap key.
    pub ciphertext: Vec<u8>,
}

impl EncryptedChunkHandle {
    /// Seal `value` to the network key under `context`.
    pub fn seal(value: u64, context: HandleContext, network: &NetworkPublicKey) -> Result<Self> {
        let ephemeral = EphemeralKeyPair::generate();
        let ephemeral_public = ephemeral.public_key();
        let wrap_key = ephemeral
            .diffie_hellman(network)
            .derive_wrap_key(&ephemeral_public, network);

        let nonce = SealNonce::generate();
        let ciphertext = wrap_key.seal(&value.to_be_bytes(), &context.to_bytes(), &nonce)?;

        Ok(Self {
            context,
            ephemeral_public,
            nonce,
            ciphertext,
        })
    }

    /// Open the handle with the network secret.
    ///
    /// Only the oracle holds the secret; everyone else sees an opaque value.
    pub fn open(&self, secret: &NetworkSecret) -> Result<u64> {
        let network = secret.public_key();
        let wrap_key = secret
            .diffie_hellman(&self.ephemeral_public)
            .derive_wrap_key(&self.ephemeral_public, &network);

        let plaintext = wrap_key.open(&self.ciphertext, &self.context.to_bytes(), &self.nonce)?;
        let bytes: [u8; CHUNK_WIDTH] = plaintext.as_slice().try_into().map_err(|_| {
            EscrowCryptoError::MalformedPayload(format!(
                "expected {} bytes, got {}",
                CHUNK_WIDTH,
                plaintext.len()
            ))
        })?;
        Ok(u64::from_be_bytes(bytes))
    }

    /// The handle's content-derived id.
    pub fn id(&self) -> HandleId {
        HandleId(domain_hash(
            HANDLE_ID_DOMAIN,
            &[
                &self.context.to_bytes(),
                self.ephemeral_public.as_bytes(),
                self.nonce.as_bytes(),
                &self.ciphertext,
            ],
        ))
    }

    /// Serialize to CBOR bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf)
            .map_err(|e| EscrowCryptoError::SerializationError(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize from CBOR bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ciborium::from_reader(bytes)
            .map_err(|e| EscrowCryptoError::SerializationError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sealnote_core::{Keypair, ResourceId};

    fn context(position: u8) -> HandleContext {
        let owner = Keypair::from_seed(&[1; 32]).principal();
        HandleContext::key_chunk(ResourceRef::new(owner, ResourceId(3)), owner, position)
    }

    #[test]
    fn test_seal_open_roundtrip() {
        let network = NetworkSecret::generate();
        let handle =
            EncryptedChunkHandle::seal(0xdead_beef_0000_0001, context(2), &network.public_key())
                .unwrap();
        assert_eq!(handle.open(&network).unwrap(), 0xdead_beef_0000_0001);
    }

    #[test]
    fn test_wrong_network_secret_fails() {
        let network = NetworkSecret::generate();
        let handle = EncryptedChunkHandle::seal(7, context(0), &network.public_key()).unwrap();
        assert!(handle.open(&NetworkSecret::generate()).is_err());
    }

    #[test]
    fn test_context_is_bound() {
        let network = NetworkSecret::generate();
        let mut handle = EncryptedChunkHandle::seal(7, context(0), &network.public_key()).unwrap();
        handle.context.position = 1;
        assert!(matches!(
            handle.open(&network),
            Err(EscrowCryptoError::Opening)
        ));
    }

    #[test]
    fn test_same_value_gives_distinct_handles() {
        let network = NetworkSecret::generate().public_key();
        let a = EncryptedChunkHandle::seal(42, context(0), &network).unwrap();
        let b = EncryptedChunkHandle::seal(42, context(0), &network).unwrap();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_cbor_roundtrip_preserves_id() {
        let network = NetworkSecret::generate().public_key();
        let handle = EncryptedChunkHandle::seal(42, context(1), &network).unwrap();
        let recovered = EncryptedChunkHandle::from_bytes(&handle.to_bytes().unwrap()).unwrap();
        assert_eq!(handle, recovered);
        assert_eq!(handle.id(), recovered.id());
    }
}

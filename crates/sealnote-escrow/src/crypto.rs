//! Key agreement primitives for sealing handles to the oracle network.
//!
//! Provides X25519 key agreement and ChaCha20-Poly1305 authenticated
//! encryption with associated data.

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Nonce,
};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use x25519_dalek::{EphemeralSecret, PublicKey, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{EscrowCryptoError, Result};

const WRAP_KEY_CONTEXT: &str = "sealnote-escrow v1 handle wrap key";

/// The oracle network's X25519 public key. Handles are sealed to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NetworkPublicKey(pub [u8; 32]);

impl NetworkPublicKey {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    fn to_dalek(self) -> PublicKey {
        PublicKey::from(self.0)
    }
}

impl From<PublicKey> for NetworkPublicKey {
    fn from(pk: PublicKey) -> Self {
        Self(*pk.as_bytes())
    }
}

/// The oracle network's X25519 secret.
///
/// Held only by the oracle. x25519-dalek zeroes it on drop.
pub struct NetworkSecret(StaticSecret);

impl NetworkSecret {
    /// Generate a new random secret.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        let secret = Self(StaticSecret::from(bytes));
        bytes.zeroize();
        secret
    }

    /// Create from seed bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(StaticSecret::from(bytes))
    }

    /// Derive the public key.
    pub fn public_key(&self) -> NetworkPublicKey {
        NetworkPublicKey::from(PublicKey::from(&self.0))
    }

    pub(crate) fn diffie_hellman(&self, peer: &NetworkPublicKey) -> SharedKey {
        let shared = self.0.diffie_hellman(&peer.to_dalek());
        SharedKey(*shared.as_bytes())
    }
}

impl std::fmt::Debug for NetworkSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NetworkSecret({:?})", self.public_key())
    }
}

/// A shared secret derived from X25519 key agreement.
#[derive(Zeroize, ZeroizeOnDrop)]
pub(crate) struct SharedKey([u8; 32]);

impl SharedKey {
    /// Derive the wrap key for one sealed handle.
    ///
    /// Both public halves go into the derivation so a wrap key is bound to
    /// exactly one (ephemeral, network) pairing.
    pub(crate) fn derive_wrap_key(
        &self,
        ephemeral: &NetworkPublicKey,
        network: &NetworkPublicKey,
    ) -> WrapKey {
        let mut hasher = blake3::Hasher::new_derive_key(WRAP_KEY_CONTEXT);
        hasher.update(&self.0);
        hasher.update(ephemeral.as_bytes());
        hasher.update(network.as_bytes());
        WrapKey(*hasher.finalize().as_bytes())
    }
}

/// Single-use ChaCha20-Poly1305 key that wraps one chunk.
#[derive(Zeroize, ZeroizeOnDrop)]
pub(crate) struct WrapKey([u8; 32]);

impl WrapKey {
    pub(crate) fn seal(&self, plaintext: &[u8], aad: &[u8], nonce: &SealNonce) -> Result<Vec<u8>> {
        let cipher = ChaCha20Poly1305::new_from_slice(&self.0)
            .map_err(|e| EscrowCryptoError::Sealing(e.to_string()))?;

        cipher
            .encrypt(Nonce::from_slice(&nonce.0), Payload { msg: plaintext, aad })
            .map_err(|e| EscrowCryptoError::Sealing(e.to_string()))
    }

    pub(crate) fn open(&self, ciphertext: &[u8], aad: &[u8], nonce: &SealNonce) -> Result<Vec<u8>> {
        let cipher =
            ChaCha20Poly1305::new_from_slice(&self.0).map_err(|_| EscrowCryptoError::Opening)?;

        cipher
            .decrypt(Nonce::from_slice(&nonce.0), Payload { msg: ciphertext, aad })
            .map_err(|_| EscrowCryptoError::Opening)
    }
}

/// A 96-bit nonce for ChaCha20-Poly1305.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SealNonce(pub [u8; 12]);

impl SealNonce {
    /// Generate a new random nonce.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 12];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 12] {
        &self.0
    }
}

/// Ephemeral key pair for one-time key agreement.
pub(crate) struct EphemeralKeyPair {
    secret: EphemeralSecret,
    public: NetworkPublicKey,
}

impl EphemeralKeyPair {
    pub(crate) fn generate() -> Self {
        let secret = EphemeralSecret::random_from_rng(rand::thread_rng());
        let public = NetworkPublicKey::from(PublicKey::from(&secret));
        Self { secret, public }
    }

    pub(crate) fn public_key(&self) -> NetworkPublicKey {
        self.public
    }

    /// Consumes the ephemeral secret (can only be used once).
    pub(crate) fn diffie_hellman(self, peer: &NetworkPublicKey) -> SharedKey {
        let shared = self.secret.diffie_hellman(&peer.to_dalek());
        SharedKey(*shared.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ephemeral_key_agreement() {
        let network = NetworkSecret::generate();
        let network_public = network.public_key();

        let ephemeral = EphemeralKeyPair::generate();
        let ephemeral_public = ephemeral.public_key();

        let sender = ephemeral.diffie_hellman(&network_public);
        let receiver = network.diffie_hellman(&ephemeral_public);

        assert_eq!(sender.0, receiver.0);
    }

    #[test]
    fn test_wrap_key_binds_aad() {
        let wrap = SharedKey([0x42; 32])
            .derive_wrap_key(&NetworkPublicKey([1; 32]), &NetworkPublicKey([2; 32]));
        let nonce = SealNonce::generate();

        let sealed = wrap.seal(b"chunk", b"context-a", &nonce).unwrap();
        assert_eq!(wrap.open(&sealed, b"context-a", &nonce).unwrap(), b"chunk");
        assert!(wrap.open(&sealed, b"context-b", &nonce).is_err());
    }

    #[test]
    fn test_wrap_key_derivation_separates_pairings() {
        let shared = SharedKey([0x42; 32]);
        let a = shared.derive_wrap_key(&NetworkPublicKey([1; 32]), &NetworkPublicKey([2; 32]));
        let b = shared.derive_wrap_key(&NetworkPublicKey([1; 32]), &NetworkPublicKey([3; 32]));
        assert_ne!(a.0, b.0);
    }

    #[test]
    fn test_network_secret_deterministic_from_seed() {
        let a = NetworkSecret::from_bytes([9; 32]).public_key();
        let b = NetworkSecret::from_bytes([9; 32]).public_key();
        assert_eq!(a, b);
    }
}

//! Payload cipher for note content.
//!
//! Output layout is `nonce (12) || ciphertext || tag (16)`. Each call to
//! [`encrypt`] draws a fresh nonce, so encrypting the same plaintext twice
//! under one key yields different blobs.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Key, Nonce,
};
use thiserror::Error;

use sealnote_core::SymmetricKey;

use crate::crypto::SealNonce;

/// Nonce length in bytes.
pub const NONCE_LEN: usize = 12;

/// Poly1305 tag length in bytes.
pub const TAG_LEN: usize = 16;

/// Errors from the payload cipher.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CipherError {
    /// Wrong key, corrupted blob, or truncated blob.
    #[error("authentication failure")]
    AuthenticationFailure,

    /// The AEAD refused the plaintext (length limit).
    #[error("encryption failed")]
    EncryptionFailed,
}

/// Generate a fresh content key.
pub fn generate_key() -> SymmetricKey {
    SymmetricKey::generate()
}

/// Encrypt `plaintext` under `key`.
pub fn encrypt(plaintext: &[u8], key: &SymmetricKey) -> Result<Vec<u8>, CipherError> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));
    let nonce = SealNonce::generate();

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(nonce.as_bytes()), plaintext)
        .map_err(|_| CipherError::EncryptionFailed)?;

    let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    blob.extend_from_slice(nonce.as_bytes());
    blob.extend_from_slice(&ciphertext);
    Ok(blob)
}

/// Decrypt a blob produced by [`encrypt`].
pub fn decrypt(blob: &[u8], key: &SymmetricKey) -> Result<Vec<u8>, CipherError> {
    if blob.len() < NONCE_LEN + TAG_LEN {
        return Err(CipherError::AuthenticationFailure);
    }
    let (nonce, ciphertext) = blob.split_at(NONCE_LEN);

    let cipher = ChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| CipherError::AuthenticationFailure)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_encrypt_layout() {
        let key = generate_key();
        let blob = encrypt(b"hello world", &key).unwrap();
        assert_eq!(blob.len(), NONCE_LEN + 11 + TAG_LEN);
    }

    #[test]
    fn test_fresh_nonce_per_call() {
        let key = generate_key();
        let a = encrypt(b"same", &key).unwrap();
        let b = encrypt(b"same", &key).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_wrong_key_fails() {
        let blob = encrypt(b"secret", &generate_key()).unwrap();
        assert_eq!(
            decrypt(&blob, &generate_key()),
            Err(CipherError::AuthenticationFailure)
        );
    }

    #[test]
    fn test_truncated_blob_fails() {
        let key = generate_key();
        let blob = encrypt(b"", &key).unwrap();
        assert_eq!(blob.len(), NONCE_LEN + TAG_LEN);
        assert!(decrypt(&blob, &key).unwrap().is_empty());

        for len in 0..blob.len() {
            assert_eq!(
                decrypt(&blob[..len], &key),
                Err(CipherError::AuthenticationFailure)
            );
        }
    }

    proptest! {
        #[test]
        fn prop_roundtrip(plaintext in proptest::collection::vec(any::<u8>(), 0..512)) {
            let key = generate_key();
            let blob = encrypt(&plaintext, &key).unwrap();
            let decrypted = decrypt(&blob, &key).unwrap();
            prop_assert_eq!(decrypted, plaintext);
        }

        #[test]
        fn prop_single_byte_tamper_detected(
            plaintext in proptest::collection::vec(any::<u8>(), 0..128),
            index in any::<prop::sample::Index>(),
            flip in 1u8..=255,
        ) {
            let key = generate_key();
            let mut blob = encrypt(&plaintext, &key).unwrap();
            let i = index.index(blob.len());
            blob[i] ^= flip;
            prop_assert_eq!(decrypt(&blob, &key), Err(CipherError::AuthenticationFailure));
        }
    }
}

//! Key chunk codec.
//!
//! A [`SymmetricKey`] is escrowed as four independently encrypted `u64`
//! chunks. Chunk `i` is bytes `8*i..8*i+8` of the key read big-endian, so
//! `split` and `join` are a bijection between 32-byte keys and `[u64; 4]`.

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{CoreError, Result};
use crate::key::{SymmetricKey, KEY_LEN};

/// Number of chunks a key is split into.
pub const CHUNK_COUNT: usize = 4;

/// Width of one chunk in bytes.
pub const CHUNK_WIDTH: usize = KEY_LEN / CHUNK_COUNT;

/// What to do when the oracle answers some, but not all, chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingChunkPolicy {
    /// Fail reconstruction unless every chunk is present.
    #[default]
    Reject,
    /// Substitute zero for each missing chunk.
    ZeroFill,
}

/// The four positional chunks of a [`SymmetricKey`].
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct KeyChunks([u64; CHUNK_COUNT]);

impl KeyChunks {
    /// Split a key into big-endian chunks.
    pub fn split(key: &SymmetricKey) -> Self {
        let bytes = key.as_bytes();
        let mut chunks = [0u64; CHUNK_COUNT];
        for (i, chunk) in chunks.iter_mut().enumerate() {
            let mut group = [0u8; CHUNK_WIDTH];
            group.copy_from_slice(&bytes[i * CHUNK_WIDTH..(i + 1) * CHUNK_WIDTH]);
            *chunk = u64::from_be_bytes(group);
        }
        Self(chunks)
    }

    /// Reassemble the key.
    pub fn join(&self) -> SymmetricKey {
        let mut bytes = [0u8; KEY_LEN];
        for (i, chunk) in self.0.iter().enumerate() {
            bytes[i * CHUNK_WIDTH..(i + 1) * CHUNK_WIDTH].copy_from_slice(&chunk.to_be_bytes());
        }
        let key = SymmetricKey::from_bytes(bytes);
        bytes.zeroize();
        key
    }

    /// Wrap raw chunk values.
    pub const fn from_values(values: [u64; CHUNK_COUNT]) -> Self {
        Self(values)
    }

    /// Build chunks from positional oracle answers.
    pub fn from_partial(values: &[Option<u64>], policy: MissingChunkPolicy) -> Result<Self> {
        if values.len() != CHUNK_COUNT {
            return Err(CoreError::IncompleteChunks {
                missing: CHUNK_COUNT.saturating_sub(values.len()),
                total: CHUNK_COUNT,
            });
        }

        let missing = values.iter().filter(|v| v.is_none()).count();
        if missing > 0 && policy == MissingChunkPolicy::Reject {
            return Err(CoreError::IncompleteChunks {
                missing,
                total: CHUNK_COUNT,
            });
        }

        let mut chunks = [0u64; CHUNK_COUNT];
        for (slot, value) in chunks.iter_mut().zip(values) {
            *slot = value.unwrap_or(0);
        }
        Ok(Self(chunks))
    }

    /// The chunk values in positional order.
    pub fn values(&self) -> &[u64; CHUNK_COUNT] {
        &self.0
    }
}

impl std::fmt::Debug for KeyChunks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("KeyChunks(<redacted>)")
    }
}

/// True when an oracle answer carries nothing usable.
///
/// Every value absent or zero. A genuine all-zero key is negligible, so such
/// an answer is treated as an oracle or transport failure.
pub fn is_blank(values: &[Option<u64>]) -> bool {
    values.iter().all(|v| matches!(v, None | Some(0)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_split_is_big_endian() {
        let mut bytes = [0u8; KEY_LEN];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = i as u8;
        }
        let chunks = KeyChunks::split(&SymmetricKey::from_bytes(bytes));
        assert_eq!(chunks.values()[0], 0x0001_0203_0405_0607);
        assert_eq!(chunks.values()[3], 0x1819_1a1b_1c1d_1e1f);
    }

    #[test]
    fn test_partial_reject() {
        let values = [Some(1), None, Some(3), Some(4)];
        let err = KeyChunks::from_partial(&values, MissingChunkPolicy::Reject).unwrap_err();
        assert!(matches!(err, CoreError::IncompleteChunks { missing: 1, total: 4 }));
    }

    #[test]
    fn test_partial_zero_fill() {
        let chunks =
            KeyChunks::from_partial(&[Some(1), None, Some(3), None], MissingChunkPolicy::ZeroFill)
                .unwrap();
        assert_eq!(chunks.values(), &[1, 0, 3, 0]);
    }

    #[test]
    fn test_partial_wrong_arity() {
        assert!(KeyChunks::from_partial(&[Some(1)], MissingChunkPolicy::ZeroFill).is_err());
    }

    #[test]
    fn test_blank_detection() {
        assert!(is_blank(&[None, None, None, None]));
        assert!(is_blank(&[Some(0), None, Some(0), None]));
        assert!(!is_blank(&[None, Some(9), None, None]));
    }

    proptest! {
        #[test]
        fn prop_join_split_roundtrip(bytes in any::<[u8; 32]>()) {
            let key = SymmetricKey::from_bytes(bytes);
            let rejoined = KeyChunks::split(&key).join();
            prop_assert_eq!(*rejoined.as_bytes(), bytes);
        }

        #[test]
        fn prop_split_join_roundtrip(values in any::<[u64; 4]>()) {
            let key = KeyChunks::from_values(values).join();
            let resplit = KeyChunks::split(&key);
            prop_assert_eq!(*resplit.values(), values);
        }
    }
}

//! Golden vectors for the key chunk codec.
//!
//! Any implementation that escrows keys with the same oracle network must
//! split keys identically, or a grantee would rebuild the wrong key. These
//! vectors pin the big-endian chunk layout.

use serde::{Deserialize, Serialize};

use sealnote_core::{KeyChunks, SymmetricKey, CHUNK_COUNT, KEY_LEN};

/// A golden chunk-codec vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoldenVector {
    /// Human-readable name for the vector.
    pub name: String,
    /// The 32-byte key, hex.
    pub key: String,
    /// Expected chunks, each as 16 hex digits.
    pub chunks: [String; CHUNK_COUNT],
}

impl GoldenVector {
    fn new(name: &str, key: &str, chunks: [&str; CHUNK_COUNT]) -> Self {
        Self {
            name: name.to_string(),
            key: key.to_string(),
            chunks: chunks.map(String::from),
        }
    }

    /// Decode the key bytes.
    pub fn key(&self) -> Result<SymmetricKey, String> {
        let bytes = hex::decode(&self.key).map_err(|e| format!("{}: {}", self.name, e))?;
        let bytes: [u8; KEY_LEN] = bytes
            .try_into()
            .map_err(|_| format!("{}: key is not {} bytes", self.name, KEY_LEN))?;
        Ok(SymmetricKey::from_bytes(bytes))
    }

    /// Decode the expected chunk values.
    pub fn chunk_values(&self) -> Result<[u64; CHUNK_COUNT], String> {
        let mut values = [0u64; CHUNK_COUNT];
        for (slot, chunk) in values.iter_mut().zip(&self.chunks) {
            *slot = u64::from_str_radix(chunk, 16).map_err(|e| format!("{}: {}", self.name, e))?;
        }
        Ok(values)
    }
}

/// Get all golden vectors.
pub fn all_vectors() -> Vec<GoldenVector> {
    vec![
        GoldenVector::new(
            "all zero",
            "0000000000000000000000000000000000000000000000000000000000000000",
            ["0000000000000000"; CHUNK_COUNT],
        ),
        GoldenVector::new(
            "all ones",
            "ffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff",
            ["ffffffffffffffff"; CHUNK_COUNT],
        ),
        GoldenVector::new(
            "counting bytes",
            "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f",
            [
                "0001020304050607",
                "08090a0b0c0d0e0f",
                "1011121314151617",
                "18191a1b1c1d1e1f",
            ],
        ),
        GoldenVector::new(
            "high bit of each chunk",
            "8000000000000000800000000000000080000000000000008000000000000000",
            ["8000000000000000"; CHUNK_COUNT],
        ),
        GoldenVector::new(
            "last byte only",
            "0000000000000000000000000000000000000000000000000000000000000001",
            [
                "0000000000000000",
                "0000000000000000",
                "0000000000000000",
                "0000000000000001",
            ],
        ),
    ]
}

/// Export the vectors as pretty JSON for other implementations.
pub fn vectors_json() -> serde_json::Result<String> {
    serde_json::to_string_pretty(&all_vectors())
}

/// Check every vector in both directions.
///
/// Returns one `(name, passed)` pair per vector. A vector that cannot be
/// decoded counts as failed.
pub fn verify_all_vectors() -> Vec<(String, bool)> {
    all_vectors()
        .into_iter()
        .map(|v| {
            let passed = match (v.key(), v.chunk_values()) {
                (Ok(key), Ok(expected)) => {
                    let chunks = KeyChunks::split(&key);
                    *chunks.values() == expected
                        && KeyChunks::from_values(expected).join() == key
                }
                _ => false,
            };
            (v.name, passed)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_vectors_pass() {
        for (name, passed) in verify_all_vectors() {
            assert!(passed, "vector '{}' failed", name);
        }
    }

    #[test]
    fn test_json_export_parses_back() {
        let json = vectors_json().unwrap();
        let parsed: Vec<GoldenVector> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, all_vectors());
    }

    #[test]
    fn test_bad_vector_fails() {
        let bad = GoldenVector::new(
            "swapped",
            "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f",
            [
                "08090a0b0c0d0e0f",
                "0001020304050607",
                "1011121314151617",
                "18191a1b1c1d1e1f",
            ],
        );
        let key = bad.key().unwrap();
        assert_ne!(*KeyChunks::split(&key).values(), bad.chunk_values().unwrap());
    }
}

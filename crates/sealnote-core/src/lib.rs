//! # Sealnote Core
//!
//! Pure primitives for Sealnote: identities, identifiers, symmetric key
//! chunking, and canonical encoding.
//!
//! This crate contains no I/O, no storage, no networking. It is pure computation
//! over the data structures every other Sealnote crate shares.
//!
//! ## Key Types
//!
//! - [`PrincipalId`] - An Ed25519 public key naming an owner or grantee
//! - [`Keypair`] - The signing identity of a connected session
//! - [`ResourceRef`] - `(owner, id)` address of a note
//! - [`SymmetricKey`] - A 256-bit content key, zeroed on drop
//! - [`KeyChunks`] - The four big-endian `u64` chunks of a [`SymmetricKey`]
//!
//! ## Chunking
//!
//! ```rust
//! use sealnote_core::{KeyChunks, SymmetricKey};
//!
//! let key = SymmetricKey::generate();
//! let chunks = KeyChunks::split(&key);
//! assert_eq!(chunks.join().as_bytes(), key.as_bytes());
//! ```

pub mod canonical;
pub mod chunk;
pub mod crypto;
pub mod error;
pub mod key;
pub mod types;

pub use canonical::{canonical_encode, domain_hash, int_map};
pub use chunk::{is_blank, KeyChunks, MissingChunkPolicy, CHUNK_COUNT, CHUNK_WIDTH};
pub use crypto::{Blake3Hash, Ed25519Signature, Keypair, PrincipalId};
pub use error::{CoreError, Result};
pub use key::{SymmetricKey, KEY_LEN};
pub use types::{now_millis, PayloadLocator, ResourceId, ResourceRef};

//! # Sealnote Escrow
//!
//! The escrow scheme: how content keys are kept without ever being stored
//! in the clear.
//!
//! ## Overview
//!
//! A note's content is encrypted with a fresh [`SymmetricKey`](sealnote_core::SymmetricKey)
//! by the payload [`cipher`]. The key is split into four chunks and each
//! chunk is sealed to the oracle network's X25519 key as an
//! [`EncryptedChunkHandle`], bound to the resource and the party allowed to
//! ask for it. Only the oracle can open a handle, and it only does so for a
//! principal the capability store authorizes.
//!
//! ## Key Concepts
//!
//! - **Handle**: one sealed `u64`, addressed by its content-derived [`HandleId`]
//! - **InputProof**: a signed binding over the handles of one submission
//! - **Capability**: a grantee's four handles for one resource
//!
//! ## Usage
//!
//! ```rust
//! use sealnote_core::{KeyChunks, Keypair, ResourceId, ResourceRef};
//! use sealnote_escrow::{cipher, ChunkHandles, EncryptedInput, NetworkSecret};
//!
//! let owner = Keypair::generate();
//! let network = NetworkSecret::generate();
//! let resource = ResourceRef::new(owner.principal(), ResourceId::FIRST);
//!
//! let key = cipher::generate_key();
//! let blob = cipher::encrypt(b"hello world", &key).unwrap();
//!
//! let input = EncryptedInput::seal_key(
//!     &owner,
//!     resource,
//!     owner.principal(),
//!     &KeyChunks::split(&key),
//!     &network.public_key(),
//! )
//! .unwrap();
//! let handles = ChunkHandles::from_input(input).unwrap();
//!
//! // Only the network secret opens the handles.
//! let values: Vec<u64> = handles.iter().map(|h| h.open(&network).unwrap()).collect();
//! let recovered = KeyChunks::from_values(values.try_into().unwrap()).join();
//! assert_eq!(cipher::decrypt(&blob, &recovered).unwrap(), b"hello world");
//! ```

pub mod capability;
pub mod cipher;
pub mod crypto;
pub mod error;
pub mod handle;
pub mod input;

pub use capability::{Capability, ChunkHandles};
pub use cipher::CipherError;
pub use crypto::{NetworkPublicKey, NetworkSecret, SealNonce};
pub use error::{EscrowCryptoError, Result};
pub use handle::{EncryptedChunkHandle, HandleContext, HandleId, HandlePurpose};
pub use input::{key_chunk_contexts, EncryptedInput, InputProof};

//! # Sealnote
//!
//! Encrypted notes whose keys are escrowed behind a decryption oracle.
//!
//! ## Overview
//!
//! - **Notes** are encrypted client-side under a fresh key on every save
//! - **Keys** are split into four chunks, each sealed to the oracle network
//!   for one authorized party
//! - **Capabilities** record which party holds which sealed chunks
//! - **Sharing** re-seals the key for a grantee; revoking deletes the grant
//!
//! ## Key Concepts
//!
//! - **Self-capability**: The owner's own handles, replaced on every save.
//! - **Grant**: At most one per `(resource, grantee)`. Revocation is final.
//! - **Unlocked**: A decrypted key and plaintext cached in the session only.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use sealnote::{EngineConfig, EscrowEngine};
//! use sealnote::core::{Keypair, ResourceRef};
//! use sealnote::escrow::NetworkSecret;
//! use sealnote::oracle::{memory::ChannelTransport, LocalOracle};
//! use sealnote::store::{MemoryBlobStore, MemoryStore};
//!
//! async fn example() -> sealnote::Result<()> {
//!     let store = Arc::new(MemoryStore::new());
//!     let oracle = Arc::new(LocalOracle::new(store.clone(), NetworkSecret::generate()));
//!     let network = oracle.network_key();
//!
//!     let engine = EscrowEngine::new(
//!         store,
//!         Arc::new(MemoryBlobStore::new()),
//!         ChannelTransport::spawn(oracle),
//!         network,
//!         EngineConfig::default(),
//!     );
//!
//!     let keypair = Keypair::generate();
//!     let owner = keypair.principal();
//!     engine.connect(keypair);
//!
//!     let id = engine.create_or_update(None, "greeting", b"hello world").await?;
//!     let plaintext = engine.decrypt(&ResourceRef::new(owner, id)).await?;
//!     assert_eq!(plaintext, b"hello world");
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `sealnote::core` - Identities, identifiers, chunk codec
//! - `sealnote::escrow` - Sealed handles, input proofs, payload cipher
//! - `sealnote::store` - Capability and blob storage
//! - `sealnote::oracle` - Oracle contract and client

pub mod engine;
pub mod error;
pub mod session;

pub use sealnote_core as core;
pub use sealnote_escrow as escrow;
pub use sealnote_oracle as oracle;
pub use sealnote_store as store;

pub use engine::{EngineConfig, EscrowEngine, MAX_CATEGORY};
pub use error::{EscrowError, Result};
pub use session::{ResourceState, Session};

pub use sealnote_core::{Keypair, MissingChunkPolicy, PrincipalId, ResourceId, ResourceRef};

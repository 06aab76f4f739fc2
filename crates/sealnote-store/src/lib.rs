//! # Sealnote Store
//!
//! Storage abstraction for Sealnote. Provides trait-based interfaces for
//! capability and blob persistence with SQLite and in-memory implementations.
//!
//! ## Overview
//!
//! The [`CapabilityStore`] trait holds everything the escrow protocol
//! persists: per-owner resource arrays, the capability table, category
//! handles, the reverse "received" index, and the handle ACL the oracle
//! reads. The [`BlobStore`] trait holds encrypted note payloads. The primary
//! implementation of both is [`SqliteStore`]; [`MemoryStore`] and
//! [`MemoryBlobStore`] back tests.
//!
//! ## Key Types
//!
//! - [`CapabilityStore`] - The async trait for capability operations
//! - [`BlobStore`] - Content-addressed payload storage
//! - [`Resource`] - A note's plaintext metadata
//! - [`GrantInsert`] - Result of inserting a grant
//!
//! ## Usage
//!
//! ```rust,no_run
//! use sealnote_store::{BlobStore, SqliteStore};
//!
//! async fn example() {
//!     // Open a SQLite database
//!     let store = SqliteStore::open("sealnote.db").unwrap();
//!
//!     // Or use an in-memory database for testing
//!     let store = SqliteStore::open_memory().unwrap();
//!
//!     // Store an encrypted payload
//!     let locator = store.put(b"ciphertext").await.unwrap();
//!     assert_eq!(store.get(&locator).await.unwrap(), b"ciphertext");
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Uniqueness**: A second grant for the same triple returns `AlreadyExists`
//! - **Terminal revoke**: Revoking deletes the handles; re-granting needs fresh ones
//! - **Never-pruned index**: The received index keeps revoked entries; it is a hint
//! - **Stable ids**: Resource ids are array indexes and survive soft deletion

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

mod validate;

pub use error::{Result, StoreError};
pub use memory::{MemoryBlobStore, MemoryStore};
pub use sqlite::SqliteStore;
pub use traits::{BlobStore, CapabilityStore, GrantInsert, ReceivedGrant, Resource};

//! # Sealnote Testkit
//!
//! Testing utilities for Sealnote.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: Known key/chunk pairs pinning the chunk codec layout
//! - **Generators**: Proptest strategies for property-based testing
//! - **Fixtures**: A local store, blob store and oracle with connected engines
//!
//! ## Golden Vectors
//!
//! ```rust
//! use sealnote_testkit::vectors::verify_all_vectors;
//!
//! for (name, passed) in verify_all_vectors() {
//!     assert!(passed, "{}", name);
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use sealnote_testkit::generators::{symmetric_key, NoteParams};
//!
//! proptest! {
//!     #[test]
//!     fn body_roundtrips(params: NoteParams, key in symmetric_key()) {
//!         // ...
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust,no_run
//! use sealnote_testkit::fixtures::{multi_party_keypairs, TestNetwork};
//!
//! # async fn example() {
//! let network = TestNetwork::new();
//! let parties = multi_party_keypairs(2);
//! let owner = network.engine(parties[0].clone());
//! let id = owner.create_or_update(None, "note", b"text").await.unwrap();
//! # }
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use sealnote::MAX_CATEGORY;

pub use fixtures::{init_tracing, multi_party_keypairs, TestEngine, TestNetwork};
pub use generators::NoteParams;
pub use vectors::{all_vectors, verify_all_vectors, vectors_json, GoldenVector};

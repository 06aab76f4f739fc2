//! # Sealnote Oracle
//!
//! Decryption oracle contract for sealed key chunks.
//!
//! ## Overview
//!
//! A requester sends a batch of [`EncryptedChunkHandle`](sealnote_escrow::EncryptedChunkHandle)s
//! together with one signed, time-bounded [`DecryptionAuthorization`]. The
//! oracle checks the authorization, reads the handle ACL from a
//! [`CapabilityStore`](sealnote_store::CapabilityStore), and answers with the
//! cleartext values of the handles the requester may read. Everything else is
//! left absent.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use sealnote_escrow::NetworkSecret;
//! use sealnote_oracle::{memory::ChannelTransport, LocalOracle, OracleClient, OracleConfig};
//! use sealnote_store::MemoryStore;
//!
//! # async fn example() {
//! let store = Arc::new(MemoryStore::new());
//! let oracle = Arc::new(LocalOracle::new(store, NetworkSecret::generate()));
//! let network = oracle.network_key();
//!
//! let client = OracleClient::new(ChannelTransport::spawn(oracle), network, OracleConfig::default());
//! // let values = client.request_decryption(&handles, &keypair).await?;
//! # }
//! ```
//!
//! ## Message Flow
//!
//! ```text
//! Client                              Oracle
//!   |-------- OracleRequest ---------->|  verify authorization
//!   |                                  |  check ACL per handle
//!   |<------- Decrypted / Denied ------|
//! ```

pub mod authorization;
pub mod client;
pub mod error;
pub mod local;
pub mod messages;
pub mod transport;

pub use authorization::{DecryptionAuthorization, DEFAULT_VALIDITY_DAYS, MAX_VALIDITY_DAYS};
pub use client::{OracleClient, OracleConfig};
pub use error::{AuthorizationError, OracleError, Result};
pub use local::LocalOracle;
pub use messages::{limits, DecryptedValue, DenialCode, OracleReply, OracleRequest, PROTOCOL_VERSION};
pub use transport::{memory, OracleTransport};

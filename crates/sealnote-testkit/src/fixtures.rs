//! Test fixtures and helpers.
//!
//! Common setup code for integration tests: a shared store, blob store and
//! in-process oracle, plus engines connected to it.

use std::sync::Arc;

use sealnote::{EngineConfig, EscrowEngine};
use sealnote_core::Keypair;
use sealnote_escrow::NetworkSecret;
use sealnote_oracle::memory::ChannelTransport;
use sealnote_oracle::LocalOracle;
use sealnote_store::{MemoryBlobStore, MemoryStore};

/// The engine type the fixtures hand out.
pub type TestEngine = EscrowEngine<MemoryStore, MemoryBlobStore, ChannelTransport>;

/// A local deployment: one store, one blob store, one oracle.
pub struct TestNetwork {
    pub store: Arc<MemoryStore>,
    pub blobs: Arc<MemoryBlobStore>,
    pub oracle: Arc<LocalOracle<MemoryStore>>,
}

impl TestNetwork {
    /// Create a deployment with a random network key.
    pub fn new() -> Self {
        Self::with_secret(NetworkSecret::generate())
    }

    /// Create a deployment with a deterministic network key.
    pub fn with_seed(seed: [u8; 32]) -> Self {
        Self::with_secret(NetworkSecret::from_bytes(seed))
    }

    fn with_secret(secret: NetworkSecret) -> Self {
        let store = Arc::new(MemoryStore::new());
        let oracle = Arc::new(LocalOracle::new(store.clone(), secret));
        Self {
            store,
            blobs: Arc::new(MemoryBlobStore::new()),
            oracle,
        }
    }

    /// An engine connected as `keypair`.
    ///
    /// Spawns an oracle task, so it must be called inside a Tokio runtime.
    pub fn engine(&self, keypair: Keypair) -> TestEngine {
        self.engine_with_config(keypair, EngineConfig::default())
    }

    pub fn engine_with_config(&self, keypair: Keypair, config: EngineConfig) -> TestEngine {
        let engine = EscrowEngine::new(
            self.store.clone(),
            self.blobs.clone(),
            ChannelTransport::spawn(self.oracle.clone()),
            self.oracle.network_key(),
            config,
        );
        engine.connect(keypair);
        engine
    }
}

impl Default for TestNetwork {
    fn default() -> Self {
        Self::new()
    }
}

/// Deterministic keypairs for multi-party tests.
pub fn multi_party_keypairs(count: usize) -> Vec<Keypair> {
    (0..count)
        .map(|i| {
            let mut seed = [0u8; 32];
            seed[..8].copy_from_slice(&(i as u64).to_be_bytes());
            seed[31] = 0x5E;
            Keypair::from_seed(&seed)
        })
        .collect()
}

/// Route `tracing` output to the test harness. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing_subscriber::filter::LevelFilter::DEBUG)
        .try_init();
}

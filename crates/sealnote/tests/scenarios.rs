//! End-to-end behaviour of the escrow engine against a local oracle.

use std::sync::Arc;
use std::time::Duration;

use sealnote::core::{Keypair, PrincipalId, ResourceId, ResourceRef};
use sealnote::escrow::NetworkSecret;
use sealnote::oracle::memory::{ChannelTransport, DelayedTransport, FnTransport};
use sealnote::oracle::{DecryptedValue, LocalOracle, OracleReply, OracleRequest, OracleTransport};
use sealnote::store::{BlobStore, CapabilityStore, MemoryBlobStore, MemoryStore, SqliteStore};
use sealnote::{EngineConfig, EscrowEngine, EscrowError, MissingChunkPolicy, ResourceState};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// One store, one blob store and one oracle shared by every engine.
struct Deployment<S: CapabilityStore, B: BlobStore> {
    store: Arc<S>,
    blobs: Arc<B>,
    oracle: Arc<LocalOracle<S>>,
}

impl Deployment<MemoryStore, MemoryBlobStore> {
    fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()), Arc::new(MemoryBlobStore::new()))
    }
}

impl<S, B> Deployment<S, B>
where
    S: CapabilityStore + 'static,
    B: BlobStore,
{
    fn new(store: Arc<S>, blobs: Arc<B>) -> Self {
        init_tracing();
        let oracle = Arc::new(LocalOracle::new(
            store.clone(),
            NetworkSecret::from_bytes([42; 32]),
        ));
        Self {
            store,
            blobs,
            oracle,
        }
    }

    fn connect(&self, keypair: Keypair) -> EscrowEngine<S, B, ChannelTransport> {
        self.connect_with(keypair, ChannelTransport::spawn(self.oracle.clone()), EngineConfig::default())
    }

    fn connect_with<T: OracleTransport>(
        &self,
        keypair: Keypair,
        transport: T,
        config: EngineConfig,
    ) -> EscrowEngine<S, B, T> {
        let engine = EscrowEngine::new(
            self.store.clone(),
            self.blobs.clone(),
            transport,
            self.oracle.network_key(),
            config,
        );
        engine.connect(keypair);
        engine
    }
}

fn alice() -> Keypair {
    Keypair::from_seed(&[0xA1; 32])
}

fn bob() -> Keypair {
    Keypair::from_seed(&[0xB0; 32])
}

fn principal(keypair: fn() -> Keypair) -> PrincipalId {
    keypair().principal()
}

#[tokio::test]
async fn scenario_a_owner_round_trip() -> anyhow::Result<()> {
    let net = Deployment::in_memory();
    let owner = net.connect(alice());

    let id = owner.create_or_update(None, "greeting", b"hello world").await?;
    let resource = ResourceRef::new(principal(alice), id);
    assert_eq!(owner.state(&resource), ResourceState::NoKey);

    assert_eq!(owner.decrypt(&resource).await?, b"hello world");
    assert_eq!(owner.state(&resource), ResourceState::Unlocked);

    // Served from the cache.
    assert_eq!(owner.decrypt(&resource).await?, b"hello world");
    Ok(())
}

#[tokio::test]
async fn scenario_b_grantee_reads_with_own_handles() -> anyhow::Result<()> {
    let net = Deployment::in_memory();
    let owner = net.connect(alice());
    let reader = net.connect(bob());

    let id = owner.create_or_update(None, "shared", b"hello world").await?;
    let resource = ResourceRef::new(principal(alice), id);
    owner.decrypt(&resource).await?;
    owner.share(id, &principal(bob)).await?;

    assert_eq!(reader.decrypt(&resource).await?, b"hello world");

    let own = net.store.get_capability(&resource, &principal(alice)).await?.unwrap();
    let granted = net.store.get_capability(&resource, &principal(bob)).await?.unwrap();
    for id in granted.handles.ids() {
        assert!(!own.handles.ids().contains(&id));
    }
    assert_eq!(owner.list_grantees(id).await?, vec![principal(bob)]);
    Ok(())
}

#[tokio::test]
async fn scenario_c_update_rekeys_past_grantees() -> anyhow::Result<()> {
    let net = Deployment::in_memory();
    let owner = net.connect(alice());
    let reader = net.connect(bob());

    let id = owner.create_or_update(None, "draft", b"v1").await?;
    let resource = ResourceRef::new(principal(alice), id);
    owner.decrypt(&resource).await?;
    owner.share(id, &principal(bob)).await?;

    let same = owner.create_or_update(Some(id), "draft", b"v2").await?;
    assert_eq!(same, id);
    assert_eq!(owner.state(&resource), ResourceState::NoKey);
    assert_eq!(owner.decrypt(&resource).await?, b"v2");

    assert!(matches!(
        reader.decrypt(&resource).await,
        Err(EscrowError::CipherAuthenticationFailure)
    ));
    assert_eq!(reader.state(&resource), ResourceState::NoKey);
    Ok(())
}

#[tokio::test]
async fn scenario_d_blank_answer_is_decryption_failure() -> anyhow::Result<()> {
    let net = Deployment::in_memory();
    let owner = net.connect(alice());
    let id = owner.create_or_update(None, "note", b"secret").await?;
    let resource = ResourceRef::new(principal(alice), id);

    let blank = FnTransport::new(|_: &[u8]| OracleReply::Decrypted { values: vec![] }.to_bytes());
    let engine = net.connect_with(alice(), blank, EngineConfig::default());

    assert!(matches!(
        engine.decrypt(&resource).await,
        Err(EscrowError::OracleDecryptionFailure(_))
    ));
    assert_eq!(engine.state(&resource), ResourceState::NoKey);
    Ok(())
}

/// Answers the first requested handle with 1 and leaves the rest out.
fn partial_transport() -> FnTransport<impl Fn(&[u8]) -> sealnote::oracle::Result<Vec<u8>> + Send + Sync> {
    FnTransport::new(|bytes: &[u8]| {
        let request = OracleRequest::from_bytes(bytes)?;
        let values = request
            .handles
            .first()
            .map(|h| DecryptedValue {
                handle: h.id(),
                value: 1,
            })
            .into_iter()
            .collect();
        OracleReply::Decrypted { values }.to_bytes()
    })
}

#[tokio::test]
async fn partial_answer_follows_policy() -> anyhow::Result<()> {
    let net = Deployment::in_memory();
    let owner = net.connect(alice());
    let id = owner.create_or_update(None, "note", b"secret").await?;
    let resource = ResourceRef::new(principal(alice), id);

    let strict = net.connect_with(alice(), partial_transport(), EngineConfig::default());
    assert!(matches!(
        strict.decrypt(&resource).await,
        Err(EscrowError::OracleDecryptionFailure(_))
    ));

    let lenient = net.connect_with(
        alice(),
        partial_transport(),
        EngineConfig {
            missing_chunks: MissingChunkPolicy::ZeroFill,
            ..EngineConfig::default()
        },
    );
    assert!(matches!(
        lenient.decrypt(&resource).await,
        Err(EscrowError::CipherAuthenticationFailure)
    ));
    Ok(())
}

#[tokio::test]
async fn concurrent_shares_yield_one_grant() -> anyhow::Result<()> {
    let net = Deployment::in_memory();
    let owner = net.connect(alice());
    let id = owner.create_or_update(None, "note", b"text").await?;
    owner.decrypt(&ResourceRef::new(principal(alice), id)).await?;

    let grantee = principal(bob);
    let (first, second) = tokio::join!(owner.share(id, &grantee), owner.share(id, &grantee));

    let results = [first, second];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(
        results
            .iter()
            .filter(|r| matches!(r, Err(EscrowError::AlreadyShared { .. })))
            .count(),
        1
    );
    Ok(())
}

#[tokio::test]
async fn revoke_is_terminal() -> anyhow::Result<()> {
    let net = Deployment::in_memory();
    let owner = net.connect(alice());
    let reader = net.connect(bob());

    let id = owner.create_or_update(None, "note", b"text").await?;
    let resource = ResourceRef::new(principal(alice), id);
    owner.decrypt(&resource).await?;
    owner.share(id, &principal(bob)).await?;
    reader.decrypt(&resource).await?;

    owner.revoke(id, &principal(bob)).await?;
    reader.lock_all();
    assert!(matches!(
        reader.decrypt(&resource).await,
        Err(EscrowError::CapabilityNotFound(_))
    ));
    assert!(matches!(
        owner.revoke(id, &principal(bob)).await,
        Err(EscrowError::NotShared { .. })
    ));
    assert!(reader.shared_with_me().await?.is_empty());

    // A fresh share works again with new handles.
    owner.share(id, &principal(bob)).await?;
    assert_eq!(reader.decrypt(&resource).await?, b"text");
    Ok(())
}

#[tokio::test]
async fn share_preconditions() -> anyhow::Result<()> {
    let net = Deployment::in_memory();
    let owner = net.connect(alice());
    let id = owner.create_or_update(None, "note", b"text").await?;

    assert!(matches!(
        owner.share(id, &principal(bob)).await,
        Err(EscrowError::Locked(_))
    ));

    owner.decrypt(&ResourceRef::new(principal(alice), id)).await?;
    assert!(matches!(
        owner.share(id, &principal(alice)).await,
        Err(EscrowError::InvalidGrantee(_))
    ));
    let mut identity_point = [0u8; 32];
    identity_point[0] = 1;
    assert!(matches!(
        owner.share(id, &PrincipalId(identity_point)).await,
        Err(EscrowError::InvalidGrantee(_))
    ));
    assert!(matches!(
        owner.revoke(id, &principal(alice)).await,
        Err(EscrowError::InvalidGrantee(_))
    ));
    Ok(())
}

#[tokio::test]
async fn strangers_see_nothing() -> anyhow::Result<()> {
    let net = Deployment::in_memory();
    let owner = net.connect(alice());
    let stranger = net.connect(bob());

    let id = owner.create_or_update(None, "private", b"text").await?;
    let resource = ResourceRef::new(principal(alice), id);

    assert!(matches!(
        stranger.decrypt(&resource).await,
        Err(EscrowError::CapabilityNotFound(_))
    ));
    assert!(matches!(
        stranger.decrypt(&ResourceRef::new(principal(alice), ResourceId(99))).await,
        Err(EscrowError::CapabilityNotFound(_))
    ));
    assert!(matches!(
        stranger.update_title(id, "mine now").await,
        Err(EscrowError::CapabilityNotFound(_))
    ));
    Ok(())
}

#[tokio::test]
async fn soft_delete_keeps_shares() -> anyhow::Result<()> {
    let net = Deployment::in_memory();
    let owner = net.connect(alice());
    let reader = net.connect(bob());

    let id = owner.create_or_update(None, "note", b"text").await?;
    let resource = ResourceRef::new(principal(alice), id);
    owner.decrypt(&resource).await?;
    owner.share(id, &principal(bob)).await?;

    owner.delete(id).await?;
    assert_eq!(owner.state(&resource), ResourceState::NoKey);
    assert!(owner.list_own(false).await?.is_empty());
    assert_eq!(owner.list_own(true).await?.len(), 1);

    assert_eq!(reader.decrypt(&resource).await?, b"text");
    assert!(reader.shared_with_me().await?.is_empty());

    owner.restore(id).await?;
    let shared = reader.shared_with_me().await?;
    assert_eq!(shared.len(), 1);
    assert_eq!(shared[0].id, id);

    let next = owner.create_or_update(None, "second", b"more").await?;
    assert_eq!(next, id.next());
    Ok(())
}

#[tokio::test]
async fn title_update_leaves_key_alone() -> anyhow::Result<()> {
    let net = Deployment::in_memory();
    let owner = net.connect(alice());
    let id = owner.create_or_update(None, "old", b"text").await?;
    let resource = ResourceRef::new(principal(alice), id);
    let before = net.store.get_capability(&resource, &principal(alice)).await?;

    let updated = owner.update_title(id, "new").await?;
    assert_eq!(updated.title, "new");
    assert_eq!(
        net.store.get_capability(&resource, &principal(alice)).await?,
        before
    );
    assert_eq!(owner.decrypt(&resource).await?, b"text");
    Ok(())
}

#[tokio::test]
async fn category_round_trip() -> anyhow::Result<()> {
    let net = Deployment::in_memory();
    let owner = net.connect(alice());
    let id = owner.create_or_update(None, "note", b"text").await?;

    assert_eq!(owner.decrypt_category(id).await?, None);
    owner.set_category(id, 0).await?;
    assert_eq!(owner.decrypt_category(id).await?, Some(0));
    owner.set_category(id, 7).await?;
    assert_eq!(owner.decrypt_category(id).await?, Some(7));

    assert!(matches!(
        owner.set_category(id, 8).await,
        Err(EscrowError::InvalidCategory(8))
    ));
    assert!(matches!(
        owner.set_category(ResourceId(5), 1).await,
        Err(EscrowError::CapabilityNotFound(_))
    ));
    Ok(())
}

#[tokio::test]
async fn disconnect_clears_cache() -> anyhow::Result<()> {
    let net = Deployment::in_memory();
    let owner = net.connect(alice());
    let id = owner.create_or_update(None, "note", b"text").await?;
    let resource = ResourceRef::new(principal(alice), id);

    owner.decrypt(&resource).await?;
    assert_eq!(owner.state(&resource), ResourceState::Unlocked);

    owner.disconnect();
    assert_eq!(owner.principal(), None);
    assert_eq!(owner.state(&resource), ResourceState::NoKey);
    assert!(matches!(
        owner.decrypt(&resource).await,
        Err(EscrowError::NotConnected)
    ));

    owner.connect(alice());
    assert_eq!(owner.state(&resource), ResourceState::NoKey);
    assert_eq!(owner.decrypt(&resource).await?, b"text");

    owner.lock(&resource);
    assert_eq!(owner.state(&resource), ResourceState::NoKey);
    Ok(())
}

#[tokio::test]
async fn cancelled_decrypt_resets_state() -> anyhow::Result<()> {
    let net = Deployment::in_memory();
    let owner = net.connect(alice());
    let id = owner.create_or_update(None, "note", b"text").await?;
    let resource = ResourceRef::new(principal(alice), id);

    let slow = DelayedTransport::new(
        ChannelTransport::spawn(net.oracle.clone()),
        Duration::from_secs(10),
    );
    let engine = net.connect_with(alice(), slow, EngineConfig::default());

    let mut pending = Box::pin(engine.decrypt(&resource));
    let outcome = tokio::time::timeout(Duration::from_millis(50), &mut pending).await;
    assert!(outcome.is_err());
    assert_eq!(engine.state(&resource), ResourceState::Decrypting);

    drop(pending);
    assert_eq!(engine.state(&resource), ResourceState::NoKey);
    Ok(())
}

#[tokio::test]
async fn oracle_timeout_is_unavailable() -> anyhow::Result<()> {
    let net = Deployment::in_memory();
    let owner = net.connect(alice());
    let id = owner.create_or_update(None, "note", b"text").await?;
    let resource = ResourceRef::new(principal(alice), id);

    let slow = DelayedTransport::new(
        ChannelTransport::spawn(net.oracle.clone()),
        Duration::from_secs(10),
    );
    let mut config = EngineConfig::default();
    config.oracle.timeout = Duration::from_millis(20);
    let engine = net.connect_with(alice(), slow, config);

    assert!(matches!(
        engine.decrypt(&resource).await,
        Err(EscrowError::OracleUnavailable(_))
    ));
    assert_eq!(engine.state(&resource), ResourceState::NoKey);
    Ok(())
}

#[tokio::test]
async fn sqlite_deployment_end_to_end() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let store = Arc::new(SqliteStore::open(dir.path().join("sealnote.db"))?);
    let net = Deployment::new(store.clone(), store);

    let owner = net.connect(alice());
    let reader = net.connect(bob());

    let id = owner.create_or_update(None, "note", b"v1").await?;
    let resource = ResourceRef::new(principal(alice), id);
    assert_eq!(owner.decrypt(&resource).await?, b"v1");
    owner.share(id, &principal(bob)).await?;
    assert_eq!(reader.decrypt(&resource).await?, b"v1");

    owner.create_or_update(Some(id), "note", b"v2").await?;
    reader.lock_all();
    assert!(matches!(
        reader.decrypt(&resource).await,
        Err(EscrowError::CipherAuthenticationFailure)
    ));

    owner.revoke(id, &principal(bob)).await?;
    assert!(matches!(
        reader.decrypt(&resource).await,
        Err(EscrowError::CapabilityNotFound(_))
    ));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallel_creates_get_distinct_ids() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let store = Arc::new(SqliteStore::open(dir.path().join("sealnote.db"))?);
    let net = Deployment::new(store.clone(), store);
    let owner = Arc::new(net.connect(alice()));

    let tasks: Vec<_> = (0..16u8)
        .map(|i| {
            let owner = owner.clone();
            tokio::spawn(async move { owner.create_or_update(None, "note", &[i; 8]).await })
        })
        .collect();

    let mut ids = Vec::new();
    for task in tasks {
        ids.push(task.await??.0);
    }
    ids.sort_unstable();
    assert_eq!(ids, (0..16).collect::<Vec<_>>());
    assert_eq!(owner.list_own(false).await?.len(), 16);

    for id in ids {
        owner.decrypt(&ResourceRef::new(principal(alice), ResourceId(id))).await?;
    }
    Ok(())
}

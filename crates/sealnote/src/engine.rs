//! The escrow engine: save, decrypt, share and revoke encrypted notes.
//!
//! Content is encrypted under a fresh [`SymmetricKey`] on every save. The
//! key never leaves the device in clear: it is split into chunks, each chunk
//! is sealed to the oracle network for one authorized party, and the sealed
//! handles are stored as that party's capability. Reading a note means asking
//! the oracle to open the caller's own handles.

use std::sync::{Arc, RwLock};

use zeroize::Zeroizing;

use sealnote_core::{
    is_blank, KeyChunks, Keypair, MissingChunkPolicy, PrincipalId, ResourceId, ResourceRef,
    SymmetricKey,
};
use sealnote_escrow::{cipher, EncryptedInput};
use sealnote_oracle::{OracleClient, OracleConfig, OracleTransport};
use sealnote_store::{BlobStore, CapabilityStore, GrantInsert, Resource, StoreError};

use crate::error::{EscrowError, Result};
use crate::session::{read_slot, write_slot, DecryptGuard, ResourceState, Session, SessionSlot, Unlocked};

/// Largest category value.
pub const MAX_CATEGORY: u8 = 7;

/// Configuration for the engine.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Oracle client configuration.
    pub oracle: OracleConfig,
    /// How to treat an oracle answer with some chunks missing.
    pub missing_chunks: MissingChunkPolicy,
}

/// The main engine.
///
/// Provides a unified API for:
/// - Creating and updating notes
/// - Decrypting notes through the oracle
/// - Sharing and revoking access
/// - Listing own and received notes
///
/// All operations take `&self`; the engine can be shared through an `Arc`.
pub struct EscrowEngine<S, B, T>
where
    S: CapabilityStore,
    B: BlobStore,
    T: OracleTransport,
{
    store: Arc<S>,
    blobs: Arc<B>,
    oracle: OracleClient<T>,
    missing_chunks: MissingChunkPolicy,
    session: SessionSlot,
}

impl<S, B, T> EscrowEngine<S, B, T>
where
    S: CapabilityStore,
    B: BlobStore,
    T: OracleTransport,
{
    /// Create an engine. `network` is the oracle network's public key.
    pub fn new(
        store: Arc<S>,
        blobs: Arc<B>,
        transport: T,
        network: sealnote_escrow::NetworkPublicKey,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            blobs,
            oracle: OracleClient::new(transport, network, config.oracle),
            missing_chunks: config.missing_chunks,
            session: RwLock::new(None),
        }
    }

    /// Get the store reference.
    pub fn store(&self) -> &S {
        &self.store
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Session
    // ─────────────────────────────────────────────────────────────────────────

    /// Start a session for `keypair`, replacing any previous one.
    pub fn connect(&self, keypair: Keypair) {
        let principal = keypair.principal();
        write_slot(&self.session, |slot| *slot = Some(Session::new(keypair)));
        tracing::info!(principal = %principal, "Session connected");
    }

    /// End the session and drop every cached key and plaintext.
    pub fn disconnect(&self) {
        let ended = write_slot(&self.session, |slot| slot.take());
        if let Some(session) = ended {
            tracing::info!(principal = %session.principal(), "Session disconnected");
        }
    }

    /// The connected principal.
    pub fn principal(&self) -> Option<PrincipalId> {
        read_slot(&self.session, |s| s.map(Session::principal))
    }

    /// Current state of `resource` in this session.
    pub fn state(&self, resource: &ResourceRef) -> ResourceState {
        read_slot(&self.session, |s| {
            s.map_or(ResourceState::NoKey, |s| s.state(resource))
        })
    }

    /// Forget the key and plaintext of one resource.
    pub fn lock(&self, resource: &ResourceRef) {
        write_slot(&self.session, |slot| {
            if let Some(session) = slot.as_mut() {
                session.lock(resource);
            }
        });
    }

    /// Forget every cached key.
    pub fn lock_all(&self) {
        write_slot(&self.session, |slot| {
            if let Some(session) = slot.as_mut() {
                session.lock_all();
            }
        });
    }

    fn keypair(&self) -> Result<Keypair> {
        read_slot(&self.session, |s| s.map(|s| s.keypair().clone()))
            .ok_or(EscrowError::NotConnected)
    }

    fn cached_key(&self, resource: &ResourceRef) -> Option<SymmetricKey> {
        read_slot(&self.session, |s| {
            s.and_then(|s| s.unlocked(resource)).map(|u| u.key.clone())
        })
    }

    fn cached_plaintext(&self, resource: &ResourceRef) -> Option<Vec<u8>> {
        read_slot(&self.session, |s| {
            s.and_then(|s| s.unlocked(resource))
                .map(|u| u.plaintext.to_vec())
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Owner Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Encrypt and save a note under a fresh key.
    ///
    /// With `id == None` a new resource is appended; otherwise the content
    /// and the self-capability of `id` are replaced. Existing grants keep
    /// their old key, so grantees lose access until shared again. The
    /// resource is locked afterwards.
    pub async fn create_or_update(
        &self,
        id: Option<ResourceId>,
        title: &str,
        plaintext: &[u8],
    ) -> Result<ResourceId> {
        let keypair = self.keypair()?;
        let owner = keypair.principal();

        let key = cipher::generate_key();
        let blob = cipher::encrypt(plaintext, &key)?;
        let payload = self.blobs.put(&blob).await.map_err(EscrowError::Blob)?;
        let chunks = KeyChunks::split(&key);

        let resource = match id {
            None => loop {
                // Sealed keys are bound to the id. A lost race reseals for the next one.
                let id = self.store.next_resource_id(&owner).await?;
                let keys = self.seal_key(&keypair, ResourceRef::new(owner, id), owner, &chunks)?;
                match self
                    .store
                    .create_resource(&owner, id, title, &payload, &keys)
                    .await
                {
                    Err(StoreError::Conflict(reason)) => {
                        tracing::debug!(owner = %owner, %reason, "Resource id taken, resealing");
                    }
                    result => break result?,
                }
            },
            Some(id) => {
                let keys = self.seal_key(&keypair, ResourceRef::new(owner, id), owner, &chunks)?;
                self.store
                    .update_content(&owner, id, title, &payload, &keys)
                    .await?
            }
        };

        let address = resource.address();
        self.lock(&address);
        tracing::info!(
            resource = %address,
            created = id.is_none(),
            "Saved resource"
        );
        Ok(resource.id)
    }

    /// Change a note's title. Content and capabilities are untouched.
    pub async fn update_title(&self, id: ResourceId, title: &str) -> Result<Resource> {
        let owner = self.keypair()?.principal();
        Ok(self.store.update_title(&owner, id, title).await?)
    }

    /// Soft-delete a note.
    ///
    /// The note disappears from active listings. Its payload and every grant
    /// stay in place, so existing grantees can still read it.
    pub async fn delete(&self, id: ResourceId) -> Result<()> {
        let owner = self.keypair()?.principal();
        let resource = self.store.set_deleted(&owner, id, true).await?;
        self.lock(&resource.address());
        tracing::info!(resource = %resource.address(), "Deleted resource");
        Ok(())
    }

    /// Undo a soft delete.
    pub async fn restore(&self, id: ResourceId) -> Result<()> {
        let owner = self.keypair()?.principal();
        let resource = self.store.set_deleted(&owner, id, false).await?;
        tracing::info!(resource = %resource.address(), "Restored resource");
        Ok(())
    }

    /// Attach an encrypted category (0 through 7) to one of the caller's notes.
    pub async fn set_category(&self, id: ResourceId, category: u8) -> Result<()> {
        if category > MAX_CATEGORY {
            return Err(EscrowError::InvalidCategory(u64::from(category)));
        }
        let keypair = self.keypair()?;
        let resource = ResourceRef::new(keypair.principal(), id);
        let input = EncryptedInput::seal_category(
            &keypair,
            resource,
            u64::from(category),
            self.oracle.network_key(),
        )?;
        self.store
            .set_category(&keypair.principal(), id, &input)
            .await?;
        tracing::debug!(resource = %resource, "Set category");
        Ok(())
    }

    /// Decrypt the category of one of the caller's notes.
    ///
    /// Returns `None` if no category is attached. Zero is a valid category,
    /// so an absent value, not a zero, is the failure signal here.
    pub async fn decrypt_category(&self, id: ResourceId) -> Result<Option<u8>> {
        let keypair = self.keypair()?;
        let resource = ResourceRef::new(keypair.principal(), id);
        let Some(handle) = self.store.get_category(&resource).await? else {
            return Ok(None);
        };

        let values = self
            .oracle
            .request_decryption(std::slice::from_ref(&handle), &keypair)
            .await?;
        match values.first().copied().flatten() {
            Some(value) => match u8::try_from(value) {
                Ok(category) if category <= MAX_CATEGORY => Ok(Some(category)),
                _ => Err(EscrowError::InvalidCategory(value)),
            },
            None => Err(EscrowError::OracleDecryptionFailure(
                "category handle not answered".into(),
            )),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Decryption
    // ─────────────────────────────────────────────────────────────────────────

    /// Decrypt a note the caller owns or was granted.
    ///
    /// Repeat calls while the note is unlocked are served from memory. If the
    /// returned future is dropped midway, the note goes back to `NoKey`.
    pub async fn decrypt(&self, resource: &ResourceRef) -> Result<Vec<u8>> {
        if let Some(plaintext) = self.cached_plaintext(resource) {
            tracing::debug!(resource = %resource, "Serving cached plaintext");
            return Ok(plaintext);
        }

        let keypair = self.keypair()?;
        let guard =
            DecryptGuard::begin(&self.session, *resource).ok_or(EscrowError::NotConnected)?;

        let (key, plaintext) = self.recover(resource, &keypair).await?;
        let result = plaintext.to_vec();
        guard.finish(Unlocked { key, plaintext });
        Ok(result)
    }

    async fn recover(
        &self,
        resource: &ResourceRef,
        keypair: &Keypair,
    ) -> Result<(SymmetricKey, Zeroizing<Vec<u8>>)> {
        let requester = keypair.principal();
        let not_found = || EscrowError::CapabilityNotFound(format!("{} for {}", resource, requester));

        let capability = self
            .store
            .get_capability(resource, &requester)
            .await?
            .ok_or_else(not_found)?;
        let record = self
            .store
            .get_resource(resource)
            .await?
            .ok_or_else(not_found)?;

        let values = self
            .oracle
            .request_decryption(capability.handles.as_slice(), keypair)
            .await?;
        if is_blank(&values) {
            tracing::warn!(resource = %resource, "Oracle returned no key material");
            return Err(EscrowError::OracleDecryptionFailure(
                "every chunk absent or zero".into(),
            ));
        }
        let chunks = KeyChunks::from_partial(&values, self.missing_chunks)
            .map_err(|e| EscrowError::OracleDecryptionFailure(e.to_string()))?;
        let key = chunks.join();

        let blob = self
            .blobs
            .get(&record.payload)
            .await
            .map_err(EscrowError::Blob)?;
        let plaintext = cipher::decrypt(&blob, &key).map_err(|e| {
            tracing::warn!(resource = %resource, "Payload failed authentication");
            EscrowError::from(e)
        })?;

        Ok((key, Zeroizing::new(plaintext)))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Sharing
    // ─────────────────────────────────────────────────────────────────────────

    /// Grant `grantee` read access to one of the caller's notes.
    ///
    /// The note must be unlocked: the cached key is re-sealed for the grantee
    /// with fresh handles.
    pub async fn share(&self, id: ResourceId, grantee: &PrincipalId) -> Result<()> {
        let keypair = self.keypair()?;
        let owner = keypair.principal();
        let resource = ResourceRef::new(owner, id);

        if *grantee == owner {
            return Err(EscrowError::InvalidGrantee("cannot share with self".into()));
        }
        grantee
            .validate()
            .map_err(|e| EscrowError::InvalidGrantee(e.to_string()))?;

        let key = self
            .cached_key(&resource)
            .ok_or(EscrowError::Locked(resource))?;
        let keys = self.seal_key(&keypair, resource, *grantee, &KeyChunks::split(&key))?;

        match self.store.insert_grant(&owner, id, grantee, &keys).await? {
            GrantInsert::Inserted => {
                tracing::info!(resource = %resource, grantee = %grantee, "Shared resource");
                Ok(())
            }
            GrantInsert::AlreadyExists => {
                tracing::debug!(resource = %resource, grantee = %grantee, "Already shared");
                Err(EscrowError::AlreadyShared {
                    resource,
                    grantee: *grantee,
                })
            }
        }
    }

    /// Remove a grant. Access can only come back through a new share.
    pub async fn revoke(&self, id: ResourceId, grantee: &PrincipalId) -> Result<()> {
        let owner = self.keypair()?.principal();
        let resource = ResourceRef::new(owner, id);
        if *grantee == owner {
            return Err(EscrowError::InvalidGrantee("cannot revoke self".into()));
        }

        if self.store.revoke_grant(&owner, id, grantee).await? {
            tracing::info!(resource = %resource, grantee = %grantee, "Revoked grant");
            Ok(())
        } else {
            Err(EscrowError::NotShared {
                resource,
                grantee: *grantee,
            })
        }
    }

    fn seal_key(
        &self,
        keypair: &Keypair,
        resource: ResourceRef,
        party: PrincipalId,
        chunks: &KeyChunks,
    ) -> Result<EncryptedInput> {
        Ok(EncryptedInput::seal_key(
            keypair,
            resource,
            party,
            chunks,
            self.oracle.network_key(),
        )?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Listings
    // ─────────────────────────────────────────────────────────────────────────

    /// The caller's notes in id order.
    pub async fn list_own(&self, include_deleted: bool) -> Result<Vec<Resource>> {
        let owner = self.keypair()?.principal();
        Ok(self.store.list_resources(&owner, include_deleted).await?)
    }

    /// Notes other principals currently share with the caller.
    ///
    /// Revoked grants linger in the received index; they are filtered out
    /// here, as are soft-deleted notes.
    pub async fn shared_with_me(&self) -> Result<Vec<Resource>> {
        let me = self.keypair()?.principal();
        let mut shared = Vec::new();

        for entry in self.store.list_received(&me).await? {
            if self.store.get_capability(&entry.resource, &me).await?.is_none() {
                continue;
            }
            match self.store.get_resource(&entry.resource).await? {
                Some(resource) if !resource.deleted => shared.push(resource),
                _ => {}
            }
        }
        Ok(shared)
    }

    /// Principals one of the caller's notes is shared with.
    pub async fn list_grantees(&self, id: ResourceId) -> Result<Vec<PrincipalId>> {
        let owner = self.keypair()?.principal();
        let resource = ResourceRef::new(owner, id);
        if self.store.get_resource(&resource).await?.is_none() {
            return Err(EscrowError::CapabilityNotFound(resource.to_string()));
        }
        Ok(self.store.list_grantees(&resource).await?)
    }
}

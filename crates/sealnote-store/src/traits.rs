//! Store traits: the abstract interface for capability and blob persistence.
//!
//! These traits allow the engine and the oracle to be storage-agnostic.
//! Implementations include SQLite (primary) and in-memory (for tests).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use sealnote_core::{PayloadLocator, PrincipalId, ResourceId, ResourceRef};
use sealnote_escrow::{Capability, EncryptedChunkHandle, EncryptedInput, HandleId};

use crate::error::Result;

/// A note's plaintext metadata.
///
/// Content lives in the blob store under `payload`. The key that decrypts it
/// lives only as sealed handles in capabilities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub id: ResourceId,
    pub owner: PrincipalId,
    pub title: String,
    pub payload: PayloadLocator,
    /// Unix milliseconds.
    pub created_at: i64,
    /// Unix milliseconds.
    pub updated_at: i64,
    /// Soft-deleted: hidden from active listings, still addressable.
    pub deleted: bool,
    /// Whether a category handle is attached.
    pub has_category: bool,
}

impl Resource {
    /// The global address of this resource.
    pub fn address(&self) -> ResourceRef {
        ResourceRef::new(self.owner, self.id)
    }
}

/// Result of inserting a grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantInsert {
    /// The grant was created.
    Inserted,
    /// An active grant already exists for this triple. Nothing was written.
    AlreadyExists,
}

/// An entry of a grantee's reverse index.
///
/// Entries are never removed on revoke, so this is a hint. Check the grant
/// table before trusting one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceivedGrant {
    pub resource: ResourceRef,
    /// When the grantee first received access (Unix ms).
    pub first_granted_at: i64,
}

/// The CapabilityStore trait: async interface for resources, capabilities
/// and the handle ACL.
///
/// All methods are async to support both sync (SQLite) and async backends.
/// For SQLite, we use `spawn_blocking` internally to avoid blocking the runtime.
///
/// # Design Notes
///
/// - **Authenticated writes**: Every call that stores handles takes the
///   submitting principal and an [`EncryptedInput`] whose proof must cover
///   exactly those handles. Mismatches fail with `InvalidProof`.
/// - **Owner-keyed mutations**: Mutations name a resource by the submitter's
///   own [`ResourceId`], so only an owner can touch its resources.
/// - **Atomic uniqueness**: At most one capability per
///   `(owner, resource, grantee)`. The check and insert happen in one step.
/// - **ACL**: Handle rows are added and removed in the same step as the
///   capability that owns them.
#[async_trait]
pub trait CapabilityStore: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Resource Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// The id the next `create_resource` for `owner` must use.
    async fn next_resource_id(&self, owner: &PrincipalId) -> Result<ResourceId>;

    /// Append a resource with its self-capability.
    ///
    /// Fails with `Conflict` if `expected_id` is no longer the next index.
    async fn create_resource(
        &self,
        submitter: &PrincipalId,
        expected_id: ResourceId,
        title: &str,
        payload: &PayloadLocator,
        keys: &EncryptedInput,
    ) -> Result<Resource>;

    /// Replace the payload and self-capability of an existing resource.
    ///
    /// Grants to other principals are left untouched.
    async fn update_content(
        &self,
        submitter: &PrincipalId,
        id: ResourceId,
        title: &str,
        payload: &PayloadLocator,
        keys: &EncryptedInput,
    ) -> Result<Resource>;

    /// Change only the title.
    async fn update_title(
        &self,
        submitter: &PrincipalId,
        id: ResourceId,
        title: &str,
    ) -> Result<Resource>;

    /// Set or clear the soft-delete flag.
    async fn set_deleted(
        &self,
        submitter: &PrincipalId,
        id: ResourceId,
        deleted: bool,
    ) -> Result<Resource>;

    /// Get a resource by address.
    async fn get_resource(&self, resource: &ResourceRef) -> Result<Option<Resource>>;

    /// List an owner's resources in id order.
    async fn list_resources(
        &self,
        owner: &PrincipalId,
        include_deleted: bool,
    ) -> Result<Vec<Resource>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Capability Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Get the capability `grantee` holds on `resource`.
    ///
    /// With `grantee == resource.owner` this is the self-capability.
    async fn get_capability(
        &self,
        resource: &ResourceRef,
        grantee: &PrincipalId,
    ) -> Result<Option<Capability>>;

    /// Grant `grantee` a capability on one of the submitter's resources.
    async fn insert_grant(
        &self,
        submitter: &PrincipalId,
        id: ResourceId,
        grantee: &PrincipalId,
        keys: &EncryptedInput,
    ) -> Result<GrantInsert>;

    /// Delete a grant and its ACL rows.
    ///
    /// Returns `false` if there was no active grant.
    async fn revoke_grant(
        &self,
        submitter: &PrincipalId,
        id: ResourceId,
        grantee: &PrincipalId,
    ) -> Result<bool>;

    /// Principals other than the owner holding a grant on `resource`.
    async fn list_grantees(&self, resource: &ResourceRef) -> Result<Vec<PrincipalId>>;

    /// Every resource ever granted to `grantee`, oldest first.
    async fn list_received(&self, grantee: &PrincipalId) -> Result<Vec<ReceivedGrant>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Category Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Attach or replace the resource's category handle.
    async fn set_category(
        &self,
        submitter: &PrincipalId,
        id: ResourceId,
        input: &EncryptedInput,
    ) -> Result<()>;

    /// The resource's category handle, if one is attached.
    async fn get_category(&self, resource: &ResourceRef)
        -> Result<Option<EncryptedChunkHandle>>;

    // ─────────────────────────────────────────────────────────────────────────
    // ACL Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Whether `principal` may ask the oracle to decrypt `handle`.
    async fn is_handle_authorized(
        &self,
        handle: &HandleId,
        principal: &PrincipalId,
    ) -> Result<bool>;
}

/// Content-addressed, append-only blob storage.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store bytes and return their locator. Storing the same bytes twice is
    /// a no-op returning the same locator.
    async fn put(&self, bytes: &[u8]) -> Result<PayloadLocator>;

    /// Fetch bytes by locator.
    ///
    /// Fails with `NotFound` if absent and `InvalidData` if the stored bytes
    /// no longer hash to the locator.
    async fn get(&self, locator: &PayloadLocator) -> Result<Vec<u8>>;
}

//! In-memory implementations of the store traits.
//!
//! These are primarily for testing. They have the same semantics as SQLite
//! but keep everything in memory with no persistence.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use sealnote_core::{now_millis, PayloadLocator, PrincipalId, ResourceId, ResourceRef};
use sealnote_escrow::{Capability, ChunkHandles, EncryptedChunkHandle, EncryptedInput, HandleId};

use crate::error::{Result, StoreError};
use crate::traits::{BlobStore, CapabilityStore, GrantInsert, ReceivedGrant, Resource};
use crate::validate;

/// In-memory capability store.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock; every
/// mutation holds the write lock for its whole check-then-write.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    /// Per-owner resource arrays; the index is the resource id.
    resources: HashMap<PrincipalId, Vec<Resource>>,

    /// Capabilities keyed by (resource, grantee), self-capabilities included.
    capabilities: BTreeMap<(ResourceRef, PrincipalId), Capability>,

    /// Category handles.
    categories: HashMap<ResourceRef, EncryptedChunkHandle>,

    /// Handle ACL rows.
    acl: HashSet<(HandleId, PrincipalId)>,

    /// Reverse index: grantee -> resource -> first granted at.
    received: HashMap<PrincipalId, BTreeMap<ResourceRef, i64>>,
}

impl MemoryStoreInner {
    fn resource_mut(&mut self, owner: &PrincipalId, id: ResourceId) -> Result<&mut Resource> {
        self.resources
            .get_mut(owner)
            .and_then(|list| list.get_mut(id.get() as usize))
            .ok_or_else(|| StoreError::NotFound(format!("resource {}/{}", owner, id)))
    }

    fn grant_acl(&mut self, handles: &ChunkHandles, principal: PrincipalId) {
        for id in handles.ids() {
            self.acl.insert((id, principal));
        }
    }

    fn drop_acl(&mut self, handles: &ChunkHandles, principal: PrincipalId) {
        for id in handles.ids() {
            self.acl.remove(&(id, principal));
        }
    }

    fn replace_self_capability(&mut self, resource: ResourceRef, handles: ChunkHandles, now: i64) {
        let owner = resource.owner;
        if let Some(previous) = self.capabilities.remove(&(resource, owner)) {
            self.drop_acl(&previous.handles, owner);
        }
        self.grant_acl(&handles, owner);
        self.capabilities.insert(
            (resource, owner),
            Capability {
                resource,
                grantor: owner,
                grantee: owner,
                handles,
                created_at: now,
            },
        );
    }
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CapabilityStore for MemoryStore {
    async fn next_resource_id(&self, owner: &PrincipalId) -> Result<ResourceId> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let len = inner.resources.get(owner).map_or(0, Vec::len);
        Ok(ResourceId(len as u64))
    }

    async fn create_resource(
        &self,
        submitter: &PrincipalId,
        expected_id: ResourceId,
        title: &str,
        payload: &PayloadLocator,
        keys: &EncryptedInput,
    ) -> Result<Resource> {
        let resource = ResourceRef::new(*submitter, expected_id);
        let handles = validate::key_input(submitter, resource, submitter, keys)?;

        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let next = inner.resources.get(submitter).map_or(0, Vec::len) as u64;
        if next != expected_id.get() {
            return Err(StoreError::Conflict(format!(
                "resource id {} taken, next is {}",
                expected_id, next
            )));
        }

        let now = now_millis();
        let record = Resource {
            id: expected_id,
            owner: *submitter,
            title: title.to_string(),
            payload: payload.clone(),
            created_at: now,
            updated_at: now,
            deleted: false,
            has_category: false,
        };
        inner
            .resources
            .entry(*submitter)
            .or_default()
            .push(record.clone());
        inner.replace_self_capability(resource, handles, now);

        Ok(record)
    }

    async fn update_content(
        &self,
        submitter: &PrincipalId,
        id: ResourceId,
        title: &str,
        payload: &PayloadLocator,
        keys: &EncryptedInput,
    ) -> Result<Resource> {
        let resource = ResourceRef::new(*submitter, id);
        let handles = validate::key_input(submitter, resource, submitter, keys)?;

        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let now = now_millis();
        let record = inner.resource_mut(submitter, id)?;
        record.title = title.to_string();
        record.payload = payload.clone();
        record.updated_at = now;
        let updated = record.clone();

        inner.replace_self_capability(resource, handles, now);
        Ok(updated)
    }

    async fn update_title(
        &self,
        submitter: &PrincipalId,
        id: ResourceId,
        title: &str,
    ) -> Result<Resource> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let record = inner.resource_mut(submitter, id)?;
        record.title = title.to_string();
        record.updated_at = now_millis();
        Ok(record.clone())
    }

    async fn set_deleted(
        &self,
        submitter: &PrincipalId,
        id: ResourceId,
        deleted: bool,
    ) -> Result<Resource> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let record = inner.resource_mut(submitter, id)?;
        record.deleted = deleted;
        record.updated_at = now_millis();
        Ok(record.clone())
    }

    async fn get_resource(&self, resource: &ResourceRef) -> Result<Option<Resource>> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        Ok(inner
            .resources
            .get(&resource.owner)
            .and_then(|list| list.get(resource.id.get() as usize))
            .cloned())
    }

    async fn list_resources(
        &self,
        owner: &PrincipalId,
        include_deleted: bool,
    ) -> Result<Vec<Resource>> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        Ok(inner
            .resources
            .get(owner)
            .map(|list| {
                list.iter()
                    .filter(|r| include_deleted || !r.deleted)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn get_capability(
        &self,
        resource: &ResourceRef,
        grantee: &PrincipalId,
    ) -> Result<Option<Capability>> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        Ok(inner.capabilities.get(&(*resource, *grantee)).cloned())
    }

    async fn insert_grant(
        &self,
        submitter: &PrincipalId,
        id: ResourceId,
        grantee: &PrincipalId,
        keys: &EncryptedInput,
    ) -> Result<GrantInsert> {
        validate::grantee(submitter, grantee)?;
        let resource = ResourceRef::new(*submitter, id);
        let handles = validate::key_input(submitter, resource, grantee, keys)?;

        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.resource_mut(submitter, id)?;

        if inner.capabilities.contains_key(&(resource, *grantee)) {
            return Ok(GrantInsert::AlreadyExists);
        }

        let now = now_millis();
        inner.grant_acl(&handles, *grantee);
        inner.capabilities.insert(
            (resource, *grantee),
            Capability {
                resource,
                grantor: *submitter,
                grantee: *grantee,
                handles,
                created_at: now,
            },
        );
        inner
            .received
            .entry(*grantee)
            .or_default()
            .entry(resource)
            .or_insert(now);

        Ok(GrantInsert::Inserted)
    }

    async fn revoke_grant(
        &self,
        submitter: &PrincipalId,
        id: ResourceId,
        grantee: &PrincipalId,
    ) -> Result<bool> {
        if submitter == grantee {
            return Ok(false);
        }
        let resource = ResourceRef::new(*submitter, id);

        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        match inner.capabilities.remove(&(resource, *grantee)) {
            Some(capability) => {
                inner.drop_acl(&capability.handles, *grantee);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_grantees(&self, resource: &ResourceRef) -> Result<Vec<PrincipalId>> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        Ok(inner
            .capabilities
            .keys()
            .filter(|(r, grantee)| r == resource && *grantee != resource.owner)
            .map(|(_, grantee)| *grantee)
            .collect())
    }

    async fn list_received(&self, grantee: &PrincipalId) -> Result<Vec<ReceivedGrant>> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let mut entries: Vec<ReceivedGrant> = inner
            .received
            .get(grantee)
            .map(|index| {
                index
                    .iter()
                    .map(|(resource, at)| ReceivedGrant {
                        resource: *resource,
                        first_granted_at: *at,
                    })
                    .collect()
            })
            .unwrap_or_default();
        entries.sort_by_key(|e| (e.first_granted_at, e.resource));
        Ok(entries)
    }

    async fn set_category(
        &self,
        submitter: &PrincipalId,
        id: ResourceId,
        input: &EncryptedInput,
    ) -> Result<()> {
        let resource = ResourceRef::new(*submitter, id);
        let handle = validate::category_input(submitter, resource, input)?;

        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let record = inner.resource_mut(submitter, id)?;
        record.has_category = true;
        record.updated_at = now_millis();

        if let Some(previous) = inner.categories.remove(&resource) {
            inner.acl.remove(&(previous.id(), *submitter));
        }
        inner.acl.insert((handle.id(), *submitter));
        inner.categories.insert(resource, handle);
        Ok(())
    }

    async fn get_category(
        &self,
        resource: &ResourceRef,
    ) -> Result<Option<EncryptedChunkHandle>> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        Ok(inner.categories.get(resource).cloned())
    }

    async fn is_handle_authorized(
        &self,
        handle: &HandleId,
        principal: &PrincipalId,
    ) -> Result<bool> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        Ok(inner.acl.contains(&(*handle, *principal)))
    }
}

/// In-memory blob store.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<PayloadLocator, Vec<u8>>>,
}

impl MemoryBlobStore {
    /// Create a new empty blob store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs.
    pub fn len(&self) -> usize {
        self.blobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, bytes: &[u8]) -> Result<PayloadLocator> {
        let locator = PayloadLocator::for_content(bytes);
        self.blobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(locator.clone())
            .or_insert_with(|| bytes.to_vec());
        Ok(locator)
    }

    async fn get(&self, locator: &PayloadLocator) -> Result<Vec<u8>> {
        let blobs = self.blobs.read().unwrap_or_else(PoisonError::into_inner);
        let bytes = blobs
            .get(locator)
            .ok_or_else(|| StoreError::NotFound(format!("blob {}", locator)))?;
        if !locator.matches(bytes) {
            return Err(StoreError::InvalidData(format!(
                "blob {} does not match its locator",
                locator
            )));
        }
        Ok(bytes.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_blob_put_is_idempotent() {
        let blobs = MemoryBlobStore::new();
        let a = blobs.put(b"ciphertext").await.unwrap();
        let b = blobs.put(b"ciphertext").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(blobs.len(), 1);
        assert_eq!(blobs.get(&a).await.unwrap(), b"ciphertext");
    }

    #[tokio::test]
    async fn test_blob_missing() {
        let blobs = MemoryBlobStore::new();
        let locator = PayloadLocator::for_content(b"never stored");
        assert!(matches!(
            blobs.get(&locator).await,
            Err(StoreError::NotFound(_))
        ));
    }
}

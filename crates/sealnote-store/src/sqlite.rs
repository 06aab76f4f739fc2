//! SQLite implementation of the store traits.
//!
//! This is the primary storage backend for Sealnote. It uses rusqlite with
//! bundled SQLite, wrapped in async via tokio::spawn_blocking. One database
//! holds both capabilities and blobs, so it can back a local deployment on
//! its own.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Transaction};

use sealnote_core::{now_millis, PayloadLocator, PrincipalId, ResourceId, ResourceRef};
use sealnote_escrow::{Capability, ChunkHandles, EncryptedChunkHandle, EncryptedInput, HandleId};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{BlobStore, CapabilityStore, GrantInsert, ReceivedGrant, Resource};
use crate::validate;

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
#[derive(Clone)]
pub struct SqliteStore {
    /// The SQLite connection, protected by a mutex.
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a blocking operation on the connection off the async runtime.
    async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().map_err(|e| {
                StoreError::Database(rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_LOCKED),
                    Some(format!("mutex poisoned: {}", e)),
                ))
            })?;
            f(&mut conn)
        })
        .await
        .map_err(|e| {
            StoreError::Database(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
                Some(format!("spawn_blocking failed: {}", e)),
            ))
        })?
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Row helpers
// ─────────────────────────────────────────────────────────────────────────────

fn blob_32(row: &rusqlite::Row<'_>, idx: usize, name: &str) -> rusqlite::Result<[u8; 32]> {
    let bytes: Vec<u8> = row.get(idx)?;
    bytes
        .try_into()
        .map_err(|_| rusqlite::Error::InvalidColumnType(idx, name.into(), rusqlite::types::Type::Blob))
}

const RESOURCE_COLUMNS: &str =
    "owner, resource_id, title, payload_locator, created_at, updated_at, deleted, \
     EXISTS(SELECT 1 FROM categories c WHERE c.owner = r.owner AND c.resource_id = r.resource_id)";

fn row_to_resource(row: &rusqlite::Row<'_>) -> rusqlite::Result<Resource> {
    let locator: String = row.get(3)?;
    let payload = PayloadLocator::parse(&locator).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(Resource {
        owner: PrincipalId::from_bytes(blob_32(row, 0, "owner")?),
        id: ResourceId(row.get::<_, i64>(1)? as u64),
        title: row.get(2)?,
        payload,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
        deleted: row.get::<_, i64>(6)? != 0,
        has_category: row.get::<_, i64>(7)? != 0,
    })
}

fn load_resource(conn: &Connection, owner: &PrincipalId, id: ResourceId) -> Result<Option<Resource>> {
    conn.query_row(
        &format!(
            "SELECT {} FROM resources r WHERE owner = ?1 AND resource_id = ?2",
            RESOURCE_COLUMNS
        ),
        params![owner.as_bytes().as_slice(), id.get() as i64],
        row_to_resource,
    )
    .optional()
    .map_err(StoreError::from)
}

fn require_resource(conn: &Connection, owner: &PrincipalId, id: ResourceId) -> Result<Resource> {
    load_resource(conn, owner, id)?
        .ok_or_else(|| StoreError::NotFound(format!("resource {}/{}", owner, id)))
}

fn encode_handles(handles: &ChunkHandles) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(handles, &mut buf)
        .map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(buf)
}

fn decode_handles(bytes: &[u8]) -> Result<ChunkHandles> {
    ciborium::from_reader(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn load_capability(
    conn: &Connection,
    resource: &ResourceRef,
    grantee: &PrincipalId,
) -> Result<Option<Capability>> {
    let row: Option<(Vec<u8>, i64)> = conn
        .query_row(
            "SELECT handles, created_at FROM capabilities
             WHERE owner = ?1 AND resource_id = ?2 AND grantee = ?3",
            params![
                resource.owner.as_bytes().as_slice(),
                resource.id.get() as i64,
                grantee.as_bytes().as_slice()
            ],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    row.map(|(handles, created_at)| {
        Ok(Capability {
            resource: *resource,
            grantor: resource.owner,
            grantee: *grantee,
            handles: decode_handles(&handles)?,
            created_at,
        })
    })
    .transpose()
}

fn insert_acl(
    tx: &Transaction<'_>,
    ids: &[HandleId],
    principal: &PrincipalId,
    resource: &ResourceRef,
) -> Result<()> {
    let mut stmt = tx.prepare_cached(
        "INSERT OR IGNORE INTO handle_acl (handle_id, principal, owner, resource_id)
         VALUES (?1, ?2, ?3, ?4)",
    )?;
    for id in ids {
        stmt.execute(params![
            id.as_bytes().as_slice(),
            principal.as_bytes().as_slice(),
            resource.owner.as_bytes().as_slice(),
            resource.id.get() as i64
        ])?;
    }
    Ok(())
}

fn delete_acl(tx: &Transaction<'_>, ids: &[HandleId], principal: &PrincipalId) -> Result<()> {
    let mut stmt =
        tx.prepare_cached("DELETE FROM handle_acl WHERE handle_id = ?1 AND principal = ?2")?;
    for id in ids {
        stmt.execute(params![id.as_bytes().as_slice(), principal.as_bytes().as_slice()])?;
    }
    Ok(())
}

/// Replace the owner's self-capability and its ACL rows.
fn write_self_capability(
    tx: &Transaction<'_>,
    resource: &ResourceRef,
    handles: &ChunkHandles,
    now: i64,
) -> Result<()> {
    let owner = resource.owner;
    if let Some(previous) = load_capability(tx, resource, &owner)? {
        delete_acl(tx, &previous.handles.ids(), &owner)?;
    }

    tx.execute(
        "INSERT OR REPLACE INTO capabilities (owner, resource_id, grantee, handles, created_at)
         VALUES (?1, ?2, ?1, ?3, ?4)",
        params![
            owner.as_bytes().as_slice(),
            resource.id.get() as i64,
            encode_handles(handles)?,
            now
        ],
    )?;
    insert_acl(tx, &handles.ids(), &owner, resource)
}

#[async_trait]
impl CapabilityStore for SqliteStore {
    async fn next_resource_id(&self, owner: &PrincipalId) -> Result<ResourceId> {
        let owner = *owner;
        self.run(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM resources WHERE owner = ?1",
                params![owner.as_bytes().as_slice()],
                |row| row.get(0),
            )?;
            Ok(ResourceId(count as u64))
        })
        .await
    }

    async fn create_resource(
        &self,
        submitter: &PrincipalId,
        expected_id: ResourceId,
        title: &str,
        payload: &PayloadLocator,
        keys: &EncryptedInput,
    ) -> Result<Resource> {
        let owner = *submitter;
        let resource = ResourceRef::new(owner, expected_id);
        let handles = validate::key_input(submitter, resource, submitter, keys)?;
        let title = title.to_string();
        let payload = payload.clone();

        self.run(move |conn| {
            let tx = conn.transaction()?;

            let next: i64 = tx.query_row(
                "SELECT COUNT(*) FROM resources WHERE owner = ?1",
                params![owner.as_bytes().as_slice()],
                |row| row.get(0),
            )?;
            if next as u64 != expected_id.get() {
                tracing::warn!(owner = %owner, expected = %expected_id, next, "resource id conflict");
                return Err(StoreError::Conflict(format!(
                    "resource id {} taken, next is {}",
                    expected_id, next
                )));
            }

            let now = now_millis();
            tx.execute(
                "INSERT INTO resources (
                    owner, resource_id, title, payload_locator, created_at, updated_at, deleted
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?5, 0)",
                params![
                    owner.as_bytes().as_slice(),
                    expected_id.get() as i64,
                    title,
                    payload.as_str(),
                    now
                ],
            )?;
            write_self_capability(&tx, &resource, &handles, now)?;

            let created = require_resource(&tx, &owner, expected_id)?;
            tx.commit()?;
            Ok(created)
        })
        .await
    }

    async fn update_content(
        &self,
        submitter: &PrincipalId,
        id: ResourceId,
        title: &str,
        payload: &PayloadLocator,
        keys: &EncryptedInput,
    ) -> Result<Resource> {
        let owner = *submitter;
        let resource = ResourceRef::new(owner, id);
        let handles = validate::key_input(submitter, resource, submitter, keys)?;
        let title = title.to_string();
        let payload = payload.clone();

        self.run(move |conn| {
            let tx = conn.transaction()?;
            require_resource(&tx, &owner, id)?;

            let now = now_millis();
            tx.execute(
                "UPDATE resources SET title = ?3, payload_locator = ?4, updated_at = ?5
                 WHERE owner = ?1 AND resource_id = ?2",
                params![
                    owner.as_bytes().as_slice(),
                    id.get() as i64,
                    title,
                    payload.as_str(),
                    now
                ],
            )?;
            write_self_capability(&tx, &resource, &handles, now)?;

            let updated = require_resource(&tx, &owner, id)?;
            tx.commit()?;
            Ok(updated)
        })
        .await
    }

    async fn update_title(
        &self,
        submitter: &PrincipalId,
        id: ResourceId,
        title: &str,
    ) -> Result<Resource> {
        let owner = *submitter;
        let title = title.to_string();

        self.run(move |conn| {
            let changed = conn.execute(
                "UPDATE resources SET title = ?3, updated_at = ?4
                 WHERE owner = ?1 AND resource_id = ?2",
                params![owner.as_bytes().as_slice(), id.get() as i64, title, now_millis()],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound(format!("resource {}/{}", owner, id)));
            }
            require_resource(conn, &owner, id)
        })
        .await
    }

    async fn set_deleted(
        &self,
        submitter: &PrincipalId,
        id: ResourceId,
        deleted: bool,
    ) -> Result<Resource> {
        let owner = *submitter;

        self.run(move |conn| {
            let changed = conn.execute(
                "UPDATE resources SET deleted = ?3, updated_at = ?4
                 WHERE owner = ?1 AND resource_id = ?2",
                params![
                    owner.as_bytes().as_slice(),
                    id.get() as i64,
                    deleted as i64,
                    now_millis()
                ],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound(format!("resource {}/{}", owner, id)));
            }
            require_resource(conn, &owner, id)
        })
        .await
    }

    async fn get_resource(&self, resource: &ResourceRef) -> Result<Option<Resource>> {
        let resource = *resource;
        self.run(move |conn| load_resource(conn, &resource.owner, resource.id))
            .await
    }

    async fn list_resources(
        &self,
        owner: &PrincipalId,
        include_deleted: bool,
    ) -> Result<Vec<Resource>> {
        let owner = *owner;

        self.run(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM resources r
                 WHERE owner = ?1 AND (?2 OR deleted = 0)
                 ORDER BY resource_id",
                RESOURCE_COLUMNS
            ))?;
            let resources = stmt
                .query_map(
                    params![owner.as_bytes().as_slice(), include_deleted],
                    row_to_resource,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(resources)
        })
        .await
    }

    async fn get_capability(
        &self,
        resource: &ResourceRef,
        grantee: &PrincipalId,
    ) -> Result<Option<Capability>> {
        let resource = *resource;
        let grantee = *grantee;
        self.run(move |conn| load_capability(conn, &resource, &grantee))
            .await
    }

    async fn insert_grant(
        &self,
        submitter: &PrincipalId,
        id: ResourceId,
        grantee: &PrincipalId,
        keys: &EncryptedInput,
    ) -> Result<GrantInsert> {
        validate::grantee(submitter, grantee)?;
        let owner = *submitter;
        let grantee = *grantee;
        let resource = ResourceRef::new(owner, id);
        let handles = validate::key_input(submitter, resource, &grantee, keys)?;
        let encoded = encode_handles(&handles)?;

        self.run(move |conn| {
            let tx = conn.transaction()?;
            require_resource(&tx, &owner, id)?;

            let now = now_millis();
            let inserted = tx.execute(
                "INSERT OR IGNORE INTO capabilities (owner, resource_id, grantee, handles, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    owner.as_bytes().as_slice(),
                    id.get() as i64,
                    grantee.as_bytes().as_slice(),
                    encoded,
                    now
                ],
            )?;
            if inserted == 0 {
                tracing::debug!(resource = %resource, grantee = %grantee, "grant already exists");
                return Ok(GrantInsert::AlreadyExists);
            }

            insert_acl(&tx, &handles.ids(), &grantee, &resource)?;
            tx.execute(
                "INSERT OR IGNORE INTO received_index (grantee, owner, resource_id, first_granted_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    grantee.as_bytes().as_slice(),
                    owner.as_bytes().as_slice(),
                    id.get() as i64,
                    now
                ],
            )?;

            tx.commit()?;
            Ok(GrantInsert::Inserted)
        })
        .await
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
        let grantee = *grantee;

        self.run(move |conn| {
            let tx = conn.transaction()?;
            let Some(capability) = load_capability(&tx, &resource, &grantee)? else {
                return Ok(false);
            };

            delete_acl(&tx, &capability.handles.ids(), &grantee)?;
            tx.execute(
                "DELETE FROM capabilities WHERE owner = ?1 AND resource_id = ?2 AND grantee = ?3",
                params![
                    resource.owner.as_bytes().as_slice(),
                    resource.id.get() as i64,
                    grantee.as_bytes().as_slice()
                ],
            )?;

            tx.commit()?;
            Ok(true)
        })
        .await
    }

    async fn list_grantees(&self, resource: &ResourceRef) -> Result<Vec<PrincipalId>> {
        let resource = *resource;

        self.run(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT grantee FROM capabilities
                 WHERE owner = ?1 AND resource_id = ?2 AND grantee != owner
                 ORDER BY grantee",
            )?;
            let grantees = stmt
                .query_map(
                    params![resource.owner.as_bytes().as_slice(), resource.id.get() as i64],
                    |row| Ok(PrincipalId::from_bytes(blob_32(row, 0, "grantee")?)),
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(grantees)
        })
        .await
    }

    async fn list_received(&self, grantee: &PrincipalId) -> Result<Vec<ReceivedGrant>> {
        let grantee = *grantee;

        self.run(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT owner, resource_id, first_granted_at FROM received_index
                 WHERE grantee = ?1
                 ORDER BY first_granted_at, owner, resource_id",
            )?;
            let entries = stmt
                .query_map(params![grantee.as_bytes().as_slice()], |row| {
                    Ok(ReceivedGrant {
                        resource: ResourceRef::new(
                            PrincipalId::from_bytes(blob_32(row, 0, "owner")?),
                            ResourceId(row.get::<_, i64>(1)? as u64),
                        ),
                        first_granted_at: row.get(2)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(entries)
        })
        .await
    }

    async fn set_category(
        &self,
        submitter: &PrincipalId,
        id: ResourceId,
        input: &EncryptedInput,
    ) -> Result<()> {
        let owner = *submitter;
        let resource = ResourceRef::new(owner, id);
        let handle = validate::category_input(submitter, resource, input)?;
        let encoded = handle.to_bytes()?;

        self.run(move |conn| {
            let tx = conn.transaction()?;
            require_resource(&tx, &owner, id)?;

            let previous: Option<Vec<u8>> = tx
                .query_row(
                    "SELECT handle FROM categories WHERE owner = ?1 AND resource_id = ?2",
                    params![owner.as_bytes().as_slice(), id.get() as i64],
                    |row| row.get(0),
                )
                .optional()?;
            if let Some(bytes) = previous {
                let previous = EncryptedChunkHandle::from_bytes(&bytes)?;
                delete_acl(&tx, &[previous.id()], &owner)?;
            }

            let now = now_millis();
            tx.execute(
                "INSERT OR REPLACE INTO categories (owner, resource_id, handle, updated_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![owner.as_bytes().as_slice(), id.get() as i64, encoded, now],
            )?;
            tx.execute(
                "UPDATE resources SET updated_at = ?3 WHERE owner = ?1 AND resource_id = ?2",
                params![owner.as_bytes().as_slice(), id.get() as i64, now],
            )?;
            insert_acl(&tx, &[handle.id()], &owner, &resource)?;

            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn get_category(
        &self,
        resource: &ResourceRef,
    ) -> Result<Option<EncryptedChunkHandle>> {
        let resource = *resource;

        self.run(move |conn| {
            let bytes: Option<Vec<u8>> = conn
                .query_row(
                    "SELECT handle FROM categories WHERE owner = ?1 AND resource_id = ?2",
                    params![resource.owner.as_bytes().as_slice(), resource.id.get() as i64],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(bytes
                .map(|b| EncryptedChunkHandle::from_bytes(&b))
                .transpose()?)
        })
        .await
    }

    async fn is_handle_authorized(
        &self,
        handle: &HandleId,
        principal: &PrincipalId,
    ) -> Result<bool> {
        let handle = *handle;
        let principal = *principal;

        self.run(move |conn| {
            let found: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM handle_acl WHERE handle_id = ?1 AND principal = ?2",
                    params![handle.as_bytes().as_slice(), principal.as_bytes().as_slice()],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(found.is_some())
        })
        .await
    }
}

#[async_trait]
impl BlobStore for SqliteStore {
    async fn put(&self, bytes: &[u8]) -> Result<PayloadLocator> {
        let locator = PayloadLocator::for_content(bytes);
        let bytes = bytes.to_vec();
        let key = locator.clone();

        self.run(move |conn| {
            conn.execute(
                "INSERT OR IGNORE INTO blobs (locator, bytes, stored_at) VALUES (?1, ?2, ?3)",
                params![key.as_str(), bytes, now_millis()],
            )?;
            Ok(())
        })
        .await?;
        Ok(locator)
    }

    async fn get(&self, locator: &PayloadLocator) -> Result<Vec<u8>> {
        let locator = locator.clone();

        self.run(move |conn| {
            let bytes: Vec<u8> = conn
                .query_row(
                    "SELECT bytes FROM blobs WHERE locator = ?1",
                    params![locator.as_str()],
                    |row| row.get(0),
                )
                .optional()?
                .ok_or_else(|| StoreError::NotFound(format!("blob {}", locator)))?;
            if !locator.matches(&bytes) {
                return Err(StoreError::InvalidData(format!(
                    "blob {} does not match its locator",
                    locator
                )));
            }
            Ok(bytes)
        })
        .await
    }
}

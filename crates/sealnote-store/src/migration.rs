//! Database schema migrations for SQLite.
//!
//! We use a simple versioned migration system. Each migration is a SQL string
//! that transforms the schema from version N to N+1.

use rusqlite::Connection;

use sealnote_core::now_millis;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema.
///
/// This function is idempotent - it can be called multiple times safely.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    // Create migrations table if it doesn't exist
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    // Get current version
    let current: u32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )?;

    if current > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "database schema version {} is newer than supported version {}",
            current, CURRENT_VERSION
        )));
    }

    // Apply migrations
    if current < CURRENT_VERSION {
        tracing::info!(from = current, to = CURRENT_VERSION, "applying schema migrations");
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, now_millis()],
            )?;
        }

        tx.commit()?;
    }

    Ok(())
}

/// Apply a specific migration version.
fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: Initial schema.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Resources: per-owner append-only array, resource_id is the index
        CREATE TABLE resources (
            owner BLOB NOT NULL,              -- 32 bytes, Ed25519 public key
            resource_id INTEGER NOT NULL,     -- index in the owner's array
            title TEXT NOT NULL,
            payload_locator TEXT NOT NULL,    -- b3:<hex> blob address
            created_at INTEGER NOT NULL,      -- Unix ms
            updated_at INTEGER NOT NULL,      -- Unix ms
            deleted INTEGER NOT NULL DEFAULT 0,

            PRIMARY KEY (owner, resource_id)
        );

        -- Capabilities: at most one row per (owner, resource, grantee)
        CREATE TABLE capabilities (
            owner BLOB NOT NULL,
            resource_id INTEGER NOT NULL,
            grantee BLOB NOT NULL,            -- owner itself for the self-capability
            handles BLOB NOT NULL,            -- CBOR array of 4 sealed handles
            created_at INTEGER NOT NULL,

            PRIMARY KEY (owner, resource_id, grantee)
        );

        -- Category handles (owner only)
        CREATE TABLE categories (
            owner BLOB NOT NULL,
            resource_id INTEGER NOT NULL,
            handle BLOB NOT NULL,             -- CBOR sealed handle
            updated_at INTEGER NOT NULL,

            PRIMARY KEY (owner, resource_id)
        );

        -- Handle ACL read by the oracle
        CREATE TABLE handle_acl (
            handle_id BLOB NOT NULL,          -- 32 bytes, Blake3 of the handle
            principal BLOB NOT NULL,
            owner BLOB NOT NULL,
            resource_id INTEGER NOT NULL,

            PRIMARY KEY (handle_id, principal)
        );

        -- Reverse index: every resource ever granted to a principal
        CREATE TABLE received_index (
            grantee BLOB NOT NULL,
            owner BLOB NOT NULL,
            resource_id INTEGER NOT NULL,
            first_granted_at INTEGER NOT NULL,

            PRIMARY KEY (grantee, owner, resource_id)
        );

        -- Content-addressed blobs
        CREATE TABLE blobs (
            locator TEXT PRIMARY KEY,
            bytes BLOB NOT NULL,
            stored_at INTEGER NOT NULL
        );

        -- Indexes for common queries
        CREATE INDEX idx_resources_owner_deleted ON resources(owner, deleted);
        CREATE INDEX idx_acl_resource ON handle_acl(owner, resource_id);
        CREATE INDEX idx_received_time ON received_index(grantee, first_granted_at);
        "#,
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_creates_tables() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();

        // Verify tables exist
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        for table in [
            "resources",
            "capabilities",
            "categories",
            "handle_acl",
            "received_index",
            "blobs",
            "schema_migrations",
        ] {
            assert!(tables.contains(&table.to_string()), "missing {}", table);
        }
    }

    #[test]
    fn test_migration_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        migrate(&mut conn).unwrap(); // Should not error
        migrate(&mut conn).unwrap(); // Still should not error

        // Verify version is 1
        let version: u32 = conn
            .query_row(
                "SELECT MAX(version) FROM schema_migrations",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(version, 1);
    }

    #[test]
    fn test_newer_schema_rejected() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        conn.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, 0)",
            [CURRENT_VERSION + 1],
        )
        .unwrap();

        assert!(matches!(
            migrate(&mut conn),
            Err(StoreError::Migration(_))
        ));
    }
}

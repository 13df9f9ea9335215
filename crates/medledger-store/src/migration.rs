//! Database schema migrations for SQLite.
//!
//! A simple versioned migration system: each migration is a SQL batch that
//! transforms the schema from version N to N+1.

use rusqlite::Connection;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema.
///
/// This function is idempotent - it can be called multiple times safely.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    if current < CURRENT_VERSION {
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
        -- Committed clinical records; create-once, never mutated
        CREATE TABLE records (
            record_id BLOB PRIMARY KEY,       -- 32 bytes, derived id
            patient_id TEXT NOT NULL,
            author_id TEXT,                   -- NULL for patient self-uploads
            content_digest BLOB NOT NULL,     -- 32 bytes, Blake3 digest
            metadata TEXT NOT NULL,           -- opaque JSON
            committed_at INTEGER NOT NULL,    -- Unix ms
            tx_id INTEGER NOT NULL            -- committing transaction
        );

        -- Consent slots; one row per (patient, entity), mutated via
        -- versioned updates only
        CREATE TABLE grants (
            grant_id BLOB PRIMARY KEY,        -- 32 bytes, derived from the pair
            patient_id TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            permissions TEXT NOT NULL,        -- JSON array of permission strings
            status TEXT NOT NULL,             -- pending | active | revoked
            granted_at INTEGER NOT NULL,
            revoked_at INTEGER,
            version INTEGER NOT NULL,         -- optimistic concurrency
            created_tx INTEGER NOT NULL,      -- creating transaction

            UNIQUE(patient_id, entity_id)
        );

        -- The append-only transaction log
        CREATE TABLE audit_entries (
            tx_id INTEGER PRIMARY KEY AUTOINCREMENT,
            operation TEXT NOT NULL,
            subject_id TEXT NOT NULL,
            subject_type TEXT NOT NULL,
            digest BLOB NOT NULL,             -- 32 bytes
            metadata TEXT NOT NULL,           -- opaque JSON
            timestamp INTEGER NOT NULL        -- Unix ms
        );

        -- Indexes for the query surface
        CREATE INDEX idx_records_patient ON records(patient_id, committed_at DESC);
        CREATE INDEX idx_grants_patient ON grants(patient_id);
        CREATE INDEX idx_grants_entity ON grants(entity_id);
        CREATE INDEX idx_audit_subject ON audit_entries(subject_type, subject_id);
        CREATE INDEX idx_audit_timestamp ON audit_entries(timestamp);
        "#,
    )?;

    Ok(())
}

/// Get current time in milliseconds.
fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_creates_tables() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        assert!(tables.contains(&"records".to_string()));
        assert!(tables.contains(&"grants".to_string()));
        assert!(tables.contains(&"audit_entries".to_string()));
        assert!(tables.contains(&"schema_migrations".to_string()));
    }

    #[test]
    fn test_migration_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        migrate(&mut conn).unwrap();
        migrate(&mut conn).unwrap();

        let version: u32 = conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }
}

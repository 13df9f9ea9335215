//! SQLite implementation of the LedgerStore trait.
//!
//! The durable backend. Uses rusqlite with bundled SQLite, wrapped in async
//! via `tokio::task::spawn_blocking`; every commit runs inside one SQLite
//! transaction, which provides the single-atomic-unit guarantee.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use medledger_consent::{AccessGrant, EntityType, GrantStatus};
use medledger_core::{
    AuditEntry, AuditEvent, Digest, EntityId, GrantId, LedgerRecord, Operation, PatientId,
    RecordId, SubjectType, TransactionId,
};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{AuditFilter, DocumentWrite, LedgerStore, QueryOrder, VersionedGrant};

/// SQLite-based transaction log.
///
/// Thread-safe via an internal mutex; all operations use `spawn_blocking`
/// to keep the async runtime unblocked.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing the durable path without touching disk.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a read-only operation on the connection off the async runtime.
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| StoreError::Backend("connection mutex poisoned".into()))?;
            f(&guard)
        })
        .await
        .map_err(|e| StoreError::Backend(format!("blocking task failed: {e}")))?
    }

    /// Run a mutating operation (needs `&mut` for transactions).
    async fn with_conn_mut<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| StoreError::Backend("connection mutex poisoned".into()))?;
            f(&mut guard)
        })
        .await
        .map_err(|e| StoreError::Backend(format!("blocking task failed: {e}")))?
    }
}

// ─────────────────────────────────────────────────────────────────────────
// Row mapping helpers
// ─────────────────────────────────────────────────────────────────────────

fn column_blob32(row: &rusqlite::Row<'_>, name: &'static str) -> rusqlite::Result<[u8; 32]> {
    let bytes: Vec<u8> = row.get(name)?;
    bytes.try_into().map_err(|_| {
        rusqlite::Error::InvalidColumnType(0, name.into(), rusqlite::types::Type::Blob)
    })
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<LedgerRecord> {
    let record_id = RecordId::from_bytes(column_blob32(row, "record_id")?);
    let content_digest = Digest::from_bytes(column_blob32(row, "content_digest")?);

    let patient: String = row.get("patient_id")?;
    let patient_id = PatientId::new(patient).map_err(|_| {
        rusqlite::Error::InvalidColumnType(1, "patient_id".into(), rusqlite::types::Type::Text)
    })?;

    let author: Option<String> = row.get("author_id")?;
    let author_id = match author {
        Some(a) => Some(medledger_core::ActorId::new(a).map_err(|_| {
            rusqlite::Error::InvalidColumnType(2, "author_id".into(), rusqlite::types::Type::Text)
        })?),
        None => None,
    };

    let metadata_text: String = row.get("metadata")?;
    let metadata = serde_json::from_str(&metadata_text).map_err(|_| {
        rusqlite::Error::InvalidColumnType(4, "metadata".into(), rusqlite::types::Type::Text)
    })?;

    Ok(LedgerRecord {
        record_id,
        patient_id,
        author_id,
        content_digest,
        metadata,
        committed_at: row.get("committed_at")?,
    })
}

fn row_to_versioned_grant(row: &rusqlite::Row<'_>) -> rusqlite::Result<VersionedGrant> {
    let grant_id = GrantId::from_bytes(column_blob32(row, "grant_id")?);

    let patient: String = row.get("patient_id")?;
    let patient_id = PatientId::new(patient).map_err(|_| {
        rusqlite::Error::InvalidColumnType(1, "patient_id".into(), rusqlite::types::Type::Text)
    })?;

    let entity: String = row.get("entity_id")?;
    let entity_id = EntityId::new(entity).map_err(|_| {
        rusqlite::Error::InvalidColumnType(2, "entity_id".into(), rusqlite::types::Type::Text)
    })?;

    let entity_type_text: String = row.get("entity_type")?;
    let entity_type = EntityType::from_str(&entity_type_text).ok_or_else(|| {
        rusqlite::Error::InvalidColumnType(3, "entity_type".into(), rusqlite::types::Type::Text)
    })?;

    let permissions_text: String = row.get("permissions")?;
    let permissions = serde_json::from_str(&permissions_text).map_err(|_| {
        rusqlite::Error::InvalidColumnType(4, "permissions".into(), rusqlite::types::Type::Text)
    })?;

    let status_text: String = row.get("status")?;
    let status = GrantStatus::from_str(&status_text).ok_or_else(|| {
        rusqlite::Error::InvalidColumnType(5, "status".into(), rusqlite::types::Type::Text)
    })?;

    let grant = AccessGrant {
        grant_id,
        patient_id,
        entity_id,
        entity_type,
        permissions,
        status,
        granted_at: row.get("granted_at")?,
        revoked_at: row.get("revoked_at")?,
    };

    Ok(VersionedGrant {
        grant,
        version: row.get::<_, i64>("version")? as u64,
    })
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<AuditEntry> {
    let operation_text: String = row.get("operation")?;
    let operation = Operation::from_str(&operation_text).ok_or_else(|| {
        rusqlite::Error::InvalidColumnType(1, "operation".into(), rusqlite::types::Type::Text)
    })?;

    let subject_type_text: String = row.get("subject_type")?;
    let subject_type = SubjectType::from_str(&subject_type_text).ok_or_else(|| {
        rusqlite::Error::InvalidColumnType(3, "subject_type".into(), rusqlite::types::Type::Text)
    })?;

    let metadata_text: String = row.get("metadata")?;
    let metadata = serde_json::from_str(&metadata_text).map_err(|_| {
        rusqlite::Error::InvalidColumnType(5, "metadata".into(), rusqlite::types::Type::Text)
    })?;

    Ok(AuditEntry {
        transaction_id: TransactionId(row.get::<_, i64>("tx_id")? as u64),
        operation,
        subject_id: row.get("subject_id")?,
        subject_type,
        digest: Digest::from_bytes(column_blob32(row, "digest")?),
        metadata,
        timestamp: row.get("timestamp")?,
    })
}

/// Validate a document write's expectations inside the commit transaction.
fn check_write(tx: &rusqlite::Transaction<'_>, write: &DocumentWrite) -> Result<()> {
    match write {
        DocumentWrite::CreateRecord(record) => {
            let existing: Option<i64> = tx
                .query_row(
                    "SELECT 1 FROM records WHERE record_id = ?1",
                    params![record.record_id.0.as_slice()],
                    |row| row.get(0),
                )
                .optional()?;
            if existing.is_some() {
                return Err(StoreError::DocumentExists {
                    id: record.record_id.to_hex(),
                });
            }
        }
        DocumentWrite::CreateGrant(grant) => {
            let existing: Option<i64> = tx
                .query_row(
                    "SELECT 1 FROM grants
                     WHERE grant_id = ?1 OR (patient_id = ?2 AND entity_id = ?3)",
                    params![
                        grant.grant_id.0.as_slice(),
                        grant.patient_id.as_str(),
                        grant.entity_id.as_str()
                    ],
                    |row| row.get(0),
                )
                .optional()?;
            if existing.is_some() {
                return Err(StoreError::SlotOccupied {
                    patient: grant.patient_id.to_string(),
                    entity: grant.entity_id.to_string(),
                });
            }
        }
        DocumentWrite::UpdateGrant {
            grant,
            expected_version,
        } => {
            let stored: Option<i64> = tx
                .query_row(
                    "SELECT version FROM grants WHERE grant_id = ?1",
                    params![grant.grant_id.0.as_slice()],
                    |row| row.get(0),
                )
                .optional()?;
            match stored {
                None => return Err(StoreError::NotFound(grant.grant_id.to_hex())),
                Some(actual) if actual as u64 != *expected_version => {
                    return Err(StoreError::VersionConflict {
                        id: grant.grant_id.to_hex(),
                        expected: *expected_version,
                        actual: actual as u64,
                    });
                }
                Some(_) => {}
            }
        }
    }
    Ok(())
}

/// Apply a validated document write inside the commit transaction.
fn apply_write(tx: &rusqlite::Transaction<'_>, write: &DocumentWrite, tx_id: i64) -> Result<()> {
    match write {
        DocumentWrite::CreateRecord(record) => {
            let metadata = serde_json::to_string(&record.metadata)
                .map_err(|e| StoreError::InvalidData(e.to_string()))?;
            tx.execute(
                "INSERT INTO records
                 (record_id, patient_id, author_id, content_digest, metadata, committed_at, tx_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    record.record_id.0.as_slice(),
                    record.patient_id.as_str(),
                    record.author_id.as_ref().map(|a| a.as_str()),
                    record.content_digest.0.as_slice(),
                    metadata,
                    record.committed_at,
                    tx_id
                ],
            )?;
        }
        DocumentWrite::CreateGrant(grant) => {
            let permissions = serde_json::to_string(&grant.permissions)
                .map_err(|e| StoreError::InvalidData(e.to_string()))?;
            tx.execute(
                "INSERT INTO grants
                 (grant_id, patient_id, entity_id, entity_type, permissions, status,
                  granted_at, revoked_at, version, created_tx)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 1, ?9)",
                params![
                    grant.grant_id.0.as_slice(),
                    grant.patient_id.as_str(),
                    grant.entity_id.as_str(),
                    grant.entity_type.as_str(),
                    permissions,
                    grant.status.as_str(),
                    grant.granted_at,
                    grant.revoked_at,
                    tx_id
                ],
            )?;
        }
        DocumentWrite::UpdateGrant { grant, .. } => {
            let permissions = serde_json::to_string(&grant.permissions)
                .map_err(|e| StoreError::InvalidData(e.to_string()))?;
            tx.execute(
                "UPDATE grants
                 SET entity_type = ?2, permissions = ?3, status = ?4,
                     granted_at = ?5, revoked_at = ?6, version = version + 1
                 WHERE grant_id = ?1",
                params![
                    grant.grant_id.0.as_slice(),
                    grant.entity_type.as_str(),
                    permissions,
                    grant.status.as_str(),
                    grant.granted_at,
                    grant.revoked_at
                ],
            )?;
        }
    }
    Ok(())
}

#[async_trait]
impl LedgerStore for SqliteStore {
    async fn commit(&self, write: Option<DocumentWrite>, event: AuditEvent) -> Result<AuditEntry> {
        self.with_conn_mut(move |conn| {
            let tx = conn.transaction()?;

            if let Some(write) = &write {
                check_write(&tx, write)?;
            }

            let metadata = serde_json::to_string(&event.metadata)
                .map_err(|e| StoreError::InvalidData(e.to_string()))?;
            tx.execute(
                "INSERT INTO audit_entries
                 (operation, subject_id, subject_type, digest, metadata, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    event.operation.as_str(),
                    event.subject_id,
                    event.subject_type.as_str(),
                    event.digest.0.as_slice(),
                    metadata,
                    event.timestamp
                ],
            )?;
            let tx_id = tx.last_insert_rowid();

            if let Some(write) = &write {
                apply_write(&tx, write, tx_id)?;
            }

            tx.commit()?;

            tracing::debug!(
                tx_id,
                operation = event.operation.as_str(),
                subject = %event.subject_id,
                "committed ledger transaction"
            );

            Ok(AuditEntry::from_event(TransactionId(tx_id as u64), event))
        })
        .await
    }

    async fn get_record(&self, id: &RecordId) -> Result<Option<LedgerRecord>> {
        let id = *id;
        self.with_conn(move |conn| {
            Ok(conn
                .query_row(
                    "SELECT record_id, patient_id, author_id, content_digest, metadata, committed_at
                     FROM records WHERE record_id = ?1",
                    params![id.0.as_slice()],
                    row_to_record,
                )
                .optional()?)
        })
        .await
    }

    async fn records_by_patient(&self, patient: &PatientId) -> Result<Vec<LedgerRecord>> {
        let patient = patient.clone();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT record_id, patient_id, author_id, content_digest, metadata, committed_at
                 FROM records WHERE patient_id = ?1
                 ORDER BY committed_at DESC, tx_id DESC",
            )?;
            let records = stmt
                .query_map(params![patient.as_str()], row_to_record)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(records)
        })
        .await
    }

    async fn get_grant(&self, id: &GrantId) -> Result<Option<VersionedGrant>> {
        let id = *id;
        self.with_conn(move |conn| {
            Ok(conn
                .query_row(
                    "SELECT grant_id, patient_id, entity_id, entity_type, permissions, status,
                            granted_at, revoked_at, version
                     FROM grants WHERE grant_id = ?1",
                    params![id.0.as_slice()],
                    row_to_versioned_grant,
                )
                .optional()?)
        })
        .await
    }

    async fn grants_by_patient(&self, patient: &PatientId) -> Result<Vec<AccessGrant>> {
        let patient = patient.clone();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT grant_id, patient_id, entity_id, entity_type, permissions, status,
                        granted_at, revoked_at, version
                 FROM grants WHERE patient_id = ?1
                 ORDER BY created_tx ASC",
            )?;
            let grants = stmt
                .query_map(params![patient.as_str()], row_to_versioned_grant)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(grants.into_iter().map(|vg| vg.grant).collect())
        })
        .await
    }

    async fn grants_by_entity(&self, entity: &EntityId) -> Result<Vec<AccessGrant>> {
        let entity = entity.clone();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT grant_id, patient_id, entity_id, entity_type, permissions, status,
                        granted_at, revoked_at, version
                 FROM grants WHERE entity_id = ?1
                 ORDER BY created_tx ASC",
            )?;
            let grants = stmt
                .query_map(params![entity.as_str()], row_to_versioned_grant)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(grants.into_iter().map(|vg| vg.grant).collect())
        })
        .await
    }

    async fn audit_entries(&self, filter: &AuditFilter) -> Result<Vec<AuditEntry>> {
        let filter = filter.clone();
        self.with_conn(move |conn| {
            let mut sql = String::from(
                "SELECT tx_id, operation, subject_id, subject_type, digest, metadata, timestamp
                 FROM audit_entries",
            );

            let mut conditions: Vec<&str> = Vec::new();
            let mut args: Vec<String> = Vec::new();
            if let Some(id) = &filter.subject_id {
                conditions.push("subject_id = ?");
                args.push(id.clone());
            }
            if let Some(st) = filter.subject_type {
                conditions.push("subject_type = ?");
                args.push(st.as_str().to_string());
            }
            if !conditions.is_empty() {
                sql.push_str(" WHERE ");
                sql.push_str(&conditions.join(" AND "));
            }

            sql.push_str(match filter.order {
                QueryOrder::CommitOrder => " ORDER BY timestamp ASC, tx_id ASC",
                QueryOrder::NewestFirst => " ORDER BY timestamp DESC, tx_id DESC",
            });

            let mut stmt = conn.prepare(&sql)?;
            let entries = stmt
                .query_map(rusqlite::params_from_iter(args.iter()), row_to_entry)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(entries)
        })
        .await
    }

    async fn audit_entry(&self, tx: TransactionId) -> Result<Option<AuditEntry>> {
        self.with_conn(move |conn| {
            Ok(conn
                .query_row(
                    "SELECT tx_id, operation, subject_id, subject_type, digest, metadata, timestamp
                     FROM audit_entries WHERE tx_id = ?1",
                    params![tx.as_u64() as i64],
                    row_to_entry,
                )
                .optional()?)
        })
        .await
    }
}

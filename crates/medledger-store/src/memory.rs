//! In-memory implementation of the LedgerStore trait.
//!
//! Primarily for tests and the simulated-ledger path. Same semantics as
//! SQLite but keeps everything in memory with no persistence. Thread-safe
//! via RwLock; a single write lock around `commit` provides the
//! one-atomic-unit guarantee.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use medledger_consent::AccessGrant;
use medledger_core::{
    AuditEntry, AuditEvent, EntityId, GrantId, LedgerRecord, PatientId, RecordId, TransactionId,
};

use crate::error::{Result, StoreError};
use crate::traits::{AuditFilter, DocumentWrite, LedgerStore, QueryOrder, VersionedGrant};

/// In-memory transaction log.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

struct StoredRecord {
    record: LedgerRecord,
    tx: TransactionId,
}

struct StoredGrant {
    grant: AccessGrant,
    version: u64,
    created_order: u64,
}

#[derive(Default)]
struct MemoryStoreInner {
    /// Records indexed by id.
    records: HashMap<RecordId, StoredRecord>,

    /// Index: patient -> their record ids.
    records_by_patient: HashMap<PatientId, Vec<RecordId>>,

    /// Grant slots indexed by id.
    grants: HashMap<GrantId, StoredGrant>,

    /// Index: patient -> their grant slots, in creation order.
    grants_by_patient: HashMap<PatientId, Vec<GrantId>>,

    /// Index: entity -> their grant slots, in creation order.
    grants_by_entity: HashMap<EntityId, Vec<GrantId>>,

    /// The append-only audit log, in commit order.
    entries: Vec<AuditEntry>,

    /// Next transaction id to assign.
    next_tx: u64,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner {
                next_tx: 1,
                ..Default::default()
            }),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStoreInner {
    /// Validate a document write against current state.
    fn check_write(&self, write: &DocumentWrite) -> Result<()> {
        match write {
            DocumentWrite::CreateRecord(record) => {
                if self.records.contains_key(&record.record_id) {
                    return Err(StoreError::DocumentExists {
                        id: record.record_id.to_hex(),
                    });
                }
            }
            DocumentWrite::CreateGrant(grant) => {
                if self.grants.contains_key(&grant.grant_id) {
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
                let stored = self
                    .grants
                    .get(&grant.grant_id)
                    .ok_or_else(|| StoreError::NotFound(grant.grant_id.to_hex()))?;
                if stored.version != *expected_version {
                    return Err(StoreError::VersionConflict {
                        id: grant.grant_id.to_hex(),
                        expected: *expected_version,
                        actual: stored.version,
                    });
                }
            }
        }
        Ok(())
    }

    /// Apply a validated document write.
    fn apply_write(&mut self, write: DocumentWrite, tx: TransactionId) {
        match write {
            DocumentWrite::CreateRecord(record) => {
                self.records_by_patient
                    .entry(record.patient_id.clone())
                    .or_default()
                    .push(record.record_id);
                self.records
                    .insert(record.record_id, StoredRecord { record, tx });
            }
            DocumentWrite::CreateGrant(grant) => {
                self.grants_by_patient
                    .entry(grant.patient_id.clone())
                    .or_default()
                    .push(grant.grant_id);
                self.grants_by_entity
                    .entry(grant.entity_id.clone())
                    .or_default()
                    .push(grant.grant_id);
                self.grants.insert(
                    grant.grant_id,
                    StoredGrant {
                        grant,
                        version: 1,
                        created_order: tx.as_u64(),
                    },
                );
            }
            DocumentWrite::UpdateGrant { grant, .. } => {
                // check_write verified existence and version.
                if let Some(stored) = self.grants.get_mut(&grant.grant_id) {
                    stored.grant = grant;
                    stored.version += 1;
                }
            }
        }
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn commit(&self, write: Option<DocumentWrite>, event: AuditEvent) -> Result<AuditEntry> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| StoreError::Backend("store lock poisoned".into()))?;

        if let Some(write) = &write {
            inner.check_write(write)?;
        }

        let tx = TransactionId(inner.next_tx);
        inner.next_tx += 1;

        if let Some(write) = write {
            inner.apply_write(write, tx);
        }

        let entry = AuditEntry::from_event(tx, event);
        inner.entries.push(entry.clone());
        Ok(entry)
    }

    async fn get_record(&self, id: &RecordId) -> Result<Option<LedgerRecord>> {
        let inner = self
            .inner
            .read()
            .map_err(|_| StoreError::Backend("store lock poisoned".into()))?;
        Ok(inner.records.get(id).map(|sr| sr.record.clone()))
    }

    async fn records_by_patient(&self, patient: &PatientId) -> Result<Vec<LedgerRecord>> {
        let inner = self
            .inner
            .read()
            .map_err(|_| StoreError::Backend("store lock poisoned".into()))?;

        let mut stored: Vec<&StoredRecord> = inner
            .records_by_patient
            .get(patient)
            .map(|ids| ids.iter().filter_map(|id| inner.records.get(id)).collect())
            .unwrap_or_default();

        // Newest first; transaction order breaks timestamp ties.
        stored.sort_by_key(|sr| std::cmp::Reverse((sr.record.committed_at, sr.tx)));
        Ok(stored.into_iter().map(|sr| sr.record.clone()).collect())
    }

    async fn get_grant(&self, id: &GrantId) -> Result<Option<VersionedGrant>> {
        let inner = self
            .inner
            .read()
            .map_err(|_| StoreError::Backend("store lock poisoned".into()))?;
        Ok(inner.grants.get(id).map(|sg| VersionedGrant {
            grant: sg.grant.clone(),
            version: sg.version,
        }))
    }

    async fn grants_by_patient(&self, patient: &PatientId) -> Result<Vec<AccessGrant>> {
        let inner = self
            .inner
            .read()
            .map_err(|_| StoreError::Backend("store lock poisoned".into()))?;

        let mut stored: Vec<&StoredGrant> = inner
            .grants_by_patient
            .get(patient)
            .map(|ids| ids.iter().filter_map(|id| inner.grants.get(id)).collect())
            .unwrap_or_default();
        stored.sort_by_key(|sg| sg.created_order);
        Ok(stored.into_iter().map(|sg| sg.grant.clone()).collect())
    }

    async fn grants_by_entity(&self, entity: &EntityId) -> Result<Vec<AccessGrant>> {
        let inner = self
            .inner
            .read()
            .map_err(|_| StoreError::Backend("store lock poisoned".into()))?;

        let mut stored: Vec<&StoredGrant> = inner
            .grants_by_entity
            .get(entity)
            .map(|ids| ids.iter().filter_map(|id| inner.grants.get(id)).collect())
            .unwrap_or_default();
        stored.sort_by_key(|sg| sg.created_order);
        Ok(stored.into_iter().map(|sg| sg.grant.clone()).collect())
    }

    async fn audit_entries(&self, filter: &AuditFilter) -> Result<Vec<AuditEntry>> {
        let inner = self
            .inner
            .read()
            .map_err(|_| StoreError::Backend("store lock poisoned".into()))?;

        let mut entries: Vec<AuditEntry> = inner
            .entries
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();

        match filter.order {
            QueryOrder::CommitOrder => {
                entries.sort_by_key(|e| (e.timestamp, e.transaction_id));
            }
            QueryOrder::NewestFirst => {
                entries.sort_by_key(|e| std::cmp::Reverse((e.timestamp, e.transaction_id)));
            }
        }
        Ok(entries)
    }

    async fn audit_entry(&self, tx: TransactionId) -> Result<Option<AuditEntry>> {
        let inner = self
            .inner
            .read()
            .map_err(|_| StoreError::Backend("store lock poisoned".into()))?;
        Ok(inner
            .entries
            .iter()
            .find(|e| e.transaction_id == tx)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medledger_consent::EntityType;
    use medledger_core::{Digest, Operation, SubjectType};
    use serde_json::json;
    use std::collections::BTreeSet;

    fn patient() -> PatientId {
        PatientId::new("p-001").unwrap()
    }

    fn entity() -> EntityId {
        EntityId::new("dr-042").unwrap()
    }

    fn perms() -> BTreeSet<String> {
        ["view-records".to_string()].into_iter().collect()
    }

    fn record_event(record: &LedgerRecord) -> AuditEvent {
        AuditEvent::new(
            Operation::AddRecord,
            record.record_id.to_hex(),
            SubjectType::Record,
            record.content_digest,
            json!({}),
            record.committed_at,
        )
    }

    fn grant_event(op: Operation, grant: &AccessGrant, ts: i64) -> AuditEvent {
        AuditEvent::new(
            op,
            grant.grant_id.to_hex(),
            SubjectType::Grant,
            Digest::of(grant),
            json!({ "grant": grant }),
            ts,
        )
    }

    #[tokio::test]
    async fn test_commit_assigns_monotonic_tx_ids() {
        let store = MemoryStore::new();
        let r1 = LedgerRecord::new(patient(), None, Digest::of_bytes(b"a"), json!({}), 1000);
        let r2 = LedgerRecord::new(patient(), None, Digest::of_bytes(b"b"), json!({}), 1001);

        let e1 = store
            .commit(Some(DocumentWrite::CreateRecord(r1.clone())), record_event(&r1))
            .await
            .unwrap();
        let e2 = store
            .commit(Some(DocumentWrite::CreateRecord(r2.clone())), record_event(&r2))
            .await
            .unwrap();

        assert!(e2.transaction_id > e1.transaction_id);
    }

    #[tokio::test]
    async fn test_create_record_is_create_once() {
        let store = MemoryStore::new();
        let record = LedgerRecord::new(patient(), None, Digest::of_bytes(b"a"), json!({}), 1000);

        store
            .commit(
                Some(DocumentWrite::CreateRecord(record.clone())),
                record_event(&record),
            )
            .await
            .unwrap();

        let err = store
            .commit(
                Some(DocumentWrite::CreateRecord(record.clone())),
                record_event(&record),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DocumentExists { .. }));

        // The losing commit appended nothing.
        let entries = store.audit_entries(&AuditFilter::all()).await.unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn test_grant_slot_unique() {
        let store = MemoryStore::new();
        let grant =
            AccessGrant::request(patient(), entity(), EntityType::Doctor, perms(), 1000).unwrap();

        store
            .commit(
                Some(DocumentWrite::CreateGrant(grant.clone())),
                grant_event(Operation::RequestAccess, &grant, 1000),
            )
            .await
            .unwrap();

        let err = store
            .commit(
                Some(DocumentWrite::CreateGrant(grant.clone())),
                grant_event(Operation::RequestAccess, &grant, 1001),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::SlotOccupied { .. }));
    }

    #[tokio::test]
    async fn test_update_grant_version_check() {
        let store = MemoryStore::new();
        let mut grant =
            AccessGrant::request(patient(), entity(), EntityType::Doctor, perms(), 1000).unwrap();

        store
            .commit(
                Some(DocumentWrite::CreateGrant(grant.clone())),
                grant_event(Operation::RequestAccess, &grant, 1000),
            )
            .await
            .unwrap();

        let versioned = store.get_grant(&grant.grant_id).await.unwrap().unwrap();
        assert_eq!(versioned.version, 1);

        grant.approve(2000).unwrap();
        store
            .commit(
                Some(DocumentWrite::UpdateGrant {
                    grant: grant.clone(),
                    expected_version: versioned.version,
                }),
                grant_event(Operation::GrantAccess, &grant, 2000),
            )
            .await
            .unwrap();

        // A second writer holding the stale version loses.
        let err = store
            .commit(
                Some(DocumentWrite::UpdateGrant {
                    grant: grant.clone(),
                    expected_version: versioned.version,
                }),
                grant_event(Operation::GrantAccess, &grant, 2001),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::VersionConflict { .. }));
        assert!(err.is_conflict());

        let current = store.get_grant(&grant.grant_id).await.unwrap().unwrap();
        assert_eq!(current.version, 2);
    }

    #[tokio::test]
    async fn test_records_by_patient_newest_first() {
        let store = MemoryStore::new();
        for (ts, bytes) in [(1000, b"a".as_ref()), (3000, b"b"), (2000, b"c")] {
            let record = LedgerRecord::new(patient(), None, Digest::of_bytes(bytes), json!({}), ts);
            store
                .commit(
                    Some(DocumentWrite::CreateRecord(record.clone())),
                    record_event(&record),
                )
                .await
                .unwrap();
        }

        let records = store.records_by_patient(&patient()).await.unwrap();
        let times: Vec<i64> = records.iter().map(|r| r.committed_at).collect();
        assert_eq!(times, vec![3000, 2000, 1000]);
    }

    #[tokio::test]
    async fn test_audit_query_filter_and_order() {
        let store = MemoryStore::new();
        let record = LedgerRecord::new(patient(), None, Digest::of_bytes(b"a"), json!({}), 1000);
        store
            .commit(
                Some(DocumentWrite::CreateRecord(record.clone())),
                record_event(&record),
            )
            .await
            .unwrap();

        let grant =
            AccessGrant::request(patient(), entity(), EntityType::Doctor, perms(), 2000).unwrap();
        store
            .commit(
                Some(DocumentWrite::CreateGrant(grant.clone())),
                grant_event(Operation::RequestAccess, &grant, 2000),
            )
            .await
            .unwrap();

        let all = store.audit_entries(&AuditFilter::all()).await.unwrap();
        assert_eq!(all.len(), 2);

        let grants_only = store
            .audit_entries(&AuditFilter::subject(grant.grant_id.to_hex(), SubjectType::Grant))
            .await
            .unwrap();
        assert_eq!(grants_only.len(), 1);

        let newest = store
            .audit_entries(&AuditFilter::all().newest_first())
            .await
            .unwrap();
        assert_eq!(newest[0].subject_type, SubjectType::Grant);
    }

    #[tokio::test]
    async fn test_audit_entry_lookup_by_tx() {
        let store = MemoryStore::new();
        let record = LedgerRecord::new(patient(), None, Digest::of_bytes(b"a"), json!({}), 1000);
        let committed = store
            .commit(
                Some(DocumentWrite::CreateRecord(record.clone())),
                record_event(&record),
            )
            .await
            .unwrap();

        let fetched = store
            .audit_entry(committed.transaction_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched, committed);
        assert!(store
            .audit_entry(TransactionId(999))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_audit_only_commit() {
        let store = MemoryStore::new();
        let entry = store
            .commit(
                None,
                AuditEvent::new(
                    Operation::ViewRecord,
                    "r-abc",
                    SubjectType::Record,
                    Digest::of_bytes(b"view"),
                    json!({"viewer": "dr-042"}),
                    5000,
                ),
            )
            .await
            .unwrap();
        assert_eq!(entry.transaction_id, TransactionId(1));
        assert!(store.get_record(&RecordId::from_bytes([0; 32])).await.unwrap().is_none());
    }
}

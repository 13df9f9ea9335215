//! LedgerStore trait: the abstract interface for the transaction log.
//!
//! This trait allows the contract layer to be storage-agnostic.
//! Implementations include SQLite (durable) and in-memory (tests and the
//! simulated-ledger path).

use async_trait::async_trait;
use medledger_consent::AccessGrant;
use medledger_core::{
    AuditEntry, AuditEvent, EntityId, GrantId, LedgerRecord, PatientId, RecordId, SubjectType,
    TransactionId,
};

use crate::error::Result;

/// A grant together with its optimistic-concurrency version.
///
/// The version increments on every committed update; an update must present
/// the version it read, and loses if the stored version moved on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedGrant {
    /// The grant state as stored.
    pub grant: AccessGrant,
    /// The version the state was read at.
    pub version: u64,
}

/// A guarded document mutation, committed atomically with its audit entry.
#[derive(Debug, Clone)]
pub enum DocumentWrite {
    /// Create a record. Fails with `DocumentExists` if the record id is
    /// already committed (records are create-once).
    CreateRecord(LedgerRecord),

    /// Create a fresh grant slot. Fails with `SlotOccupied` if any grant
    /// already exists for the (patient, entity) pair.
    CreateGrant(AccessGrant),

    /// Update an existing grant. Fails with `NotFound` if the grant does
    /// not exist, or `VersionConflict` if the stored version is no longer
    /// `expected_version`.
    UpdateGrant {
        grant: AccessGrant,
        expected_version: u64,
    },
}

/// Result ordering for audit queries.
///
/// The sort key is always `(timestamp, transaction_id)` so results are
/// deterministic even when timestamps collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryOrder {
    /// Oldest first: the order operations committed in.
    #[default]
    CommitOrder,
    /// Newest first: for history views.
    NewestFirst,
}

/// Filter for audit queries.
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    /// Only entries for this subject id.
    pub subject_id: Option<String>,
    /// Only entries for this subject type.
    pub subject_type: Option<SubjectType>,
    /// Result ordering.
    pub order: QueryOrder,
}

impl AuditFilter {
    /// All entries, in commit order.
    pub fn all() -> Self {
        Self::default()
    }

    /// Entries for one subject.
    pub fn subject(subject_id: impl Into<String>, subject_type: SubjectType) -> Self {
        Self {
            subject_id: Some(subject_id.into()),
            subject_type: Some(subject_type),
            order: QueryOrder::CommitOrder,
        }
    }

    /// Switch to newest-first ordering.
    pub fn newest_first(mut self) -> Self {
        self.order = QueryOrder::NewestFirst;
        self
    }

    /// Whether an entry passes this filter.
    pub fn matches(&self, entry: &AuditEntry) -> bool {
        if let Some(id) = &self.subject_id {
            if &entry.subject_id != id {
                return false;
            }
        }
        if let Some(st) = self.subject_type {
            if entry.subject_type != st {
                return false;
            }
        }
        true
    }
}

/// The LedgerStore trait: async interface for the transaction log.
///
/// # Design Notes
///
/// - **Single atomic unit**: `commit` applies the document write and the
///   audit entry together, or not at all.
/// - **Monotonic ids**: assigned transaction ids strictly increase; the log
///   is a total order over all operations.
/// - **Typed conflicts**: concurrency losers get `DocumentExists`,
///   `SlotOccupied`, or `VersionConflict`, never silent success.
/// - **Read-your-writes**: reads against the log see every committed write.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Commit a document write (if any) and its audit entry atomically.
    ///
    /// Assigns the transaction id and returns the committed entry. Passing
    /// `None` appends an audit-only entry (application-level events).
    async fn commit(&self, write: Option<DocumentWrite>, event: AuditEvent) -> Result<AuditEntry>;

    // ─────────────────────────────────────────────────────────────────────
    // Record reads
    // ─────────────────────────────────────────────────────────────────────

    /// Get a record by id.
    async fn get_record(&self, id: &RecordId) -> Result<Option<LedgerRecord>>;

    /// All records of a patient, newest first.
    async fn records_by_patient(&self, patient: &PatientId) -> Result<Vec<LedgerRecord>>;

    // ─────────────────────────────────────────────────────────────────────
    // Grant reads
    // ─────────────────────────────────────────────────────────────────────

    /// Get a grant and its version by id.
    async fn get_grant(&self, id: &GrantId) -> Result<Option<VersionedGrant>>;

    /// All grant slots of a patient, in creation order.
    async fn grants_by_patient(&self, patient: &PatientId) -> Result<Vec<AccessGrant>>;

    /// All grant slots of an entity, in creation order.
    async fn grants_by_entity(&self, entity: &EntityId) -> Result<Vec<AccessGrant>>;

    // ─────────────────────────────────────────────────────────────────────
    // Audit log reads
    // ─────────────────────────────────────────────────────────────────────

    /// Query audit entries, filtered and ordered deterministically.
    async fn audit_entries(&self, filter: &AuditFilter) -> Result<Vec<AuditEntry>>;

    /// Get one audit entry by transaction id.
    async fn audit_entry(&self, tx: TransactionId) -> Result<Option<AuditEntry>>;
}

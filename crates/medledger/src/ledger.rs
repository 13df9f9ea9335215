//! The Ledger Contract: validated, atomic state-transition operations.
//!
//! Every operation follows the same shape: validate preconditions against
//! current ledger state, mutate the document, append exactly one audit
//! entry in the same atomic unit, and return the document with its
//! transaction id. The store's create/version expectations guarantee that
//! of two concurrent transitions on one document id exactly one wins.

use std::sync::Arc;

use serde_json::{json, Value};

use medledger_consent::projection::SNAPSHOT_KEY;
use medledger_consent::{AccessGrant, DefaultPermissions, EntityType};
use medledger_core::{
    AuditEntry, AuditEvent, Caller, CoreError, Digest, EntityId, GrantId, IntegrityCheck,
    LedgerRecord, Operation, PatientId, RecordId, Role, SubjectType, TransactionId,
};
use medledger_store::{AuditFilter, DocumentWrite, LedgerStore, StoreError};

use crate::correlator::AuditCorrelator;
use crate::error::{LedgerError, Result};

/// Configuration for the ledger contract.
#[derive(Debug, Clone, Default)]
pub struct LedgerConfig {
    /// Default permission sets handed to entity-initiated requests.
    pub default_permissions: DefaultPermissions,
}

/// The ledger contract surface.
///
/// Generic over the transaction log backend; business rules live here and
/// only here.
pub struct Ledger<S: LedgerStore> {
    store: Arc<S>,
    config: LedgerConfig,
}

impl<S: LedgerStore> Ledger<S> {
    /// Create a contract over the given transaction log.
    pub fn new(store: S, config: LedgerConfig) -> Self {
        Self {
            store: Arc::new(store),
            config,
        }
    }

    /// Get the store reference.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// An audit correlator sharing this contract's transaction log.
    pub fn correlator(&self) -> AuditCorrelator<S> {
        AuditCorrelator::new(Arc::clone(&self.store))
    }

    /// Resolve a (patient, entity) pair to its canonical grant id.
    ///
    /// The pair is a single consent slot, so the resolution is pure.
    pub fn grant_id_for(&self, patient: &PatientId, entity: &EntityId) -> GrantId {
        GrantId::derive(patient, entity)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Record operations
    // ─────────────────────────────────────────────────────────────────────

    /// Commit a new clinical record.
    ///
    /// The content digest is computed by the caller before invocation; the
    /// ledger never reads artifact bytes. The author is the authenticated
    /// caller, omitted when the owning patient self-uploads.
    pub async fn create_record(
        &self,
        caller: &Caller,
        patient_id: PatientId,
        content_digest: Digest,
        metadata: Value,
    ) -> Result<(LedgerRecord, TransactionId)> {
        let now = now_millis();
        let author_id = if caller.is_patient(&patient_id) {
            None
        } else {
            Some(caller.actor.clone())
        };

        let record = LedgerRecord::new(patient_id, author_id, content_digest, metadata, now);
        let event = AuditEvent::new(
            Operation::AddRecord,
            record.record_id.to_hex(),
            SubjectType::Record,
            content_digest,
            json!({
                "patientId": record.patient_id.as_str(),
                "authorId": record.author_id.as_ref().map(|a| a.as_str()),
            }),
            now,
        );

        let entry = self
            .store
            .commit(Some(DocumentWrite::CreateRecord(record.clone())), event)
            .await
            .map_err(|e| match e {
                // The backend's create-once contract: committing against an
                // existing record id is reported as the document lookup
                // failing, not as a new conflict kind.
                StoreError::DocumentExists { id } => LedgerError::NotFound { what: "record", id },
                e => LedgerError::Unavailable(e),
            })?;

        tracing::info!(
            record = %record.record_id,
            patient = %record.patient_id,
            tx = %entry.transaction_id,
            "record committed"
        );
        Ok((record, entry.transaction_id))
    }

    /// All records of a patient, newest first.
    pub async fn records_by_patient(&self, patient: &PatientId) -> Result<Vec<LedgerRecord>> {
        self.store
            .records_by_patient(patient)
            .await
            .map_err(LedgerError::Unavailable)
    }

    /// Compare a candidate digest against the one stored at commit time.
    ///
    /// Returns a verification result, never an error, for unknown records
    /// and failed proofs alike.
    pub async fn verify_integrity(
        &self,
        record_id: &RecordId,
        candidate: &Digest,
    ) -> Result<IntegrityCheck> {
        let stored = self
            .store
            .get_record(record_id)
            .await
            .map_err(LedgerError::Unavailable)?;
        Ok(match stored {
            None => IntegrityCheck::UnknownRecord,
            Some(record) => IntegrityCheck::compare(record.content_digest, *candidate),
        })
    }

    // ─────────────────────────────────────────────────────────────────────
    // Consent operations
    // ─────────────────────────────────────────────────────────────────────

    /// Open an access request: none → pending, or revoked → pending.
    ///
    /// Entity-initiated. Permissions are the named default set for the
    /// entity type. A pair that already has a pending or active grant is a
    /// typed failure, never a silent duplicate.
    pub async fn request_access(
        &self,
        caller: &Caller,
        patient_id: PatientId,
        entity_id: EntityId,
        entity_type: EntityType,
    ) -> Result<(AccessGrant, TransactionId)> {
        if !caller.is_entity(&entity_id) {
            return Err(LedgerError::Forbidden(
                "only the requesting entity may open an access request".into(),
            ));
        }

        let now = now_millis();
        let permissions = self.config.default_permissions.for_entity(entity_type);
        let grant_id = self.grant_id_for(&patient_id, &entity_id);

        let (write, grant) = match self
            .store
            .get_grant(&grant_id)
            .await
            .map_err(LedgerError::Unavailable)?
        {
            None => {
                let grant =
                    AccessGrant::request(patient_id, entity_id, entity_type, permissions, now)?;
                (DocumentWrite::CreateGrant(grant.clone()), grant)
            }
            Some(versioned) => {
                let mut grant = versioned.grant;
                grant.reactivate(permissions, now)?;
                (
                    DocumentWrite::UpdateGrant {
                        grant: grant.clone(),
                        expected_version: versioned.version,
                    },
                    grant,
                )
            }
        };

        let entry = self
            .commit_consent(write, Operation::RequestAccess, &grant, now, |msg| {
                LedgerError::InvalidState(msg)
            })
            .await?;
        Ok((grant, entry.transaction_id))
    }

    /// Approve a pending request: pending → active.
    ///
    /// Callable only by the owning patient. `granted_at` becomes the
    /// approval time.
    pub async fn approve_access(
        &self,
        caller: &Caller,
        grant_id: &GrantId,
    ) -> Result<(AccessGrant, TransactionId)> {
        let versioned = self.load_grant(grant_id).await?;
        self.require_owner(caller, &versioned.grant)?;

        let now = now_millis();
        let mut grant = versioned.grant;
        grant.approve(now)?;

        let write = DocumentWrite::UpdateGrant {
            grant: grant.clone(),
            expected_version: versioned.version,
        };
        let entry = self
            .commit_consent(write, Operation::GrantAccess, &grant, now, |msg| {
                LedgerError::InvalidState(msg)
            })
            .await?;
        Ok((grant, entry.transaction_id))
    }

    /// Deny a pending request or revoke an active grant: → revoked.
    ///
    /// The state machine does not distinguish deny from revoke. Callable
    /// only by the owning patient; revoking an already-revoked grant fails.
    pub async fn revoke_access(
        &self,
        caller: &Caller,
        grant_id: &GrantId,
    ) -> Result<(AccessGrant, TransactionId)> {
        let versioned = self.load_grant(grant_id).await?;
        self.require_owner(caller, &versioned.grant)?;

        let now = now_millis();
        let mut grant = versioned.grant;
        grant.revoke(now)?;

        let write = DocumentWrite::UpdateGrant {
            grant: grant.clone(),
            expected_version: versioned.version,
        };
        let entry = self
            .commit_consent(write, Operation::RevokeAccess, &grant, now, |msg| {
                LedgerError::InvalidState(msg)
            })
            .await?;
        Ok((grant, entry.transaction_id))
    }

    /// Revoke by (patient, entity) pair, resolved to the canonical grant id
    /// at the boundary.
    pub async fn revoke_access_for(
        &self,
        caller: &Caller,
        patient: &PatientId,
        entity: &EntityId,
    ) -> Result<(AccessGrant, TransactionId)> {
        let grant_id = self.grant_id_for(patient, entity);
        self.revoke_access(caller, &grant_id).await
    }

    /// Grant access directly: none → active, or revoked → active.
    ///
    /// Patient-initiated, bypassing the request/approve handshake. Fails
    /// with a conflict if a pending or active grant already occupies the
    /// (patient, entity) slot.
    pub async fn grant_access(
        &self,
        caller: &Caller,
        patient_id: PatientId,
        entity_id: EntityId,
        entity_type: EntityType,
        permissions: std::collections::BTreeSet<String>,
    ) -> Result<(AccessGrant, TransactionId)> {
        if !caller.is_patient(&patient_id) {
            return Err(LedgerError::Forbidden(
                "only the owning patient may grant access directly".into(),
            ));
        }

        let now = now_millis();
        let grant_id = self.grant_id_for(&patient_id, &entity_id);

        let (write, grant) = match self
            .store
            .get_grant(&grant_id)
            .await
            .map_err(LedgerError::Unavailable)?
        {
            None => {
                let grant = AccessGrant::grant_direct(
                    patient_id,
                    entity_id,
                    entity_type,
                    permissions,
                    now,
                )?;
                (DocumentWrite::CreateGrant(grant.clone()), grant)
            }
            Some(versioned) if !versioned.grant.is_current() => {
                let mut grant = versioned.grant;
                grant.reactivate_direct(permissions, now)?;
                (
                    DocumentWrite::UpdateGrant {
                        grant: grant.clone(),
                        expected_version: versioned.version,
                    },
                    grant,
                )
            }
            Some(versioned) => {
                return Err(LedgerError::Conflict(format!(
                    "a {} grant already exists for this patient and entity",
                    versioned.grant.status
                )));
            }
        };

        let entry = self
            .commit_consent(write, Operation::GrantAccess, &grant, now, |msg| {
                LedgerError::Conflict(msg)
            })
            .await?;
        Ok((grant, entry.transaction_id))
    }

    /// All grant slots of a patient.
    pub async fn grants_by_patient(&self, patient: &PatientId) -> Result<Vec<AccessGrant>> {
        self.store
            .grants_by_patient(patient)
            .await
            .map_err(LedgerError::Unavailable)
    }

    /// All grant slots of an entity.
    pub async fn grants_by_entity(&self, entity: &EntityId) -> Result<Vec<AccessGrant>> {
        self.store
            .grants_by_entity(entity)
            .await
            .map_err(LedgerError::Unavailable)
    }

    /// Get a grant by id.
    pub async fn get_grant(&self, grant_id: &GrantId) -> Result<Option<AccessGrant>> {
        Ok(self
            .store
            .get_grant(grant_id)
            .await
            .map_err(LedgerError::Unavailable)?
            .map(|v| v.grant))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Claim review
    // ─────────────────────────────────────────────────────────────────────

    /// Record a claim review.
    ///
    /// Audit-only: claims live in the surrounding application; the ledger
    /// records that the review happened and fingerprints its outcome.
    pub async fn review_claim(
        &self,
        caller: &Caller,
        claim_id: &str,
        digest: Digest,
        metadata: Value,
    ) -> Result<TransactionId> {
        if caller.role != Role::Insurer {
            return Err(LedgerError::Forbidden(
                "only an insurer may review a claim".into(),
            ));
        }
        if claim_id.is_empty() {
            return Err(LedgerError::InvalidArgument(CoreError::InvalidId(
                "claim id must not be empty".into(),
            )));
        }

        let event = AuditEvent::new(
            Operation::ReviewClaim,
            claim_id,
            SubjectType::Claim,
            digest,
            metadata,
            now_millis(),
        );
        let entry = self
            .store
            .commit(None, event)
            .await
            .map_err(LedgerError::Unavailable)?;
        Ok(entry.transaction_id)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Audit log reads
    // ─────────────────────────────────────────────────────────────────────

    /// Query the transaction log.
    pub async fn audit_trail(&self, filter: &AuditFilter) -> Result<Vec<AuditEntry>> {
        self.store
            .audit_entries(filter)
            .await
            .map_err(LedgerError::Unavailable)
    }

    /// Get one audit entry by transaction id.
    pub async fn audit_entry(&self, tx: TransactionId) -> Result<Option<AuditEntry>> {
        self.store
            .audit_entry(tx)
            .await
            .map_err(LedgerError::Unavailable)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────

    async fn load_grant(&self, grant_id: &GrantId) -> Result<medledger_store::VersionedGrant> {
        self.store
            .get_grant(grant_id)
            .await
            .map_err(LedgerError::Unavailable)?
            .ok_or_else(|| LedgerError::NotFound {
                what: "grant",
                id: grant_id.to_hex(),
            })
    }

    fn require_owner(&self, caller: &Caller, grant: &AccessGrant) -> Result<()> {
        if caller.is_patient(&grant.patient_id) {
            Ok(())
        } else {
            Err(LedgerError::Forbidden(
                "only the owning patient may transition this grant".into(),
            ))
        }
    }

    /// Commit a consent transition with its audit entry.
    ///
    /// Concurrency losers (occupied slot, moved version) map to the
    /// operation's conflict kind; everything else is a backend fault.
    async fn commit_consent(
        &self,
        write: DocumentWrite,
        operation: Operation,
        grant: &AccessGrant,
        now: i64,
        on_conflict: impl FnOnce(String) -> LedgerError,
    ) -> Result<AuditEntry> {
        let event = AuditEvent::new(
            operation,
            grant.grant_id.to_hex(),
            SubjectType::Grant,
            Digest::of(grant),
            json!({ SNAPSHOT_KEY: grant }),
            now,
        );

        let entry = self
            .store
            .commit(Some(write), event)
            .await
            .map_err(|e| match e {
                e if e.is_conflict() => on_conflict(e.to_string()),
                StoreError::NotFound(id) => LedgerError::NotFound { what: "grant", id },
                e => LedgerError::Unavailable(e),
            })?;

        tracing::info!(
            grant = %grant.grant_id,
            patient = %grant.patient_id,
            entity = %grant.entity_id,
            status = %grant.status,
            tx = %entry.transaction_id,
            "consent transition committed"
        );
        Ok(entry)
    }
}

/// Get current time in milliseconds.
pub(crate) fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_millis() as i64
}

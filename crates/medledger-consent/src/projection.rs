//! Consent state reconstruction from the audit trail.
//!
//! Every consent operation embeds a snapshot of the committed grant in its
//! audit entry. Folding those entries in commit order therefore rebuilds
//! the full consent state without consulting any derived cache: the ledger
//! alone is sufficient.

use std::collections::HashMap;

use medledger_core::{AuditEntry, EntityId, GrantId, PatientId, SubjectType};

use crate::error::{ConsentError, Result};
use crate::grant::AccessGrant;

/// Key under which consent audit entries carry their grant snapshot.
pub const SNAPSHOT_KEY: &str = "grant";

/// Consent state rebuilt by replaying audit entries.
#[derive(Debug, Default)]
pub struct ConsentProjection {
    /// Latest grant state per slot.
    grants: HashMap<GrantId, AccessGrant>,

    /// Index: patient → their grant slots, in first-seen order.
    by_patient: HashMap<PatientId, Vec<GrantId>>,

    /// Index: entity → their grant slots, in first-seen order.
    by_entity: HashMap<EntityId, Vec<GrantId>>,
}

impl ConsentProjection {
    /// Create an empty projection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one audit entry.
    ///
    /// Non-consent entries are ignored; consent entries must carry a grant
    /// snapshot. Entries must be applied in commit order so that the latest
    /// snapshot per slot wins.
    pub fn apply(&mut self, entry: &AuditEntry) -> Result<()> {
        if !(entry.operation.is_consent() && entry.subject_type == SubjectType::Grant) {
            return Ok(());
        }

        let snapshot = entry
            .metadata
            .get(SNAPSHOT_KEY)
            .ok_or_else(|| ConsentError::InvalidSnapshot("missing grant snapshot".into()))?;
        let grant: AccessGrant = serde_json::from_value(snapshot.clone())
            .map_err(|e| ConsentError::InvalidSnapshot(e.to_string()))?;

        if !self.grants.contains_key(&grant.grant_id) {
            self.by_patient
                .entry(grant.patient_id.clone())
                .or_default()
                .push(grant.grant_id);
            self.by_entity
                .entry(grant.entity_id.clone())
                .or_default()
                .push(grant.grant_id);
        }
        self.grants.insert(grant.grant_id, grant);
        Ok(())
    }

    /// Apply a sequence of audit entries in order.
    pub fn apply_all<'a>(&mut self, entries: impl IntoIterator<Item = &'a AuditEntry>) -> Result<()> {
        for entry in entries {
            self.apply(entry)?;
        }
        Ok(())
    }

    /// The latest state of a grant slot.
    pub fn get(&self, grant_id: &GrantId) -> Option<&AccessGrant> {
        self.grants.get(grant_id)
    }

    /// All grant slots of a patient.
    pub fn grants_for_patient(&self, patient: &PatientId) -> Vec<&AccessGrant> {
        self.by_patient
            .get(patient)
            .map(|ids| ids.iter().filter_map(|id| self.grants.get(id)).collect())
            .unwrap_or_default()
    }

    /// All grant slots of an entity.
    pub fn grants_for_entity(&self, entity: &EntityId) -> Vec<&AccessGrant> {
        self.by_entity
            .get(entity)
            .map(|ids| ids.iter().filter_map(|id| self.grants.get(id)).collect())
            .unwrap_or_default()
    }

    /// Number of known grant slots.
    pub fn len(&self) -> usize {
        self.grants.len()
    }

    /// Whether the projection is empty.
    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }
}

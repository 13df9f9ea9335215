//! Test fixtures and helpers.
//!
//! Common setup code for ledger integration tests.

use serde_json::json;

use medledger::{Caller, Ledger, LedgerConfig, MemoryStore, Role, TransactionId};
use medledger_consent::{AccessGrant, EntityType};
use medledger_core::{Digest, EntityId, LedgerRecord, PatientId};

/// A test fixture wrapping an in-memory ledger with a stock configuration.
pub struct TestLedger {
    pub ledger: Ledger<MemoryStore>,
}

impl TestLedger {
    /// Create a fixture with the standard default-permission profile.
    pub fn new() -> Self {
        Self {
            ledger: Ledger::new(MemoryStore::new(), LedgerConfig::default()),
        }
    }

    /// Create a fixture with a custom configuration.
    pub fn with_config(config: LedgerConfig) -> Self {
        Self {
            ledger: Ledger::new(MemoryStore::new(), config),
        }
    }

    /// A numbered patient id.
    pub fn patient(n: u32) -> PatientId {
        PatientId::new(format!("patient-{n}")).expect("fixture id is well-formed")
    }

    /// A numbered doctor id.
    pub fn doctor(n: u32) -> EntityId {
        EntityId::new(format!("doctor-{n}")).expect("fixture id is well-formed")
    }

    /// A numbered insurer id.
    pub fn insurer(n: u32) -> EntityId {
        EntityId::new(format!("insurer-{n}")).expect("fixture id is well-formed")
    }

    /// Commit a self-uploaded record for the patient.
    pub async fn seed_record(
        &self,
        patient: &PatientId,
        artifact: &[u8],
    ) -> medledger::Result<(LedgerRecord, TransactionId)> {
        self.ledger
            .create_record(
                &Caller::patient(patient),
                patient.clone(),
                Digest::of_bytes(artifact),
                json!({"source": "fixture"}),
            )
            .await
    }

    /// Drive a (patient, entity) slot to an active doctor grant via the
    /// request/approve handshake.
    pub async fn seed_active_grant(
        &self,
        patient: &PatientId,
        entity: &EntityId,
    ) -> medledger::Result<AccessGrant> {
        let (grant, _) = self
            .ledger
            .request_access(
                &Caller::entity(entity, Role::Doctor),
                patient.clone(),
                entity.clone(),
                EntityType::Doctor,
            )
            .await?;
        let (active, _) = self
            .ledger
            .approve_access(&Caller::patient(patient), &grant.grant_id)
            .await?;
        Ok(active)
    }
}

impl Default for TestLedger {
    fn default() -> Self {
        Self::new()
    }
}

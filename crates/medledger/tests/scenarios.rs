//! End-to-end contract scenarios, exercised against both transaction log
//! backends. Business rules live in the contract, so both backends must
//! behave identically.

use std::collections::BTreeSet;

use serde_json::json;

use medledger::{
    AuditFilter, Caller, ConsentProjection, Digest, EntityId, EntityType, GrantStatus,
    IntegrityCheck, Ledger, LedgerConfig, LedgerError, LedgerStore, MemoryStore, PatientId, Role,
    SqliteStore, SubjectType,
};

fn patient() -> PatientId {
    PatientId::new("p-001").unwrap()
}

fn doctor() -> EntityId {
    EntityId::new("dr-042").unwrap()
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn memory_ledger() -> Ledger<MemoryStore> {
    init_tracing();
    Ledger::new(MemoryStore::new(), LedgerConfig::default())
}

fn sqlite_ledger() -> Ledger<SqliteStore> {
    init_tracing();
    Ledger::new(SqliteStore::open_memory().unwrap(), LedgerConfig::default())
}

/// Scenario from the consent lifecycle: request → approve → query →
/// revoke → re-request, all on the same grant slot.
async fn consent_lifecycle<S: LedgerStore>(ledger: Ledger<S>) -> anyhow::Result<()> {
    let p1 = patient();
    let e1 = doctor();
    let patient_caller = Caller::patient(&p1);
    let entity_caller = Caller::entity(&e1, Role::Doctor);

    // E1 requests access: a pending grant appears.
    let (g1, tx1) = ledger
        .request_access(&entity_caller, p1.clone(), e1.clone(), EntityType::Doctor)
        .await?;
    assert_eq!(g1.status, GrantStatus::Pending);
    assert_eq!(g1.grant_id, ledger.grant_id_for(&p1, &e1));

    // P1 approves: active, granted_at stamped at approval.
    let (approved, tx2) = ledger.approve_access(&patient_caller, &g1.grant_id).await?;
    assert_eq!(approved.status, GrantStatus::Active);
    assert!(approved.granted_at >= g1.granted_at);
    assert_eq!(approved.revoked_at, None);
    assert!(tx2 > tx1);

    // The grant shows up in both query projections.
    let by_patient = ledger.grants_by_patient(&p1).await?;
    assert_eq!(by_patient.len(), 1);
    assert_eq!(by_patient[0].status, GrantStatus::Active);
    let by_entity = ledger.grants_by_entity(&e1).await?;
    assert_eq!(by_entity.len(), 1);

    // P1 revokes.
    let (revoked, _) = ledger.revoke_access(&patient_caller, &g1.grant_id).await?;
    assert_eq!(revoked.status, GrantStatus::Revoked);
    assert!(revoked.revoked_at.unwrap() >= revoked.granted_at);

    // E1 requests again: same slot reopens as pending with default
    // permissions and a cleared revocation.
    let (reopened, _) = ledger
        .request_access(&entity_caller, p1.clone(), e1.clone(), EntityType::Doctor)
        .await?;
    assert_eq!(reopened.grant_id, g1.grant_id);
    assert_eq!(reopened.status, GrantStatus::Pending);
    assert_eq!(reopened.revoked_at, None);
    assert_eq!(reopened.permissions, g1.permissions);

    Ok(())
}

#[tokio::test]
async fn test_consent_lifecycle_memory() -> anyhow::Result<()> {
    consent_lifecycle(memory_ledger()).await
}

#[tokio::test]
async fn test_consent_lifecycle_sqlite() -> anyhow::Result<()> {
    consent_lifecycle(sqlite_ledger()).await
}

/// Scenario from record integrity: commit, then prove (and fail to prove)
/// the content digest.
async fn record_integrity<S: LedgerStore>(ledger: Ledger<S>) -> anyhow::Result<()> {
    let p1 = patient();
    let caller = Caller::patient(&p1);
    let digest = Digest::of_bytes(b"abc123");

    let (record, tx) = ledger
        .create_record(&caller, p1.clone(), digest, json!({"kind": "lab-result"}))
        .await?;
    assert!(record.is_self_upload());

    // Matching digest verifies.
    let check = ledger.verify_integrity(&record.record_id, &digest).await?;
    assert!(check.is_valid());

    // A different digest is a mismatch carrying both digests.
    let wrong = Digest::of_bytes(b"zzz999");
    match ledger.verify_integrity(&record.record_id, &wrong).await? {
        IntegrityCheck::Mismatch { stored, candidate } => {
            assert_eq!(stored, digest);
            assert_eq!(candidate, wrong);
        }
        other => panic!("expected mismatch, got {other:?}"),
    }

    // An unknown record id is a result, not an error.
    let unknown = medledger::RecordId::from_bytes([0xee; 32]);
    assert_eq!(
        ledger.verify_integrity(&unknown, &digest).await?,
        IntegrityCheck::UnknownRecord
    );

    // The committing transaction is on the audit trail.
    let entry = ledger.audit_entry(tx).await?.unwrap();
    assert_eq!(entry.subject_id, record.record_id.to_hex());

    Ok(())
}

#[tokio::test]
async fn test_record_integrity_memory() -> anyhow::Result<()> {
    record_integrity(memory_ledger()).await
}

#[tokio::test]
async fn test_record_integrity_sqlite() -> anyhow::Result<()> {
    record_integrity(sqlite_ledger()).await
}

#[tokio::test]
async fn test_request_on_occupied_slot_is_invalid_state() -> anyhow::Result<()> {
    let ledger = memory_ledger();
    let p1 = patient();
    let e1 = doctor();
    let entity_caller = Caller::entity(&e1, Role::Doctor);

    ledger
        .request_access(&entity_caller, p1.clone(), e1.clone(), EntityType::Doctor)
        .await?;

    // Pending slot: duplicate request fails.
    let err = ledger
        .request_access(&entity_caller, p1.clone(), e1.clone(), EntityType::Doctor)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidState(_)));

    // Active slot: still fails.
    let patient_caller = Caller::patient(&p1);
    let grant_id = ledger.grant_id_for(&p1, &e1);
    ledger.approve_access(&patient_caller, &grant_id).await?;
    let err = ledger
        .request_access(&entity_caller, p1, e1, EntityType::Doctor)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidState(_)));

    Ok(())
}

#[tokio::test]
async fn test_grant_access_direct_and_conflict() -> anyhow::Result<()> {
    let ledger = memory_ledger();
    let p1 = patient();
    let lab = EntityId::new("lab-9").unwrap();
    let patient_caller = Caller::patient(&p1);
    let perms: BTreeSet<String> = ["view-records".to_string()].into_iter().collect();

    // Direct grant lands active with no approval step.
    let (grant, _) = ledger
        .grant_access(
            &patient_caller,
            p1.clone(),
            lab.clone(),
            EntityType::Lab,
            perms.clone(),
        )
        .await?;
    assert_eq!(grant.status, GrantStatus::Active);

    // Granting again over the active slot is a conflict.
    let err = ledger
        .grant_access(
            &patient_caller,
            p1.clone(),
            lab.clone(),
            EntityType::Lab,
            perms.clone(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Conflict(_)));

    // After revocation the slot can be granted directly again.
    ledger.revoke_access(&patient_caller, &grant.grant_id).await?;
    let (regranted, _) = ledger
        .grant_access(&patient_caller, p1, lab, EntityType::Lab, perms)
        .await?;
    assert_eq!(regranted.grant_id, grant.grant_id);
    assert_eq!(regranted.status, GrantStatus::Active);

    Ok(())
}

#[tokio::test]
async fn test_revoke_errors() -> anyhow::Result<()> {
    let ledger = memory_ledger();
    let p1 = patient();
    let e1 = doctor();
    let patient_caller = Caller::patient(&p1);

    // Unknown grant id.
    let unknown = medledger::GrantId::from_bytes([0x11; 32]);
    let err = ledger
        .revoke_access(&patient_caller, &unknown)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::NotFound { what: "grant", .. }));

    // Revoking twice: first succeeds, second is invalid state.
    let entity_caller = Caller::entity(&e1, Role::Doctor);
    let (grant, _) = ledger
        .request_access(&entity_caller, p1.clone(), e1.clone(), EntityType::Doctor)
        .await?;
    ledger.revoke_access(&patient_caller, &grant.grant_id).await?;
    let err = ledger
        .revoke_access(&patient_caller, &grant.grant_id)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidState(_)));

    // Pair-form resolution reaches the same slot.
    let err = ledger
        .revoke_access_for(&patient_caller, &p1, &e1)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidState(_)));

    Ok(())
}

#[tokio::test]
async fn test_ownership_rules() -> anyhow::Result<()> {
    let ledger = memory_ledger();
    let p1 = patient();
    let e1 = doctor();
    let entity_caller = Caller::entity(&e1, Role::Doctor);

    let (grant, _) = ledger
        .request_access(&entity_caller, p1.clone(), e1.clone(), EntityType::Doctor)
        .await?;

    // The entity side cannot approve its own request.
    let err = ledger
        .approve_access(&entity_caller, &grant.grant_id)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Forbidden(_)));

    // Another patient cannot transition this grant.
    let other = PatientId::new("p-002").unwrap();
    let err = ledger
        .revoke_access(&Caller::patient(&other), &grant.grant_id)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Forbidden(_)));

    // An entity may only request on its own behalf.
    let err = ledger
        .request_access(
            &entity_caller,
            p1.clone(),
            EntityId::new("dr-099").unwrap(),
            EntityType::Doctor,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Forbidden(_)));

    // Direct grants are patient-only.
    let err = ledger
        .grant_access(
            &entity_caller,
            p1,
            e1,
            EntityType::Doctor,
            ["view-records".to_string()].into_iter().collect(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Forbidden(_)));

    Ok(())
}

#[tokio::test]
async fn test_author_attribution() -> anyhow::Result<()> {
    let ledger = memory_ledger();
    let p1 = patient();
    let digest = Digest::of_bytes(b"scan");

    // Patient self-upload: no author.
    let (own, _) = ledger
        .create_record(&Caller::patient(&p1), p1.clone(), digest, json!({}))
        .await?;
    assert!(own.is_self_upload());

    // Doctor upload: author is the caller.
    let dr = doctor();
    let (authored, _) = ledger
        .create_record(
            &Caller::entity(&dr, Role::Doctor),
            p1.clone(),
            Digest::of_bytes(b"scan-2"),
            json!({}),
        )
        .await?;
    assert_eq!(
        authored.author_id.as_ref().map(|a| a.as_str()),
        Some("dr-042")
    );

    Ok(())
}

#[tokio::test]
async fn test_records_newest_first() -> anyhow::Result<()> {
    let ledger = memory_ledger();
    let p1 = patient();
    let caller = Caller::patient(&p1);

    let mut ids = Vec::new();
    for i in 0..3 {
        let (record, _) = ledger
            .create_record(
                &caller,
                p1.clone(),
                Digest::of_bytes(format!("artifact-{i}").as_bytes()),
                json!({"seq": i}),
            )
            .await?;
        ids.push(record.record_id);
    }

    let listed = ledger.records_by_patient(&p1).await?;
    assert_eq!(listed.len(), 3);
    // Newest first: the last commit leads.
    assert_eq!(listed[0].record_id, ids[2]);
    assert_eq!(listed[2].record_id, ids[0]);

    Ok(())
}

#[tokio::test]
async fn test_every_operation_appends_exactly_one_entry() -> anyhow::Result<()> {
    let ledger = memory_ledger();
    let p1 = patient();
    let e1 = doctor();
    let patient_caller = Caller::patient(&p1);
    let entity_caller = Caller::entity(&e1, Role::Doctor);

    let (_, tx1) = ledger
        .create_record(&patient_caller, p1.clone(), Digest::of_bytes(b"a"), json!({}))
        .await?;
    let (g, tx2) = ledger
        .request_access(&entity_caller, p1.clone(), e1.clone(), EntityType::Doctor)
        .await?;
    let (_, tx3) = ledger.approve_access(&patient_caller, &g.grant_id).await?;
    let (_, tx4) = ledger.revoke_access(&patient_caller, &g.grant_id).await?;

    let trail = ledger.audit_trail(&AuditFilter::all()).await?;
    assert_eq!(trail.len(), 4);

    // Each returned transaction id matches exactly one entry.
    for tx in [tx1, tx2, tx3, tx4] {
        let matching: Vec<_> = trail.iter().filter(|e| e.transaction_id == tx).collect();
        assert_eq!(matching.len(), 1);
    }

    Ok(())
}

#[tokio::test]
async fn test_consent_state_replays_from_audit_trail() -> anyhow::Result<()> {
    let ledger = memory_ledger();
    let p1 = patient();
    let e1 = doctor();
    let lab = EntityId::new("lab-9").unwrap();
    let patient_caller = Caller::patient(&p1);
    let entity_caller = Caller::entity(&e1, Role::Doctor);

    let (g1, _) = ledger
        .request_access(&entity_caller, p1.clone(), e1.clone(), EntityType::Doctor)
        .await?;
    ledger.approve_access(&patient_caller, &g1.grant_id).await?;
    ledger
        .grant_access(
            &patient_caller,
            p1.clone(),
            lab.clone(),
            EntityType::Lab,
            ["view-records".to_string()].into_iter().collect(),
        )
        .await?;
    ledger.revoke_access(&patient_caller, &g1.grant_id).await?;

    // Replaying the trail alone reproduces the store's grant state.
    let trail = ledger.audit_trail(&AuditFilter::all()).await?;
    let mut projection = ConsentProjection::new();
    projection.apply_all(trail.iter())?;

    for stored in ledger.grants_by_patient(&p1).await? {
        let replayed = projection.get(&stored.grant_id).expect("slot replayed");
        assert_eq!(replayed, &stored);
    }
    assert_eq!(projection.len(), 2);

    Ok(())
}

#[tokio::test]
async fn test_claim_review_and_correlator_events() -> anyhow::Result<()> {
    let ledger = memory_ledger();
    let insurer = EntityId::new("ins-7").unwrap();
    let insurer_caller = Caller::entity(&insurer, Role::Insurer);

    // Claim review is insurer-only.
    let digest = Digest::of(&json!({"claim": "c-55", "decision": "approved"}));
    let tx = ledger
        .review_claim(&insurer_caller, "c-55", digest, json!({"reviewer": "ins-7"}))
        .await?;
    let entry = ledger.audit_entry(tx).await?.unwrap();
    assert_eq!(entry.subject_type, SubjectType::Claim);
    assert_eq!(entry.subject_id, "c-55");

    let err = ledger
        .review_claim(
            &Caller::patient(&patient()),
            "c-55",
            digest,
            json!({}),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Forbidden(_)));

    // The correlator records view events against the same log.
    let correlator = ledger.correlator();
    let view_tx = correlator
        .record(
            medledger::Operation::ViewRecord,
            "r-abc",
            SubjectType::Record,
            Digest::of_bytes(b"view"),
            json!({"viewer": "dr-042", "patient": "p-001"}),
        )
        .await?;
    assert!(view_tx > tx);
    let viewed = ledger.audit_entry(view_tx).await?.unwrap();
    assert_eq!(viewed.operation, medledger::Operation::ViewRecord);

    Ok(())
}

#[tokio::test]
async fn test_durable_backend_survives_reopen() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("ledger.db");
    let p1 = patient();
    let e1 = doctor();
    let digest = Digest::of_bytes(b"artifact");

    let grant_id;
    let record_id;
    {
        let ledger = Ledger::new(SqliteStore::open(&path)?, LedgerConfig::default());
        let (record, _) = ledger
            .create_record(&Caller::patient(&p1), p1.clone(), digest, json!({}))
            .await?;
        record_id = record.record_id;
        let (grant, _) = ledger
            .request_access(
                &Caller::entity(&e1, Role::Doctor),
                p1.clone(),
                e1.clone(),
                EntityType::Doctor,
            )
            .await?;
        grant_id = grant.grant_id;
    }

    let ledger = Ledger::new(SqliteStore::open(&path)?, LedgerConfig::default());
    assert!(ledger
        .verify_integrity(&record_id, &digest)
        .await?
        .is_valid());

    // The pending request is still approvable after reopen.
    let (approved, _) = ledger
        .approve_access(&Caller::patient(&p1), &grant_id)
        .await?;
    assert_eq!(approved.status, GrantStatus::Active);

    Ok(())
}

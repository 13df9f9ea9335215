//! # Medledger
//!
//! The unified API for the medledger consent & audit ledger: a
//! permissioned, append-only record of every sensitive state change, a
//! consent lifecycle governing who may view a patient's data, and content
//! digests that let any party later prove a record was not altered.
//!
//! ## Key Concepts
//!
//! - **Record**: Immutable once committed. Corrections are new records.
//! - **Grant**: One (patient, entity) consent slot; history lives on the
//!   same grant id through pending/active/revoked transitions.
//! - **Audit entry**: Exactly one per committed operation, appended in the
//!   same atomic unit as the state change.
//! - **Transaction id**: The log's total order; the handle a relational
//!   cache tags its derived rows with.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use medledger::{Ledger, LedgerConfig};
//! use medledger::core::{Caller, Digest, PatientId};
//! use medledger::store::SqliteStore;
//! use serde_json::json;
//!
//! async fn example() {
//!     let store = SqliteStore::open("ledger.db").unwrap();
//!     let ledger = Ledger::new(store, LedgerConfig::default());
//!
//!     let patient = PatientId::new("p-001").unwrap();
//!     let caller = Caller::patient(&patient);
//!     let digest = Digest::of_bytes(b"artifact bytes");
//!
//!     let (record, tx) = ledger
//!         .create_record(&caller, patient, digest, json!({"kind": "lab-result"}))
//!         .await
//!         .unwrap();
//!
//!     let check = ledger
//!         .verify_integrity(&record.record_id, &digest)
//!         .await
//!         .unwrap();
//!     assert!(check.is_valid());
//!     let _ = tx;
//! }
//! ```
//!
//! ## Re-exports
//!
//! This crate re-exports the component crates for convenience:
//!
//! - `medledger::core` - Core primitives (ids, digests, audit entries)
//! - `medledger::consent` - The consent state machine
//! - `medledger::store` - The transaction log backends

pub mod correlator;
pub mod error;
pub mod ledger;

// Re-export component crates
pub use medledger_consent as consent;
pub use medledger_core as core;
pub use medledger_store as store;

// Re-export main types for convenience
pub use correlator::AuditCorrelator;
pub use error::{LedgerError, Result};
pub use ledger::{Ledger, LedgerConfig};

// Re-export commonly used component types
pub use medledger_consent::{AccessGrant, ConsentProjection, DefaultPermissions, EntityType, GrantStatus};
pub use medledger_core::{
    AuditEntry, Caller, Digest, EntityId, GrantId, IntegrityCheck, LedgerRecord, Operation,
    PatientId, RecordId, Role, SubjectType, TransactionId,
};
pub use medledger_store::{AuditFilter, LedgerStore, MemoryStore, QueryOrder, SqliteStore};

//! # Medledger Core
//!
//! Pure primitives for the medledger consent & audit ledger: identifiers,
//! content digests, ledger records, and audit entries.
//!
//! This crate contains no I/O and no storage. It is pure computation over
//! the ledger's data structures.
//!
//! ## Key Types
//!
//! - [`Digest`] - Content fingerprint (Blake3 over canonical JSON)
//! - [`RecordId`] / [`GrantId`] - Content-derived document identifiers
//! - [`TransactionId`] - Monotonic id assigned by the transaction log
//! - [`LedgerRecord`] - One committed clinical artifact
//! - [`AuditEntry`] - One committed line of the transaction log
//!
//! ## Canonicalization
//!
//! Digests are computed over key-sorted JSON so that semantically identical
//! payloads always hash identically. See [`canonical`].

pub mod audit;
pub mod canonical;
pub mod digest;
pub mod error;
pub mod identity;
pub mod record;
pub mod types;

pub use audit::{AuditEntry, AuditEvent, Operation, SubjectType};
pub use canonical::canonical_bytes;
pub use digest::Digest;
pub use error::CoreError;
pub use identity::{Caller, Role};
pub use record::{IntegrityCheck, LedgerRecord};
pub use types::{ActorId, EntityId, GrantId, PatientId, RecordId, TransactionId};

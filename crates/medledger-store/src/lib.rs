//! # Medledger Store
//!
//! The transaction log: append-only persistence for audit entries and the
//! ledger documents they describe, behind the [`LedgerStore`] trait.
//!
//! ## Overview
//!
//! Two implementations share one contract: [`MemoryStore`] (tests and the
//! simulated-ledger path) and [`SqliteStore`] (the durable path). Business
//! rules live above the trait; neither implementation duplicates them.
//!
//! ## Key Types
//!
//! - [`LedgerStore`] - The async trait for all log operations
//! - [`DocumentWrite`] - A guarded document mutation committed with its entry
//! - [`AuditFilter`] / [`QueryOrder`] - Typed query surface over the log
//! - [`VersionedGrant`] - A grant plus its optimistic-concurrency version
//!
//! ## Atomicity
//!
//! [`LedgerStore::commit`] applies the document write and appends the audit
//! entry as one atomic unit, assigning the transaction id. There is no
//! window in which the ledger changed but its audit entry is missing, and a
//! backend fault aborts the whole operation with no partial writes.
//!
//! ## Concurrency
//!
//! Document writes carry expectations: create-new for records and fresh
//! grants, an expected version for grant updates, and a unique
//! (patient, entity) slot for grants. The store enforces them under one
//! lock or transaction, so of two racing transitions on the same document
//! exactly one wins and the loser sees a typed conflict.

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{AuditFilter, DocumentWrite, LedgerStore, QueryOrder, VersionedGrant};

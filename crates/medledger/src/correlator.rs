//! The Audit Correlator: binds application-level events to transaction ids.
//!
//! A thin wrapper over the transaction log append. It records events the
//! surrounding application considers sensitive (a doctor viewed a record, a
//! claim was reviewed) so every mutation and access is reconstructable from
//! the ledger alone. It never decides business outcomes.

use std::sync::Arc;

use serde_json::Value;

use medledger_core::{AuditEvent, Digest, Operation, SubjectType, TransactionId};
use medledger_store::LedgerStore;

use crate::error::{LedgerError, Result};
use crate::ledger::now_millis;

/// Records application-level audit events against the shared log.
pub struct AuditCorrelator<S: LedgerStore> {
    store: Arc<S>,
}

impl<S: LedgerStore> Clone for AuditCorrelator<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: LedgerStore> AuditCorrelator<S> {
    pub(crate) fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Append one audit entry and return its transaction id.
    pub async fn record(
        &self,
        operation: Operation,
        subject_id: impl Into<String>,
        subject_type: SubjectType,
        digest: Digest,
        metadata: Value,
    ) -> Result<TransactionId> {
        let event = AuditEvent::new(
            operation,
            subject_id,
            subject_type,
            digest,
            metadata,
            now_millis(),
        );
        let entry = self
            .store
            .commit(None, event)
            .await
            .map_err(LedgerError::Unavailable)?;

        tracing::debug!(
            tx = %entry.transaction_id,
            operation = entry.operation.as_str(),
            subject = %entry.subject_id,
            "audit event recorded"
        );
        Ok(entry.transaction_id)
    }
}

//! Audit entries: the immutable lines of the transaction log.
//!
//! Every committed ledger operation produces exactly one entry, in the same
//! atomic unit as the state change it describes. Entries are never updated
//! or deleted.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::digest::Digest;
use crate::types::TransactionId;

/// The operation an audit entry describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    /// A clinical record was committed.
    AddRecord,
    /// An entity requested access to a patient's records.
    RequestAccess,
    /// A grant became active (approval or direct grant).
    GrantAccess,
    /// A grant was denied or revoked.
    RevokeAccess,
    /// An insurer reviewed a claim.
    ReviewClaim,
    /// An entity viewed a patient's record (application-level event).
    ViewRecord,
}

impl Operation {
    /// The wire name, as persisted in the log.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AddRecord => "addRecord",
            Self::RequestAccess => "requestAccess",
            Self::GrantAccess => "grantAccess",
            Self::RevokeAccess => "revokeAccess",
            Self::ReviewClaim => "reviewClaim",
            Self::ViewRecord => "viewRecord",
        }
    }

    /// Parse from the wire name.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "addRecord" => Some(Self::AddRecord),
            "requestAccess" => Some(Self::RequestAccess),
            "grantAccess" => Some(Self::GrantAccess),
            "revokeAccess" => Some(Self::RevokeAccess),
            "reviewClaim" => Some(Self::ReviewClaim),
            "viewRecord" => Some(Self::ViewRecord),
            _ => None,
        }
    }

    /// Whether this operation transitions consent state.
    pub fn is_consent(self) -> bool {
        matches!(
            self,
            Self::RequestAccess | Self::GrantAccess | Self::RevokeAccess
        )
    }
}

/// The kind of document or subject an audit entry refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubjectType {
    Record,
    Grant,
    Claim,
    Patient,
}

impl SubjectType {
    /// The wire name, as persisted in the log.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Record => "record",
            Self::Grant => "grant",
            Self::Claim => "claim",
            Self::Patient => "patient",
        }
    }

    /// Parse from the wire name.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "record" => Some(Self::Record),
            "grant" => Some(Self::Grant),
            "claim" => Some(Self::Claim),
            "patient" => Some(Self::Patient),
            _ => None,
        }
    }
}

/// An audit line before the log has assigned its transaction id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// The operation being recorded.
    pub operation: Operation,

    /// The id of the affected record, grant, or claim.
    pub subject_id: String,

    /// What kind of subject the id refers to.
    pub subject_type: SubjectType,

    /// Content digest of the committed state.
    pub digest: Digest,

    /// Snapshot and context, opaque JSON.
    pub metadata: Value,

    /// When the operation was performed (Unix milliseconds).
    pub timestamp: i64,
}

impl AuditEvent {
    /// Build an audit event.
    pub fn new(
        operation: Operation,
        subject_id: impl Into<String>,
        subject_type: SubjectType,
        digest: Digest,
        metadata: Value,
        timestamp: i64,
    ) -> Self {
        Self {
            operation,
            subject_id: subject_id.into(),
            subject_type,
            digest,
            metadata,
            timestamp,
        }
    }
}

/// One committed, immutable line of the transaction log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Unique, monotonically increasing id assigned by the log.
    pub transaction_id: TransactionId,

    /// The operation recorded.
    pub operation: Operation,

    /// The id of the affected record, grant, or claim.
    pub subject_id: String,

    /// What kind of subject the id refers to.
    pub subject_type: SubjectType,

    /// Content digest of the committed state.
    pub digest: Digest,

    /// Snapshot and context, opaque JSON.
    pub metadata: Value,

    /// When the operation was performed (Unix milliseconds).
    pub timestamp: i64,
}

impl AuditEntry {
    /// Attach an assigned transaction id to a pending event.
    pub fn from_event(transaction_id: TransactionId, event: AuditEvent) -> Self {
        Self {
            transaction_id,
            operation: event.operation,
            subject_id: event.subject_id,
            subject_type: event.subject_type,
            digest: event.digest,
            metadata: event.metadata,
            timestamp: event.timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_operation_wire_roundtrip() {
        for op in [
            Operation::AddRecord,
            Operation::RequestAccess,
            Operation::GrantAccess,
            Operation::RevokeAccess,
            Operation::ReviewClaim,
            Operation::ViewRecord,
        ] {
            assert_eq!(Operation::from_str(op.as_str()), Some(op));
        }
        assert_eq!(Operation::from_str("dropTables"), None);
    }

    #[test]
    fn test_subject_type_wire_roundtrip() {
        for st in [
            SubjectType::Record,
            SubjectType::Grant,
            SubjectType::Claim,
            SubjectType::Patient,
        ] {
            assert_eq!(SubjectType::from_str(st.as_str()), Some(st));
        }
    }

    #[test]
    fn test_consent_operations() {
        assert!(Operation::RequestAccess.is_consent());
        assert!(Operation::GrantAccess.is_consent());
        assert!(Operation::RevokeAccess.is_consent());
        assert!(!Operation::AddRecord.is_consent());
        assert!(!Operation::ViewRecord.is_consent());
    }

    #[test]
    fn test_entry_from_event_preserves_fields() {
        let event = AuditEvent::new(
            Operation::AddRecord,
            "r-1",
            SubjectType::Record,
            Digest::of_bytes(b"x"),
            json!({"source": "upload"}),
            1000,
        );
        let entry = AuditEntry::from_event(TransactionId(9), event.clone());
        assert_eq!(entry.transaction_id, TransactionId(9));
        assert_eq!(entry.operation, event.operation);
        assert_eq!(entry.subject_id, event.subject_id);
        assert_eq!(entry.digest, event.digest);
        assert_eq!(entry.timestamp, event.timestamp);
    }
}

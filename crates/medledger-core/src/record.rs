//! LedgerRecord: one clinical artifact committed to the ledger.
//!
//! A record is immutable once committed. It cannot be edited; a correction
//! is a new record that supersedes the old one.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::digest::Digest;
use crate::types::{ActorId, PatientId, RecordId};

/// One committed clinical artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRecord {
    /// Content-derived record identifier.
    pub record_id: RecordId,

    /// The patient this artifact belongs to.
    pub patient_id: PatientId,

    /// The committing author. None for patient self-uploads.
    pub author_id: Option<ActorId>,

    /// Digest of the artifact bytes/metadata, computed before commit.
    /// Immutable once committed.
    pub content_digest: Digest,

    /// Opaque application metadata.
    pub metadata: Value,

    /// Commit time (Unix milliseconds). Immutable once committed.
    pub committed_at: i64,
}

impl LedgerRecord {
    /// Build a new record, deriving its id from the commit inputs.
    pub fn new(
        patient_id: PatientId,
        author_id: Option<ActorId>,
        content_digest: Digest,
        metadata: Value,
        committed_at: i64,
    ) -> Self {
        let record_id = RecordId::derive(
            &patient_id,
            &content_digest,
            author_id.as_ref(),
            committed_at,
        );
        Self {
            record_id,
            patient_id,
            author_id,
            content_digest,
            metadata,
            committed_at,
        }
    }

    /// Whether the patient uploaded this artifact themselves.
    pub fn is_self_upload(&self) -> bool {
        self.author_id.is_none()
    }
}

/// Outcome of an integrity verification.
///
/// A failed proof is meaningful output, not a fault: all three outcomes are
/// normal results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrityCheck {
    /// The candidate digest matches the digest stored at commit time.
    Verified {
        /// The matching digest.
        digest: Digest,
    },

    /// The candidate digest does not match the stored one.
    Mismatch {
        /// The digest stored at commit time.
        stored: Digest,
        /// The digest the caller presented.
        candidate: Digest,
    },

    /// No record exists under the given id.
    UnknownRecord,
}

impl IntegrityCheck {
    /// Compare a candidate digest against the stored one.
    pub fn compare(stored: Digest, candidate: Digest) -> Self {
        if stored == candidate {
            Self::Verified { digest: stored }
        } else {
            Self::Mismatch { stored, candidate }
        }
    }

    /// Whether the proof succeeded.
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Verified { .. })
    }

    /// The digest stored at commit time, if the record exists.
    pub fn stored_digest(&self) -> Option<&Digest> {
        match self {
            Self::Verified { digest } => Some(digest),
            Self::Mismatch { stored, .. } => Some(stored),
            Self::UnknownRecord => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn patient() -> PatientId {
        PatientId::new("p-001").unwrap()
    }

    #[test]
    fn test_record_id_derived_from_inputs() {
        let digest = Digest::of_bytes(b"scan bytes");
        let record = LedgerRecord::new(patient(), None, digest, json!({}), 1000);
        assert_eq!(
            record.record_id,
            RecordId::derive(&patient(), &digest, None, 1000)
        );
        assert!(record.is_self_upload());
    }

    #[test]
    fn test_authored_record_is_not_self_upload() {
        let digest = Digest::of_bytes(b"scan bytes");
        let author = ActorId::new("dr-042").unwrap();
        let record = LedgerRecord::new(patient(), Some(author), digest, json!({}), 1000);
        assert!(!record.is_self_upload());
    }

    #[test]
    fn test_integrity_check_verified() {
        let d = Digest::of_bytes(b"abc123");
        let check = IntegrityCheck::compare(d, d);
        assert!(check.is_valid());
        assert_eq!(check.stored_digest(), Some(&d));
    }

    #[test]
    fn test_integrity_check_mismatch_reports_both() {
        let stored = Digest::of_bytes(b"abc123");
        let candidate = Digest::of_bytes(b"zzz999");
        match IntegrityCheck::compare(stored, candidate) {
            IntegrityCheck::Mismatch {
                stored: s,
                candidate: c,
            } => {
                assert_eq!(s, stored);
                assert_eq!(c, candidate);
            }
            other => panic!("expected mismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_record_is_not_valid() {
        assert!(!IntegrityCheck::UnknownRecord.is_valid());
        assert_eq!(IntegrityCheck::UnknownRecord.stored_digest(), None);
    }
}

//! Strong type definitions for medledger identifiers.
//!
//! All identifiers are newtypes to prevent misuse at compile time. String
//! ids (patients, entities, actors) come from the surrounding application
//! and are validated for well-formedness; document ids (records, grants)
//! are derived content-addresses.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::digest::Digest;
use crate::error::CoreError;

/// Maximum length in bytes for caller-supplied string identifiers.
const MAX_ID_LEN: usize = 128;

/// Validate a caller-supplied identifier string.
fn validate_id(what: &str, s: &str) -> Result<(), CoreError> {
    if s.is_empty() {
        return Err(CoreError::InvalidId(format!("{what} must not be empty")));
    }
    if s.len() > MAX_ID_LEN {
        return Err(CoreError::InvalidId(format!(
            "{what} exceeds {MAX_ID_LEN} bytes"
        )));
    }
    if s.chars().any(|c| c.is_control()) {
        return Err(CoreError::InvalidId(format!(
            "{what} contains control characters"
        )));
    }
    Ok(())
}

/// A patient identifier, assigned by the surrounding application.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PatientId(String);

impl PatientId {
    /// Create a validated patient id.
    pub fn new(s: impl Into<String>) -> Result<Self, CoreError> {
        let s = s.into();
        validate_id("patient id", &s)?;
        Ok(Self(s))
    }

    /// Get the underlying string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PatientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An entity identifier: a doctor, lab, insurer, or researcher known to the
/// surrounding application.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(String);

impl EntityId {
    /// Create a validated entity id.
    pub fn new(s: impl Into<String>) -> Result<Self, CoreError> {
        let s = s.into();
        validate_id("entity id", &s)?;
        Ok(Self(s))
    }

    /// Get the underlying string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An authenticated actor identifier, as presented by the caller identity
/// layer. Patients act under their patient id; entities under their entity id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActorId(String);

impl ActorId {
    /// Create a validated actor id.
    pub fn new(s: impl Into<String>) -> Result<Self, CoreError> {
        let s = s.into();
        validate_id("actor id", &s)?;
        Ok(Self(s))
    }

    /// Get the underlying string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&PatientId> for ActorId {
    fn from(id: &PatientId) -> Self {
        Self(id.as_str().to_string())
    }
}

impl From<&EntityId> for ActorId {
    fn from(id: &EntityId) -> Self {
        Self(id.as_str().to_string())
    }
}

/// A 32-byte record identifier, derived from the commit inputs.
///
/// Two commits with the same patient, content digest, author, and timestamp
/// derive the same RecordId; records are create-once.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId(pub [u8; 32]);

impl RecordId {
    /// Derive a record id from its commit inputs.
    pub fn derive(
        patient: &PatientId,
        content_digest: &Digest,
        author: Option<&ActorId>,
        timestamp: i64,
    ) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"medledger-record-v0:");
        hasher.update(patient.as_str().as_bytes());
        hasher.update(b":");
        hasher.update(content_digest.as_bytes());
        hasher.update(b":");
        if let Some(author) = author {
            hasher.update(author.as_str().as_bytes());
        }
        hasher.update(b":");
        hasher.update(&timestamp.to_be_bytes());
        Self(*hasher.finalize().as_bytes())
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self, CoreError> {
        let bytes = hex::decode(s).map_err(|e| CoreError::InvalidId(e.to_string()))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CoreError::InvalidId("record id must be 32 bytes".into()))?;
        Ok(Self(arr))
    }
}

impl fmt::Debug for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordId({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..16])
    }
}

impl AsRef<[u8]> for RecordId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// A 32-byte grant identifier, derived from the (patient, entity) pair.
///
/// The pair is logically a single consent slot, so its grant id is stable
/// across the whole lifecycle including revocation and re-request.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GrantId(pub [u8; 32]);

impl GrantId {
    /// Derive the grant id for a (patient, entity) consent slot.
    pub fn derive(patient: &PatientId, entity: &EntityId) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"medledger-grant-v0:");
        hasher.update(patient.as_str().as_bytes());
        hasher.update(b":");
        hasher.update(entity.as_str().as_bytes());
        Self(*hasher.finalize().as_bytes())
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self, CoreError> {
        let bytes = hex::decode(s).map_err(|e| CoreError::InvalidId(e.to_string()))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CoreError::InvalidId("grant id must be 32 bytes".into()))?;
        Ok(Self(arr))
    }
}

impl fmt::Debug for GrantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GrantId({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for GrantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..16])
    }
}

impl AsRef<[u8]> for GrantId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// A transaction id assigned by the transaction log.
///
/// Unique and monotonically increasing: the log's total order over all
/// committed operations.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct TransactionId(pub u64);

impl TransactionId {
    /// Get the raw sequence number.
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tx-{}", self.0)
    }
}

impl From<u64> for TransactionId {
    fn from(n: u64) -> Self {
        Self(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patient_id_validation() {
        assert!(PatientId::new("p-001").is_ok());
        assert!(PatientId::new("").is_err());
        assert!(PatientId::new("a\nb").is_err());
        assert!(PatientId::new("x".repeat(129)).is_err());
    }

    #[test]
    fn test_grant_id_stable_for_pair() {
        let patient = PatientId::new("p-001").unwrap();
        let entity = EntityId::new("dr-042").unwrap();
        assert_eq!(
            GrantId::derive(&patient, &entity),
            GrantId::derive(&patient, &entity)
        );

        let other = EntityId::new("dr-043").unwrap();
        assert_ne!(
            GrantId::derive(&patient, &entity),
            GrantId::derive(&patient, &other)
        );
    }

    #[test]
    fn test_grant_id_not_symmetric_in_inputs() {
        // "a" + "bc" must not collide with "ab" + "c"
        let g1 = GrantId::derive(
            &PatientId::new("a").unwrap(),
            &EntityId::new("bc").unwrap(),
        );
        let g2 = GrantId::derive(
            &PatientId::new("ab").unwrap(),
            &EntityId::new("c").unwrap(),
        );
        assert_ne!(g1, g2);
    }

    #[test]
    fn test_record_id_sensitive_to_inputs() {
        let patient = PatientId::new("p-001").unwrap();
        let digest = Digest::of_bytes(b"artifact");
        let author = ActorId::new("dr-042").unwrap();

        let base = RecordId::derive(&patient, &digest, Some(&author), 1000);
        assert_eq!(base, RecordId::derive(&patient, &digest, Some(&author), 1000));
        assert_ne!(base, RecordId::derive(&patient, &digest, None, 1000));
        assert_ne!(base, RecordId::derive(&patient, &digest, Some(&author), 1001));
    }

    #[test]
    fn test_record_id_hex_roundtrip() {
        let id = RecordId::from_bytes([0x42; 32]);
        assert_eq!(RecordId::from_hex(&id.to_hex()).unwrap(), id);
    }

    #[test]
    fn test_transaction_id_ordering() {
        assert!(TransactionId(1) < TransactionId(2));
        assert_eq!(format!("{}", TransactionId(7)), "tx-7");
    }
}

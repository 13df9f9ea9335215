//! Content digests: Blake3 over canonical JSON.
//!
//! A digest fingerprints a payload at commit time so that any party can
//! later recompute it and prove the payload was not altered.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::canonical::canonical_bytes;
use crate::error::CoreError;

/// A 32-byte content digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Digest(pub [u8; 32]);

impl Digest {
    /// Compute the digest of any serializable payload.
    ///
    /// The payload is converted to JSON, canonicalized (key-sorted), and
    /// hashed with Blake3. Semantically identical payloads always produce
    /// identical digests.
    ///
    /// # Panics
    ///
    /// Panics if the payload cannot be represented as JSON (e.g. a map with
    /// non-string keys). That is a programmer error, not a runtime condition.
    pub fn of<T: Serialize>(payload: &T) -> Self {
        let value = serde_json::to_value(payload).expect("payload must be representable as JSON");
        Self::of_value(&value)
    }

    /// Compute the digest of a JSON value.
    pub fn of_value(value: &serde_json::Value) -> Self {
        Self::of_bytes(&canonical_bytes(value))
    }

    /// Compute the digest of raw bytes.
    pub fn of_bytes(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to the 64-character lowercase hex form.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from a 64-character hex string.
    pub fn from_hex(s: &str) -> Result<Self, CoreError> {
        let bytes = hex::decode(s).map_err(|e| CoreError::InvalidDigest(e.to_string()))?;
        if bytes.len() != 32 {
            return Err(CoreError::InvalidDigest(format!(
                "expected 32 bytes, got {}",
                bytes.len()
            )));
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// The zero digest (sentinel).
    pub const ZERO: Self = Self([0u8; 32]);
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl AsRef<[u8]> for Digest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for Digest {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

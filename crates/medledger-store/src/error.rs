//! Error types for the store module.

use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Backend execution fault (runtime, poisoned lock).
    #[error("backend fault: {0}")]
    Backend(String),

    /// A create-new expectation failed: the document already exists.
    #[error("document already exists: {id}")]
    DocumentExists { id: String },

    /// The (patient, entity) consent slot is already occupied.
    #[error("consent slot occupied for patient {patient} and entity {entity}")]
    SlotOccupied { patient: String, entity: String },

    /// An update lost the race: the stored version moved on.
    #[error("version conflict on {id}: expected {expected}, found {actual}")]
    VersionConflict {
        id: String,
        expected: u64,
        actual: u64,
    },

    /// An update targeted a document that does not exist.
    #[error("document not found: {0}")]
    NotFound(String),

    /// Stored data could not be decoded.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),
}

impl StoreError {
    /// Whether this error is a concurrency-loss signal rather than a
    /// backend fault.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::DocumentExists { .. } | Self::SlotOccupied { .. } | Self::VersionConflict { .. }
        )
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

//! Error taxonomy for the ledger contract.
//!
//! Validation and state-machine failures are typed results the caller can
//! act on; backend faults are a distinct kind so callers can tell "you
//! asked for something invalid" apart from "the ledger is unreachable".

use medledger_consent::ConsentError;
use medledger_core::CoreError;
use medledger_store::StoreError;
use thiserror::Error;

/// Errors surfaced by contract operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The referenced document does not exist.
    #[error("{what} not found: {id}")]
    NotFound { what: &'static str, id: String },

    /// The operation collides with current state (e.g. a duplicate active
    /// grant). Re-check current state before retrying.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The operation violates the consent machine's slot or transition
    /// rules, or lost a concurrent transition on the same document.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// The caller is not allowed to perform this transition.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// A caller-supplied argument failed well-formedness validation.
    #[error("invalid argument: {0}")]
    InvalidArgument(#[from] CoreError),

    /// The ledger backend failed or timed out. The whole operation was
    /// aborted with no partial writes; the caller may retry after deduping.
    #[error("ledger unavailable: {0}")]
    Unavailable(StoreError),
}

impl From<ConsentError> for LedgerError {
    fn from(e: ConsentError) -> Self {
        LedgerError::InvalidState(e.to_string())
    }
}

/// Result type for contract operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

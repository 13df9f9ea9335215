//! Error types for the consent state machine.

use thiserror::Error;

use crate::grant::GrantStatus;

/// Errors that can occur during consent transitions.
#[derive(Debug, Error)]
pub enum ConsentError {
    /// The requested transition is not legal from the grant's current state.
    #[error("cannot {action} a {from} grant")]
    InvalidTransition {
        from: GrantStatus,
        action: &'static str,
    },

    /// A grant must carry at least one permission.
    #[error("permission set must not be empty")]
    EmptyPermissions,

    /// An audit entry's grant snapshot could not be decoded.
    #[error("invalid grant snapshot: {0}")]
    InvalidSnapshot(String),
}

/// Result type for consent operations.
pub type Result<T> = std::result::Result<T, ConsentError>;

//! # Medledger Consent
//!
//! The consent lifecycle state machine: who may view a patient's data, and
//! how that permission changes over time.
//!
//! ## Overview
//!
//! One [`AccessGrant`] governs one (patient, entity) relationship. The pair
//! is a single logical slot: absence of a grant is the initial state, and
//! history is preserved by transitions on the same grant id, never by
//! parallel grants.
//!
//! ```text
//!   (none) ──request──▶ pending ──approve──▶ active
//!   (none) ─────────grant_direct───────────▶ active
//!   pending ──revoke (deny)──▶ revoked
//!   active ───revoke─────────▶ revoked
//!   revoked ──request (reactivate)──▶ pending
//!   revoked ──grant_direct──────────▶ active
//! ```
//!
//! Only the owning patient may move a grant into `active` or `revoked`;
//! the entity side may only open a `pending` request. Those ownership rules
//! are enforced by the contract layer; this crate owns the transitions
//! themselves.
//!
//! ## Replay
//!
//! [`ConsentProjection`] folds the audit trail back into grant state,
//! proving that consent is reconstructable from the ledger alone.

pub mod defaults;
pub mod error;
pub mod grant;
pub mod projection;

pub use defaults::DefaultPermissions;
pub use error::{ConsentError, Result};
pub use grant::{AccessGrant, EntityType, GrantStatus};
pub use projection::ConsentProjection;

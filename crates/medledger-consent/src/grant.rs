//! AccessGrant: one (patient, entity) consent relationship.
//!
//! Grants are mutated exclusively through the transition methods here.
//! Every transition validates the current status first; an illegal
//! transition returns [`ConsentError::InvalidTransition`] and leaves the
//! grant untouched.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use medledger_core::{EntityId, GrantId, PatientId};

use crate::error::{ConsentError, Result};

/// Lifecycle states of a grant. Absence of a grant is the initial state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GrantStatus {
    /// Requested by the entity, awaiting the patient's decision.
    Pending,
    /// Approved or directly granted by the patient.
    Active,
    /// Denied or revoked by the patient.
    Revoked,
}

impl GrantStatus {
    /// The wire name, as persisted.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Revoked => "revoked",
        }
    }

    /// Parse from the wire name.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "active" => Some(Self::Active),
            "revoked" => Some(Self::Revoked),
            _ => None,
        }
    }
}

impl fmt::Display for GrantStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The role tag of the entity side of a grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityType {
    Doctor,
    Lab,
    Insurer,
    Researcher,
}

impl EntityType {
    /// The wire name, as persisted.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Doctor => "doctor",
            Self::Lab => "lab",
            Self::Insurer => "insurer",
            Self::Researcher => "researcher",
        }
    }

    /// Parse from the wire name.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "doctor" => Some(Self::Doctor),
            "lab" => Some(Self::Lab),
            "insurer" => Some(Self::Insurer),
            "researcher" => Some(Self::Researcher),
            _ => None,
        }
    }
}

/// One (patient, entity) consent relationship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessGrant {
    /// Stable id of the consent slot, derived from (patient, entity).
    pub grant_id: GrantId,

    /// The patient whose data is governed.
    pub patient_id: PatientId,

    /// The entity being granted access.
    pub entity_id: EntityId,

    /// The entity's role tag.
    pub entity_type: EntityType,

    /// Granted permissions. Never empty.
    pub permissions: BTreeSet<String>,

    /// Current lifecycle state.
    pub status: GrantStatus,

    /// When the grant entered its current consent window (Unix ms).
    /// Set at request time, overwritten at approval time.
    pub granted_at: i64,

    /// When the grant was revoked. None unless status is revoked.
    pub revoked_at: Option<i64>,
}

impl AccessGrant {
    /// Open a new pending request: none → pending.
    ///
    /// Used when no grant exists yet for the pair. The contract layer is
    /// responsible for routing an existing revoked grant to [`reactivate`]
    /// instead.
    ///
    /// [`reactivate`]: AccessGrant::reactivate
    pub fn request(
        patient_id: PatientId,
        entity_id: EntityId,
        entity_type: EntityType,
        permissions: BTreeSet<String>,
        now: i64,
    ) -> Result<Self> {
        if permissions.is_empty() {
            return Err(ConsentError::EmptyPermissions);
        }
        let grant_id = GrantId::derive(&patient_id, &entity_id);
        Ok(Self {
            grant_id,
            patient_id,
            entity_id,
            entity_type,
            permissions,
            status: GrantStatus::Pending,
            granted_at: now,
            revoked_at: None,
        })
    }

    /// Create a grant directly in the active state: none → active.
    ///
    /// Patient-initiated proactive grant, bypassing the request/approve
    /// handshake.
    pub fn grant_direct(
        patient_id: PatientId,
        entity_id: EntityId,
        entity_type: EntityType,
        permissions: BTreeSet<String>,
        now: i64,
    ) -> Result<Self> {
        let mut grant = Self::request(patient_id, entity_id, entity_type, permissions, now)?;
        grant.status = GrantStatus::Active;
        Ok(grant)
    }

    /// Reopen a revoked slot as a fresh request: revoked → pending.
    ///
    /// Permissions are reset to the supplied (request-time default) set and
    /// the prior revocation timestamp is cleared.
    pub fn reactivate(&mut self, permissions: BTreeSet<String>, now: i64) -> Result<()> {
        if self.status != GrantStatus::Revoked {
            return Err(ConsentError::InvalidTransition {
                from: self.status,
                action: "re-request",
            });
        }
        if permissions.is_empty() {
            return Err(ConsentError::EmptyPermissions);
        }
        self.permissions = permissions;
        self.status = GrantStatus::Pending;
        self.granted_at = now;
        self.revoked_at = None;
        Ok(())
    }

    /// Reopen a revoked slot directly into the active state: revoked → active.
    pub fn reactivate_direct(&mut self, permissions: BTreeSet<String>, now: i64) -> Result<()> {
        self.reactivate(permissions, now)?;
        self.status = GrantStatus::Active;
        Ok(())
    }

    /// Approve a pending request: pending → active.
    ///
    /// `granted_at` becomes the approval time, not the original request time.
    pub fn approve(&mut self, now: i64) -> Result<()> {
        if self.status != GrantStatus::Pending {
            return Err(ConsentError::InvalidTransition {
                from: self.status,
                action: "approve",
            });
        }
        self.status = GrantStatus::Active;
        self.granted_at = now;
        self.revoked_at = None;
        Ok(())
    }

    /// Deny a pending request or revoke an active grant: → revoked.
    ///
    /// The machine does not distinguish deny from revoke. Revoking an
    /// already-revoked grant fails; the first revocation is the only one
    /// that succeeds.
    pub fn revoke(&mut self, now: i64) -> Result<()> {
        if self.status == GrantStatus::Revoked {
            return Err(ConsentError::InvalidTransition {
                from: self.status,
                action: "revoke",
            });
        }
        self.status = GrantStatus::Revoked;
        // revoked_at must never precede granted_at
        self.revoked_at = Some(now.max(self.granted_at));
        Ok(())
    }

    /// Whether this grant currently occupies its (patient, entity) slot.
    pub fn is_current(&self) -> bool {
        matches!(self.status, GrantStatus::Pending | GrantStatus::Active)
    }

    /// Whether the grant is active and carries the given permission.
    pub fn permits(&self, permission: &str) -> bool {
        self.status == GrantStatus::Active && self.permissions.contains(permission)
    }
}

//! Caller identity, as presented by the authentication layer.
//!
//! The ledger trusts that the surrounding application has already
//! authenticated the caller and verified its role claim; it never
//! re-verifies credentials.

use serde::{Deserialize, Serialize};

use crate::types::{ActorId, EntityId, PatientId};

/// The role a caller acts under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Patient,
    Doctor,
    Lab,
    Insurer,
    Researcher,
}

impl Role {
    /// The wire name of the role.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Patient => "patient",
            Self::Doctor => "doctor",
            Self::Lab => "lab",
            Self::Insurer => "insurer",
            Self::Researcher => "researcher",
        }
    }
}

/// An authenticated caller: who is asking, and in what role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    /// The authenticated actor id.
    pub actor: ActorId,

    /// The role claim attached to the session.
    pub role: Role,
}

impl Caller {
    /// Build a caller from its parts.
    pub fn new(actor: ActorId, role: Role) -> Self {
        Self { actor, role }
    }

    /// A patient acting on their own behalf.
    pub fn patient(id: &PatientId) -> Self {
        Self {
            actor: ActorId::from(id),
            role: Role::Patient,
        }
    }

    /// An entity acting under the given role.
    pub fn entity(id: &EntityId, role: Role) -> Self {
        Self {
            actor: ActorId::from(id),
            role,
        }
    }

    /// Whether this caller is the given patient acting as a patient.
    pub fn is_patient(&self, patient: &PatientId) -> bool {
        self.role == Role::Patient && self.actor.as_str() == patient.as_str()
    }

    /// Whether this caller is the given entity.
    pub fn is_entity(&self, entity: &EntityId) -> bool {
        self.actor.as_str() == entity.as_str()
    }
}

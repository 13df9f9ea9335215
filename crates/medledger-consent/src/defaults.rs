//! Named default permission sets.
//!
//! An entity-initiated request does not choose its own permissions; it
//! receives the default set registered for its entity type. The table is
//! configurable per deployment without touching the state machine.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use crate::grant::EntityType;

/// The permission every stock profile grants: read access to the patient's
/// records.
pub const PERM_VIEW_RECORDS: &str = "view-records";

/// Lookup table from entity type to the default permission set handed to a
/// new request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultPermissions {
    sets: BTreeMap<EntityType, BTreeSet<String>>,
}

impl DefaultPermissions {
    /// The stock profile: every entity type gets the same single
    /// view permission.
    pub fn standard() -> Self {
        let view: BTreeSet<String> = [PERM_VIEW_RECORDS.to_string()].into_iter().collect();
        let sets = [
            EntityType::Doctor,
            EntityType::Lab,
            EntityType::Insurer,
            EntityType::Researcher,
        ]
        .into_iter()
        .map(|et| (et, view.clone()))
        .collect();
        Self { sets }
    }

    /// Override the default set for one entity type.
    pub fn with_set(
        mut self,
        entity_type: EntityType,
        permissions: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.sets.insert(
            entity_type,
            permissions.into_iter().map(Into::into).collect(),
        );
        self
    }

    /// The default set for an entity type.
    ///
    /// Types without an explicit entry fall back to the stock view
    /// permission, so a lookup never yields an empty set.
    pub fn for_entity(&self, entity_type: EntityType) -> BTreeSet<String> {
        self.sets
            .get(&entity_type)
            .cloned()
            .unwrap_or_else(|| [PERM_VIEW_RECORDS.to_string()].into_iter().collect())
    }
}

impl Default for DefaultPermissions {
    fn default() -> Self {
        Self::standard()
    }
}

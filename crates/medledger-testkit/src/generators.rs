//! Proptest generators for property-based testing.

use std::collections::BTreeSet;

use proptest::prelude::*;
use serde_json::Value;

use medledger_consent::EntityType;
use medledger_core::{Digest, EntityId, PatientId};

/// Generate a well-formed patient id.
pub fn patient_id() -> impl Strategy<Value = PatientId> {
    "patient-[a-z0-9]{1,12}".prop_map(|s| PatientId::new(s).expect("generated id is well-formed"))
}

/// Generate a well-formed entity id.
pub fn entity_id() -> impl Strategy<Value = EntityId> {
    "entity-[a-z0-9]{1,12}".prop_map(|s| EntityId::new(s).expect("generated id is well-formed"))
}

/// Generate an entity type.
pub fn entity_type() -> impl Strategy<Value = EntityType> {
    prop_oneof![
        Just(EntityType::Doctor),
        Just(EntityType::Lab),
        Just(EntityType::Insurer),
        Just(EntityType::Researcher),
    ]
}

/// Generate a non-empty permission set.
pub fn permission_set() -> impl Strategy<Value = BTreeSet<String>> {
    prop::collection::btree_set("[a-z]{2,10}(-[a-z]{2,10})?", 1..5)
}

/// Generate a random digest.
pub fn digest() -> impl Strategy<Value = Digest> {
    any::<[u8; 32]>().prop_map(Digest::from_bytes)
}

/// Generate an opaque JSON metadata value (objects of scalars and small
/// nested structures).
pub fn metadata_value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| Value::Number(n.into())),
        "[a-zA-Z0-9 _.-]{0,16}".prop_map(Value::String),
    ];
    leaf.prop_recursive(3, 24, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z_]{1,8}", inner, 0..5)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

/// One step a caller can take against a single (patient, entity) slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsentAction {
    /// Entity-side request.
    Request,
    /// Patient-side approval.
    Approve,
    /// Patient-side deny/revoke.
    Revoke,
    /// Patient-side direct grant.
    GrantDirect,
}

/// Generate a sequence of consent actions against one slot.
pub fn consent_actions(max_len: usize) -> impl Strategy<Value = Vec<ConsentAction>> {
    prop::collection::vec(
        prop_oneof![
            Just(ConsentAction::Request),
            Just(ConsentAction::Approve),
            Just(ConsentAction::Revoke),
            Just(ConsentAction::GrantDirect),
        ],
        0..=max_len,
    )
}

//! Digest vectors for canonicalization checks.
//!
//! Each vector pairs a payload with a key-reordered rendering of the same
//! payload and a minimally altered one. They pin the canonicalization
//! *contract* - reordering never changes the digest, any edit always does -
//! without hardcoding implementation hashes.

use medledger_core::Digest;
use serde_json::Value;

/// One digest test vector.
#[derive(Debug, Clone)]
pub struct DigestVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    /// The payload, as JSON text.
    pub payload: &'static str,
    /// The same payload with keys in a different order.
    pub reordered: &'static str,
    /// The payload with one trivial edit.
    pub altered: &'static str,
    /// Expected digest (hex). Empty until pinned against a reference run.
    pub expected_digest: &'static str,
}

/// Get all digest test vectors.
pub fn all_vectors() -> Vec<DigestVector> {
    vec![
        DigestVector {
            name: "flat record metadata",
            payload: r#"{"kind":"lab-result","patient":"p-001","unit":"mmol/L"}"#,
            reordered: r#"{"unit":"mmol/L","patient":"p-001","kind":"lab-result"}"#,
            altered: r#"{"kind":"lab-result","patient":"p-001","unit":"mmol/l"}"#,
            expected_digest: "",
        },
        DigestVector {
            name: "nested consent snapshot",
            payload: r#"{"grant":{"entity":"dr-042","permissions":["view-records"],"status":"active"},"note":"routine"}"#,
            reordered: r#"{"note":"routine","grant":{"status":"active","entity":"dr-042","permissions":["view-records"]}}"#,
            altered: r#"{"grant":{"entity":"dr-042","permissions":["view-records"],"status":"revoked"},"note":"routine"}"#,
            expected_digest: "",
        },
        DigestVector {
            name: "empty object",
            payload: r#"{}"#,
            reordered: r#"{}"#,
            altered: r#"{"":null}"#,
            expected_digest: "",
        },
        DigestVector {
            name: "numbers and nulls",
            payload: r#"{"count":42,"previous":null,"ratio":-7}"#,
            reordered: r#"{"ratio":-7,"count":42,"previous":null}"#,
            altered: r#"{"count":43,"previous":null,"ratio":-7}"#,
            expected_digest: "",
        },
    ]
}

fn parse(text: &str) -> Value {
    serde_json::from_str(text).expect("vector JSON is well-formed")
}

/// Verify all vectors; returns (name, passed, computed digest hex).
pub fn verify_all_vectors() -> Vec<(String, bool, String)> {
    all_vectors()
        .iter()
        .map(|v| {
            let digest = Digest::of_value(&parse(v.payload));
            let hex = digest.to_hex();

            let reordered_matches = digest == Digest::of_value(&parse(v.reordered));
            let altered_differs = digest != Digest::of_value(&parse(v.altered));
            let pinned_matches = v.expected_digest.is_empty() || hex == v.expected_digest;

            (
                v.name.to_string(),
                reordered_matches && altered_differs && pinned_matches,
                hex,
            )
        })
        .collect()
}

//! Canonical JSON encoding for deterministic hashing.
//!
//! Rules:
//! - Object keys sorted by byte comparison
//! - Compact separators (no whitespace)
//! - Scalars rendered exactly as serde_json renders them
//!
//! The canonical encoding is critical: it ensures that the same payload
//! produces identical bytes (and thus an identical digest) regardless of the
//! key order the caller happened to build it with.

use serde_json::Value;

/// Encode a JSON value to canonical bytes.
pub fn canonical_bytes(value: &Value) -> Vec<u8> {
    let mut buf = Vec::new();
    encode_value_to(&mut buf, value);
    buf
}

/// Recursively encode a JSON value.
fn encode_value_to(buf: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Null => buf.extend_from_slice(b"null"),
        Value::Bool(true) => buf.extend_from_slice(b"true"),
        Value::Bool(false) => buf.extend_from_slice(b"false"),
        Value::Number(n) => buf.extend_from_slice(n.to_string().as_bytes()),
        Value::String(s) => encode_string(buf, s),
        Value::Array(arr) => {
            buf.push(b'[');
            for (i, item) in arr.iter().enumerate() {
                if i > 0 {
                    buf.push(b',');
                }
                encode_value_to(buf, item);
            }
            buf.push(b']');
        }
        Value::Object(map) => {
            // Sort keys by byte comparison; serde_json::Map may or may not
            // preserve insertion order depending on features, so never rely
            // on its iteration order.
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_unstable();

            buf.push(b'{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    buf.push(b',');
                }
                encode_string(buf, key);
                buf.push(b':');
                encode_value_to(buf, &map[key]);
            }
            buf.push(b'}');
        }
    }
}

/// Encode a string with serde_json's escaping.
fn encode_string(buf: &mut Vec<u8>, s: &str) {
    let escaped = serde_json::to_string(s).expect("string serialization is infallible");
    buf.extend_from_slice(escaped.as_bytes());
}

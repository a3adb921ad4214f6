//! Deterministic serialization of map documents.
//!
//! The same document always serializes to the same bytes, so change
//! detection can compare bytes (or their digest) instead of walking both
//! trees.

use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Pretty-printed JSON with object keys sorted at every depth and a trailing
/// newline, the form committed to the remote store.
///
/// # Errors
///
/// Returns [`serde_json::Error`] if `value` cannot be represented as JSON.
pub fn canonical_json_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    let raw = serde_json::to_value(value)?;
    let mut bytes = serde_json::to_vec_pretty(&normalize_json_value(raw))?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Hex SHA-256 of `bytes`.
#[must_use]
pub fn content_fingerprint(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

fn normalize_json_value(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map
                .into_iter()
                .map(|(k, v)| (k, normalize_json_value(v)))
                .collect();
            // `Map` only iterates in key order while serde_json's
            // `preserve_order` feature is off, and any crate in the build
            // graph can switch it on.
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(entries.into_iter().collect::<Map<String, Value>>())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(normalize_json_value).collect()),
        other => other,
    }
}

//! Canonical JSON and content hashing.
//!
//! The canonical form sorts object keys recursively (byte order) and emits no
//! insignificant whitespace, so two logically equal values hash the same no
//! matter how their maps were built.

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use tidemark_core::types::{ChangeDiff, OrgId};

use crate::error::IngestError;

/// The fields that define a change's identity for hashing and dedup.
///
/// Titles, timestamps, actor, and source are excluded, so the same logical
/// change reported twice produces the same hash.
#[derive(Debug, Clone, Serialize)]
pub struct HashSubject<'a> {
    pub organization_id: &'a OrgId,
    pub entity_type: &'a str,
    pub entity_id: &'a str,
    pub change_type: &'a str,
    pub diff: Option<&'a ChangeDiff>,
    pub payload: Option<&'a Value>,
}

/// Render `value` in canonical form.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, val)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(key, out);
                out.push(':');
                write_canonical(val, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::String(s) => write_string(s, out),
        // Null, bool, and number render identically in compact JSON.
        other => out.push_str(&other.to_string()),
    }
}

fn write_string(s: &str, out: &mut String) {
    // Value::String's Display produces the escaped, quoted form.
    out.push_str(&Value::String(s.to_owned()).to_string());
}

/// SHA-256 hex digest of the canonical form of anything serializable.
///
/// Fails only if `subject` cannot be represented as JSON (for example a map
/// with non-string keys).
pub fn content_hash<T: Serialize + ?Sized>(subject: &T) -> Result<String, IngestError> {
    let value = serde_json::to_value(subject).map_err(IngestError::Serialization)?;
    Ok(hash_canonical(&value))
}

/// SHA-256 hex digest of an already-converted value.
pub fn hash_canonical(value: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_json(value).as_bytes());
    hex::encode(hasher.finalize())
}

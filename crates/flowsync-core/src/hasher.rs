//! Canonical content hashing
//!
//! Every change-detection decision in the engine compares hashes produced
//! here, so the output must depend only on semantic content:
//!
//! - object keys are sorted at every nesting level before serializing
//! - the top-level `id`, `createdAt` and `updatedAt` fields are dropped
//! - the result is SHA-256 over the compact JSON, as lowercase hex
//!
//! Array order is significant and is preserved.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::domain::{ContentHash, DomainError, Workflow};

/// Top-level fields that change on every server read
const VOLATILE_FIELDS: [&str; 3] = ["id", "createdAt", "updatedAt"];

/// Hashes a typed workflow
///
/// # Errors
///
/// Returns `DomainError::InvalidWorkflow` if the workflow cannot be
/// serialized.
pub fn canonical_hash(workflow: &Workflow) -> Result<ContentHash, DomainError> {
    let value = serde_json::to_value(workflow)
        .map_err(|e| DomainError::InvalidWorkflow(format!("cannot serialize: {e}")))?;
    canonical_hash_value(&value)
}

/// Hashes an arbitrary JSON document with the same rules
///
/// # Errors
///
/// Returns `DomainError::InvalidHash` if serialization of the canonical form
/// fails.
pub fn canonical_hash_value(value: &Value) -> Result<ContentHash, DomainError> {
    let stripped = match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(k, _)| !VOLATILE_FIELDS.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        ),
        other => other.clone(),
    };

    let bytes = serde_json::to_vec(&sort_keys(stripped))
        .map_err(|e| DomainError::InvalidHash(format!("cannot serialize canonical form: {e}")))?;

    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    ContentHash::new(format!("{:x}", hasher.finalize()))
}

/// Rebuilds every object with its keys in sorted order
fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut sorted = Map::with_capacity(entries.len());
            for (k, v) in entries {
                sorted.insert(k, sort_keys(v));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

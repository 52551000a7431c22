// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 agentflow contributors

//! Checkpoint integrity
//!
//! The checksum is a BLAKE3 hash over the canonical JSON form of the
//! checkpoint (object keys sorted, `checksum` removed). Loading recomputes it
//! from the bytes on disk, so any edit that was not re-signed is caught.

use blake3::Hasher;
use serde_json::{Map, Value};

use super::Checkpoint;
use crate::errors::AgentflowError;

/// Schema version written by this release
pub const CURRENT_SCHEMA_VERSION: u64 = 1;

/// Oldest schema version this release can read
pub const MIN_SUPPORTED_SCHEMA_VERSION: u64 = 1;

/// Fields that must be present before a checkpoint is considered at all
pub const REQUIRED_FIELDS: &[&str] = &[
    "runId",
    "agent",
    "task",
    "mode",
    "stages",
    "createdAt",
    "updatedAt",
];

const CHECKSUM_FIELD: &str = "checksum";

/// Rebuild a JSON value with every object's keys in sorted order
fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();

            let mut sorted = Map::new();
            for key in keys {
                sorted.insert(key.clone(), canonicalize(&map[key]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Compute the checksum of a checkpoint payload, ignoring any stored checksum
pub fn checksum_of(payload: &Value) -> Result<String, AgentflowError> {
    let mut payload = payload.clone();
    if let Value::Object(map) = &mut payload {
        map.remove(CHECKSUM_FIELD);
    }

    let bytes = serde_json::to_vec(&canonicalize(&payload))?;

    let mut hasher = Hasher::new();
    hasher.update(&bytes);
    Ok(hasher.finalize().to_hex().to_string())
}

/// Stamp a checkpoint with its checksum
pub fn sign(checkpoint: &mut Checkpoint) -> Result<(), AgentflowError> {
    // Go through the serialized text so the hash sees exactly what a reader will parse
    let text = serde_json::to_string(checkpoint)?;
    let payload: Value = serde_json::from_str(&text)?;
    checkpoint.checksum = checksum_of(&payload)?;
    Ok(())
}

/// Validate raw checkpoint bytes and decode them.
///
/// Order: parse, required fields, checksum, schema version, typed decode.
pub fn decode(run_id: &str, bytes: &[u8]) -> Result<Checkpoint, AgentflowError> {
    let payload: Value =
        serde_json::from_slice(bytes).map_err(|e| AgentflowError::CorruptCheckpoint {
            run_id: run_id.to_string(),
            reason: format!("not valid JSON: {}", e),
        })?;

    let Value::Object(fields) = &payload else {
        return Err(AgentflowError::CorruptCheckpoint {
            run_id: run_id.to_string(),
            reason: "top-level value is not an object".into(),
        });
    };

    for field in REQUIRED_FIELDS {
        if fields.get(*field).map_or(true, Value::is_null) {
            return Err(AgentflowError::MissingCheckpointField {
                run_id: run_id.to_string(),
                field: field.to_string(),
            });
        }
    }

    let stored = fields
        .get(CHECKSUM_FIELD)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let actual = checksum_of(&payload)?;

    if stored != actual {
        return Err(AgentflowError::ChecksumMismatch {
            run_id: run_id.to_string(),
            expected: stored,
            actual,
        });
    }

    let version = fields
        .get("schemaVersion")
        .and_then(Value::as_u64)
        .unwrap_or(0);

    if !(MIN_SUPPORTED_SCHEMA_VERSION..=CURRENT_SCHEMA_VERSION).contains(&version) {
        return Err(AgentflowError::IncompatibleSchemaVersion {
            run_id: run_id.to_string(),
            found: version,
            supported: format!("{}..={}", MIN_SUPPORTED_SCHEMA_VERSION, CURRENT_SCHEMA_VERSION),
        });
    }

    let checkpoint: Checkpoint =
        serde_json::from_value(payload).map_err(|e| AgentflowError::CorruptCheckpoint {
            run_id: run_id.to_string(),
            reason: e.to_string(),
        })?;

    if !checkpoint.run_id.eq_ignore_ascii_case(run_id) {
        return Err(AgentflowError::CorruptCheckpoint {
            run_id: run_id.to_string(),
            reason: format!("payload belongs to run '{}'", checkpoint.run_id),
        });
    }

    Ok(checkpoint)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_checksum_ignores_key_order_and_checksum_field() {
        let a = json!({"b": 1, "a": {"y": [1, 2], "x": "s"}, "checksum": "old"});
        let b = json!({"a": {"x": "s", "y": [1, 2]}, "b": 1});

        assert_eq!(checksum_of(&a).unwrap(), checksum_of(&b).unwrap());
    }

    #[test]
    fn test_checksum_detects_value_change() {
        let a = json!({"task": "write"});
        let b = json!({"task": "wrote"});

        assert_ne!(checksum_of(&a).unwrap(), checksum_of(&b).unwrap());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = decode("3f2b8c1e-7d4a-4e0b-9c6f-2a1d5e8b7c90", b"{not json").unwrap_err();
        assert!(matches!(err, AgentflowError::CorruptCheckpoint { .. }));
    }

    #[test]
    fn test_missing_field_checked_before_checksum() {
        let payload = json!({
            "runId": "3f2b8c1e-7d4a-4e0b-9c6f-2a1d5e8b7c90",
            "agent": "a",
            "mode": {},
            "stages": [],
            "createdAt": "2025-01-01T00:00:00Z",
            "updatedAt": "2025-01-01T00:00:00Z",
            "checksum": "bogus"
        });
        let bytes = serde_json::to_vec(&payload).unwrap();

        match decode("3f2b8c1e-7d4a-4e0b-9c6f-2a1d5e8b7c90", &bytes) {
            Err(AgentflowError::MissingCheckpointField { field, .. }) => assert_eq!(field, "task"),
            other => panic!("expected missing field, got {:?}", other),
        }
    }
}

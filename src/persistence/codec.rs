//! Payload encoding
//!
//! The stored payload is base64 over UTF-8 JSON: one object keyed by record
//! name, each value being that record's serialized fields.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::{Map, Value};

use crate::error::{StorageError, StorageResult};

use super::record::Registry;

/// Serialize the whole registry into the stored payload form
pub(crate) fn encode_payload(registry: &Registry) -> StorageResult<String> {
    let mut map = Map::new();
    for (name, record) in registry.iter() {
        map.insert(name.to_string(), record.encode_value()?);
    }

    let json = serde_json::to_string(&Value::Object(map))?;
    Ok(BASE64.encode(json.as_bytes()))
}

/// Unwrap a stored payload into record name → stored fields
pub(crate) fn decode_payload(encoded: &str) -> StorageResult<Map<String, Value>> {
    let bytes = BASE64.decode(encoded.trim())?;
    let json = String::from_utf8(bytes)?;
    log::debug!("Loading storage from local: {}", json);

    let value: Value =
        serde_json::from_str(&json).map_err(|e| StorageError::Decode(e.to_string()))?;
    match value {
        Value::Object(map) => Ok(map),
        other => Err(StorageError::Decode(format!(
            "expected an object at the top level, found {}",
            value_kind(&other)
        ))),
    }
}

/// Copy non-null fields of `stored` over `target`, recursing into nested
/// objects. Fields `target` does not have are dropped.
pub(crate) fn overlay(target: &mut Value, stored: &Value) {
    let (Value::Object(target), Value::Object(stored)) = (target, stored) else {
        return;
    };

    for (key, value) in stored {
        if value.is_null() {
            continue;
        }
        match target.get_mut(key) {
            Some(slot) if slot.is_object() && value.is_object() => overlay(slot, value),
            Some(slot) => *slot = value.clone(),
            None => {}
        }
    }
}

pub(crate) fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

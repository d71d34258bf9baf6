//! Content hashing for tool descriptors.
//!
//! A descriptor's hash is the SHA-256 of its canonical JSON: every object's
//! keys sorted recursively, rendered compactly. Two descriptors with the same
//! field values therefore hash identically no matter in which order a source
//! enumerated their properties, and any change to an observable field
//! (name, description, a parameter's schema) changes the hash.
//!
//! The canonical string is also what gets persisted as `tool_json`, so
//! `tool_hash == hash_str(tool_json)` holds for every stored row.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::models::ToolDescriptor;

/// Compute the content hash of a descriptor (lowercase hex SHA-256).
pub fn hash_tool(tool: &ToolDescriptor) -> String {
    hash_str(&canonical_json(tool))
}

/// Render a descriptor as canonical JSON (sorted keys, no whitespace).
pub fn canonical_json(tool: &ToolDescriptor) -> String {
    canonicalize(&descriptor_value(tool)).to_string()
}

/// SHA-256 of a string, as lowercase hex.
pub fn hash_str(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn descriptor_value(tool: &ToolDescriptor) -> Value {
    let mut schema = Map::new();
    schema.insert("type".to_string(), Value::String("object".to_string()));
    if let Some(props) = &tool.input_schema.properties {
        schema.insert("properties".to_string(), Value::Object(props.clone()));
    }

    let mut obj = Map::new();
    obj.insert("name".to_string(), Value::String(tool.name.clone()));
    if let Some(desc) = &tool.description {
        obj.insert("description".to_string(), Value::String(desc.clone()));
    }
    obj.insert("inputSchema".to_string(), Value::Object(schema));
    Value::Object(obj)
}

/// Recursively rebuild `value` with object keys in sorted order.
///
/// Array element order is significant and left untouched.
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::with_capacity(map.len());
            for key in keys {
                sorted.insert(key.clone(), canonicalize(&map[key.as_str()]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tool(value: Value) -> ToolDescriptor {
        ToolDescriptor::from_value(value).unwrap()
    }

    #[test]
    fn test_hash_ignores_property_order() {
        let a = tool(json!({
            "name": "create_event",
            "description": "Create a calendar event",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "title": { "type": "string", "description": "Event title" },
                    "start": { "type": "string", "description": "ISO start" }
                }
            }
        }));
        let b = tool(json!({
            "inputSchema": {
                "properties": {
                    "start": { "description": "ISO start", "type": "string" },
                    "title": { "description": "Event title", "type": "string" }
                },
                "type": "object"
            },
            "description": "Create a calendar event",
            "name": "create_event"
        }));
        assert_eq!(hash_tool(&a), hash_tool(&b));
        assert_eq!(canonical_json(&a), canonical_json(&b));
    }

    #[test]
    fn test_hash_changes_with_any_field() {
        let base = json!({
            "name": "t",
            "description": "d",
            "inputSchema": { "type": "object", "properties": { "x": { "type": "string" } } }
        });
        let h = hash_tool(&tool(base.clone()));

        let mut renamed = base.clone();
        renamed["name"] = json!("u");
        assert_ne!(h, hash_tool(&tool(renamed)));

        let mut redescribed = base.clone();
        redescribed["description"] = json!("other");
        assert_ne!(h, hash_tool(&tool(redescribed)));

        let mut retyped = base.clone();
        retyped["inputSchema"]["properties"]["x"]["type"] = json!("number");
        assert_ne!(h, hash_tool(&tool(retyped)));

        let mut extended = base;
        extended["inputSchema"]["properties"]["y"] = json!({ "type": "string" });
        assert_ne!(h, hash_tool(&tool(extended)));
    }

    #[test]
    fn test_hash_is_hex_sha256_of_canonical_json() {
        let t = tool(json!({ "name": "ping", "inputSchema": { "type": "object" } }));
        let canonical = canonical_json(&t);
        assert_eq!(canonical, r#"{"inputSchema":{"type":"object"},"name":"ping"}"#);
        let h = hash_tool(&t);
        assert_eq!(h.len(), 64);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(h, hash_str(&canonical));
    }

    #[test]
    fn test_canonical_json_round_trips_to_equal_descriptor() {
        let t = tool(json!({
            "name": "search_docs",
            "description": "Search",
            "inputSchema": {
                "type": "object",
                "properties": { "q": { "type": "string" }, "k": { "type": "number", "optional": true } }
            }
        }));
        let parsed: ToolDescriptor = serde_json::from_str(&canonical_json(&t)).unwrap();
        assert_eq!(parsed, t);
    }

    #[test]
    fn test_canonicalize_keeps_array_order() {
        let v = json!({ "b": [3, 1, 2], "a": { "z": 1, "y": 2 } });
        assert_eq!(canonicalize(&v).to_string(), r#"{"a":{"y":2,"z":1},"b":[3,1,2]}"#);
    }
}

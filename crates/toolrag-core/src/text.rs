//! Embedding text formatter.
//!
//! Renders a descriptor into the exact text submitted to the embedding
//! provider:
//!
//! ```text
//! create event: Create a calendar event
//!     title [string]: Event title
//!     start [string]: ISO start
//! ```
//!
//! - `-` and `_` in the tool name become spaces.
//! - A missing description renders as the empty string.
//! - Parameters follow the descriptor's declared order, one per line,
//!   indented four spaces. This order may differ from the sorted order the
//!   hasher uses; it is stable for a given descriptor value.
//! - A parameter without `type` renders as `[any]`; a type union such as
//!   `["string", "null"]` renders as `[string|null]`.

use serde_json::Value;

use crate::models::ToolDescriptor;

/// Render the embedding text for a descriptor.
pub fn embedding_text(tool: &ToolDescriptor) -> String {
    let name = tool.name.replace(['-', '_'], " ");
    let params: Vec<String> = tool
        .parameters()
        .map(|(param, schema)| {
            let description = schema
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or("");
            format!("    {} [{}]: {}", param, param_type(schema), description)
        })
        .collect();

    format!(
        "{}: {}\n{}",
        name,
        tool.description.as_deref().unwrap_or(""),
        params.join("\n")
    )
}

fn param_type(schema: &Value) -> String {
    match schema.get("type") {
        Some(Value::String(t)) => t.clone(),
        Some(Value::Array(types)) => types
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join("|"),
        _ => "any".to_string(),
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
    fn test_full_layout() {
        let t = tool(json!({
            "name": "create_calendar-event",
            "description": "Create a calendar event",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "title": { "type": "string", "description": "Event title" },
                    "start": { "type": "string", "description": "ISO start" }
                }
            }
        }));
        assert_eq!(
            embedding_text(&t),
            "create calendar event: Create a calendar event\n    title [string]: Event title\n    start [string]: ISO start"
        );
    }

    #[test]
    fn test_declared_order_is_kept() {
        let t = tool(json!({
            "name": "t",
            "inputSchema": {
                "type": "object",
                "properties": { "zeta": { "type": "string" }, "alpha": { "type": "string" } }
            }
        }));
        let text = embedding_text(&t);
        assert!(text.find("zeta").unwrap() < text.find("alpha").unwrap());
    }

    #[test]
    fn test_missing_pieces() {
        let t = tool(json!({
            "name": "noop",
            "inputSchema": { "type": "object" }
        }));
        assert_eq!(embedding_text(&t), "noop: \n");

        let t = tool(json!({
            "name": "f",
            "inputSchema": {
                "type": "object",
                "properties": { "v": {}, "w": { "type": ["string", "null"] } }
            }
        }));
        assert_eq!(embedding_text(&t), "f: \n    v [any]: \n    w [string|null]: ");
    }

    #[test]
    fn test_deterministic() {
        let t = tool(json!({
            "name": "a_b",
            "description": "x",
            "inputSchema": { "type": "object", "properties": { "p": { "type": "string" } } }
        }));
        assert_eq!(embedding_text(&t), embedding_text(&t.clone()));
    }
}

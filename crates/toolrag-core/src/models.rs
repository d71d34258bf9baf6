//! Core data models: tool descriptors as reported by tool sources, retrieval
//! results, and the function-tool shape handed back to LLM callers.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, ToolRagError};

/// A callable tool as reported by a tool source.
///
/// Immutable value: a source that changes a tool reports a whole new
/// descriptor. Property schemas are kept as raw JSON in declared order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub input_schema: InputSchema,
}

/// The `inputSchema` of a tool. Only object schemas are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSchema {
    #[serde(rename = "type")]
    pub schema_type: SchemaType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaType {
    Object,
}

impl ToolDescriptor {
    /// Build a descriptor with an object schema and the given properties.
    pub fn new(
        name: impl Into<String>,
        description: Option<&str>,
        properties: Option<Map<String, Value>>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.map(str::to_string),
            input_schema: InputSchema {
                schema_type: SchemaType::Object,
                properties,
            },
        }
    }

    /// Validate an untrusted payload from a tool source.
    ///
    /// Accepts `{name: string, description?: string, inputSchema: {type:
    /// "object", properties?: object}}`. Unknown fields are dropped. An empty
    /// name is rejected because names key the persisted rows.
    pub fn from_value(value: Value) -> Result<Self> {
        let hint = value
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("<unnamed>")
            .to_string();
        let descriptor: ToolDescriptor = serde_json::from_value(value)
            .map_err(|e| ToolRagError::InvalidDescriptor(format!("{}: {}", hint, e)))?;
        if descriptor.name.trim().is_empty() {
            return Err(ToolRagError::InvalidDescriptor(
                "tool name must not be empty".to_string(),
            ));
        }
        Ok(descriptor)
    }

    /// Declared parameters in order, as `(name, schema)` pairs.
    pub fn parameters(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.input_schema
            .properties
            .iter()
            .flat_map(|props| props.iter())
    }

    /// Names of parameters not flagged `optional: true`, in declared order.
    pub fn required_parameters(&self) -> Vec<String> {
        self.parameters()
            .filter(|(_, schema)| {
                !schema
                    .get("optional")
                    .and_then(Value::as_bool)
                    .unwrap_or(false)
            })
            .map(|(name, _)| name.clone())
            .collect()
    }
}

/// A tool retrieved for a query.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalResult {
    pub tool_name: String,
    pub descriptor: ToolDescriptor,
    /// `1 - cosine_distance`, in `[-1.0, 1.0]`. Negative values mean the tool
    /// points away from the query; they are kept, not clamped.
    pub relevance: f64,
}

/// Function-calling tool definition returned to LLM callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionTool {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub description: String,
    pub parameters: FunctionParameters,
    pub strict: bool,
    pub relevance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionParameters {
    #[serde(rename = "type")]
    pub schema_type: SchemaType,
    pub properties: Map<String, Value>,
    pub required: Vec<String>,
    pub additional_properties: bool,
}

impl From<&RetrievalResult> for FunctionTool {
    fn from(result: &RetrievalResult) -> Self {
        let tool = &result.descriptor;
        FunctionTool {
            kind: "function".to_string(),
            name: tool.name.clone(),
            description: tool.description.clone().unwrap_or_default(),
            parameters: FunctionParameters {
                schema_type: SchemaType::Object,
                properties: tool.input_schema.properties.clone().unwrap_or_default(),
                required: tool.required_parameters(),
                additional_properties: false,
            },
            strict: true,
            relevance: result.relevance,
        }
    }
}

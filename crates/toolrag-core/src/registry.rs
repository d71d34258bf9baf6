//! The in-memory registry of currently known tools.
//!
//! Aggregates descriptors across all connected tool sources. It is the
//! authority for sync and prune: a tool absent from the registry when a prune
//! runs is considered deleted upstream.

use serde_json::Value;

use crate::error::Result;
use crate::models::ToolDescriptor;

/// Descriptors keyed by tool name, in first-registration order.
///
/// Registering a name that is already present replaces the descriptor in
/// place. Names must be unique because they key the persisted rows; two
/// different descriptors under one name would re-embed on every sync.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<ToolDescriptor>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a descriptor. Returns the replaced descriptor, if any.
    pub fn register(&mut self, tool: ToolDescriptor) -> Option<ToolDescriptor> {
        match self.tools.iter_mut().find(|t| t.name == tool.name) {
            Some(existing) => {
                tracing::warn!(tool = %tool.name, "tool registered twice; replacing earlier descriptor");
                Some(std::mem::replace(existing, tool))
            }
            None => {
                self.tools.push(tool);
                None
            }
        }
    }

    /// Register every descriptor in `tools`.
    pub fn extend(&mut self, tools: impl IntoIterator<Item = ToolDescriptor>) {
        for tool in tools {
            self.register(tool);
        }
    }

    /// Validate raw payloads from a tool source and register them.
    ///
    /// All payloads are validated before any is registered; one invalid
    /// payload rejects the whole batch and leaves the registry unchanged.
    pub fn register_values(&mut self, values: Vec<Value>) -> Result<usize> {
        let tools = values
            .into_iter()
            .map(ToolDescriptor::from_value)
            .collect::<Result<Vec<_>>>()?;
        let n = tools.len();
        self.extend(tools);
        Ok(n)
    }

    /// Remove a tool by name. Returns the removed descriptor, if any.
    pub fn remove(&mut self, name: &str) -> Option<ToolDescriptor> {
        let pos = self.tools.iter().position(|t| t.name == name)?;
        Some(self.tools.remove(pos))
    }

    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.iter().find(|t| t.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn tools(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.iter().map(|t| t.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

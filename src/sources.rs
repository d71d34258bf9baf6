//! Tool sources: where descriptors come from.
//!
//! | Kind | Source |
//! |------|--------|
//! | `file` | [`FileToolSource`]: a JSON file of descriptors |
//! | `mcp` | [`McpToolSource`]: an MCP server's `tools/list` over Streamable HTTP |
//!
//! Every payload is validated with [`ToolDescriptor::from_value`] before it
//! reaches the registry; one invalid descriptor fails the whole source.

use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;

use toolrag_core::{ToolDescriptor, ToolRegistry};

use crate::config::{Config, SourcesConfig};

#[async_trait]
pub trait ToolSource: Send + Sync {
    fn name(&self) -> &str;

    fn kind(&self) -> &'static str;

    /// Fetch and validate the source's current tool list.
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>>;
}

/// Validate a batch of raw descriptors. All-or-nothing.
pub fn parse_descriptors(values: Vec<Value>) -> Result<Vec<ToolDescriptor>> {
    let tools = values
        .into_iter()
        .map(ToolDescriptor::from_value)
        .collect::<toolrag_core::Result<Vec<_>>>()?;
    Ok(tools)
}

// ============ File Source ============

/// Reads a JSON file holding either an array of descriptors or an object
/// with a `tools` array (the shape of an MCP `tools/list` result).
pub struct FileToolSource {
    name: String,
    path: PathBuf,
}

impl FileToolSource {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }
}

#[async_trait]
impl ToolSource for FileToolSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &'static str {
        "file"
    }

    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read tool file: {}", self.path.display()))?;
        let json: Value = serde_json::from_str(&content)
            .with_context(|| format!("Invalid JSON in tool file: {}", self.path.display()))?;

        let values = match json {
            Value::Array(items) => items,
            Value::Object(mut obj) => match obj.remove("tools") {
                Some(Value::Array(items)) => items,
                _ => anyhow::bail!(
                    "{}: expected a JSON array or an object with a `tools` array",
                    self.path.display()
                ),
            },
            _ => anyhow::bail!(
                "{}: expected a JSON array or an object with a `tools` array",
                self.path.display()
            ),
        };

        parse_descriptors(values).with_context(|| format!("source '{}'", self.name))
    }
}

// ============ MCP Source ============

/// Lists the tools of an MCP server reachable over Streamable HTTP.
///
/// Each call opens a session, pages through `tools/list`, and closes the
/// session.
pub struct McpToolSource {
    name: String,
    url: String,
}

impl McpToolSource {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl ToolSource for McpToolSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &'static str {
        "mcp"
    }

    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
        use rmcp::{transport::StreamableHttpClientTransport, ServiceExt};

        let transport = StreamableHttpClientTransport::from_uri(self.url.as_str());
        let client = ().serve(transport).await.map_err(|e| {
            anyhow::anyhow!("Failed to connect to MCP server '{}' at {}: {}", self.name, self.url, e)
        })?;

        let listed = client.peer().list_all_tools().await;
        if let Err(e) = client.cancel().await {
            tracing::warn!(source = %self.name, error = %e, "failed to close MCP session");
        }
        let tools = listed.map_err(|e| {
            anyhow::anyhow!("tools/list failed on MCP server '{}': {}", self.name, e)
        })?;
        tracing::info!(source = %self.name, tools = tools.len(), "discovered MCP tools");

        let values = tools
            .iter()
            .map(serde_json::to_value)
            .collect::<serde_json::Result<Vec<_>>>()
            .context("Failed to serialize MCP tool")?;
        parse_descriptors(values).with_context(|| format!("source '{}'", self.name))
    }
}

/// Build the sources declared in `[sources]`.
pub fn from_config(config: &SourcesConfig) -> Vec<Box<dyn ToolSource>> {
    let files = config
        .file
        .iter()
        .map(|s| Box::new(FileToolSource::new(&s.name, &s.path)) as Box<dyn ToolSource>);
    let servers = config
        .mcp
        .iter()
        .map(|s| Box::new(McpToolSource::new(&s.name, &s.url)) as Box<dyn ToolSource>);
    files.chain(servers).collect()
}

/// Load every source into a fresh registry.
///
/// Fails if any source fails: a partial registry would make the next prune
/// delete the missing source's tools.
pub async fn load_registry(sources: &[Box<dyn ToolSource>]) -> Result<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    for source in sources {
        let tools = source
            .list_tools()
            .await
            .with_context(|| format!("Failed to load tools from {} source '{}'", source.kind(), source.name()))?;
        tracing::debug!(source = source.name(), tools = tools.len(), "loaded tool source");
        registry.extend(tools);
    }
    Ok(registry)
}

/// Print configured sources and their tool counts.
pub async fn list_sources(config: &Config) -> Result<()> {
    let sources = from_config(&config.sources);
    if sources.is_empty() {
        println!("No tool sources configured.");
        return Ok(());
    }

    println!("{:<20} {:<6} {:<8} STATUS", "SOURCE", "KIND", "TOOLS");
    for source in &sources {
        match source.list_tools().await {
            Ok(tools) => println!("{:<20} {:<6} {:<8} OK", source.name(), source.kind(), tools.len()),
            Err(e) => println!("{:<20} {:<6} {:<8} ERROR: {:#}", source.name(), source.kind(), "-", e),
        }
    }
    Ok(())
}

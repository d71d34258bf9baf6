use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use toolrag_core::retrieve::{validate_threshold, DEFAULT_RELEVANCE_THRESHOLD, DEFAULT_TOP_K};
use toolrag_core::sync::DEFAULT_CONCURRENCY;
use toolrag_core::ToolRagError;

use crate::embedding::ProviderRegistry;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL, for `ollama`.
    #[serde(default)]
    pub url: Option<String>,
    /// GCP project, for `google`. Falls back to `GOOGLE_CLOUD_PROJECT`.
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default = "default_location")]
    pub location: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            url: None,
            project: None,
            location: default_location(),
            timeout_secs: default_timeout_secs(),
            max_retries: 0,
            concurrency: default_concurrency(),
        }
    }
}

fn default_provider() -> String {
    "openai".to_string()
}
fn default_location() -> String {
    "us-central1".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_relevance_threshold")]
    pub relevance_threshold: f64,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            relevance_threshold: default_relevance_threshold(),
            top_k: default_top_k(),
        }
    }
}

fn default_relevance_threshold() -> f64 {
    DEFAULT_RELEVANCE_THRESHOLD
}
fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SourcesConfig {
    #[serde(default)]
    pub file: Vec<FileSourceConfig>,
    #[serde(default)]
    pub mcp: Vec<McpSourceConfig>,
}

/// A JSON file of tool descriptors.
#[derive(Debug, Deserialize, Clone)]
pub struct FileSourceConfig {
    pub name: String,
    pub path: PathBuf,
}

/// An MCP server reachable over Streamable HTTP.
#[derive(Debug, Deserialize, Clone)]
pub struct McpSourceConfig {
    pub name: String,
    pub url: String,
}

impl Config {
    /// A config with defaults for everything but the database path.
    pub fn minimal(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db: DbConfig {
                path: db_path.into(),
            },
            embedding: EmbeddingConfig::default(),
            retrieval: RetrievalConfig::default(),
            sources: SourcesConfig::default(),
        }
    }

    /// Check the invariants `serde` cannot express. `providers` is the set of
    /// embedding provider ids this config may name.
    pub fn validate(&self, providers: &ProviderRegistry) -> Result<()> {
        let invalid = |msg: String| anyhow::Error::new(ToolRagError::Configuration(msg));

        if self.embedding.concurrency == 0 {
            return Err(invalid("embedding.concurrency must be >= 1".to_string()));
        }
        if self.embedding.dims == Some(0) {
            return Err(invalid("embedding.dims must be > 0".to_string()));
        }
        if !providers.contains(&self.embedding.provider) {
            return Err(invalid(format!(
                "Unknown embedding provider: '{}'. Must be one of: {}.",
                self.embedding.provider,
                providers.ids().collect::<Vec<_>>().join(", ")
            )));
        }

        if self.retrieval.top_k == 0 {
            return Err(invalid("retrieval.top_k must be >= 1".to_string()));
        }
        validate_threshold(self.retrieval.relevance_threshold)
            .context("invalid retrieval.relevance_threshold")?;

        let mut names = HashSet::new();
        let all_names = self
            .sources
            .file
            .iter()
            .map(|s| &s.name)
            .chain(self.sources.mcp.iter().map(|s| &s.name));
        for name in all_names {
            if name.trim().is_empty() {
                return Err(invalid("source name must not be empty".to_string()));
            }
            if !names.insert(name.as_str()) {
                return Err(invalid(format!("duplicate source name: '{}'", name)));
            }
        }

        Ok(())
    }
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    config.validate(&ProviderRegistry::with_defaults())?;
    Ok(config)
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

//! `ToolRag`: the application facade.
//!
//! Wires a [`Config`] to its parts: the SQLite store, the embedding provider
//! picked through a [`ProviderRegistry`], the configured tool sources, and a
//! [`ToolIndex`] over the provider's namespace.
//!
//! ```rust,no_run
//! # async fn demo() -> anyhow::Result<()> {
//! let config = toolrag::config::load_config("./config/toolrag.toml".as_ref())?;
//! let mut rag = toolrag::ToolRag::open(config).await?;
//! for tool in rag.list_tools("schedule a meeting", None).await? {
//!     println!("{} {:.3}", tool.name, tool.relevance);
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use anyhow::Result;

use toolrag_core::embedding::EmbeddingProvider;
use toolrag_core::index::IndexOptions;
use toolrag_core::retrieve::{validate_threshold, Reranker, RetrieveOptions};
use toolrag_core::sync::{SyncOptions, SyncReport};
use toolrag_core::{FunctionTool, RetrievalResult, ToolDescriptor, ToolIndex};

use crate::config::Config;
use crate::db;
use crate::embedding::ProviderRegistry;
use crate::sources::{self, ToolSource};
use crate::sqlite_store::SqliteToolStore;

/// Result of [`ToolRag::sync`].
#[derive(Debug, Clone)]
pub struct SyncSummary {
    pub tools: usize,
    pub report: SyncReport,
    pub pruned: usize,
}

/// Row-level overview of the active namespace.
#[derive(Debug, Clone)]
pub struct IndexStats {
    pub namespace: String,
    pub provider: String,
    pub model: String,
    pub dims: usize,
    pub rows: usize,
}

pub struct ToolRag {
    config: Config,
    index: ToolIndex<SqliteToolStore>,
    sources: Vec<Box<dyn ToolSource>>,
    /// Tools registered directly rather than through a source.
    extra: Vec<ToolDescriptor>,
    loaded: bool,
}

impl ToolRag {
    /// Open with the built-in embedding providers.
    pub async fn open(config: Config) -> Result<Self> {
        Self::open_with(config, &ProviderRegistry::with_defaults()).await
    }

    /// Open, resolving `embedding.provider` through `providers`.
    pub async fn open_with(config: Config, providers: &ProviderRegistry) -> Result<Self> {
        config.validate(providers)?;
        let provider = providers.create(&config.embedding)?;
        Self::open_with_provider(config, provider).await
    }

    /// Open with an already-built provider. `embedding.provider` is ignored.
    pub async fn open_with_provider(
        config: Config,
        provider: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        let pool = db::connect(&config).await?;
        let store = SqliteToolStore::new(pool);
        let options = IndexOptions {
            sync: SyncOptions {
                concurrency: config.embedding.concurrency,
            },
            retrieve: RetrieveOptions {
                relevance_threshold: config.retrieval.relevance_threshold,
                top_k: config.retrieval.top_k,
            },
        };
        let index = ToolIndex::open(store, provider, options).await?;
        let sources = sources::from_config(&config.sources);

        Ok(Self {
            config,
            index,
            sources,
            extra: Vec::new(),
            loaded: false,
        })
    }

    pub fn with_reranker(self, reranker: Arc<dyn Reranker>) -> Self {
        Self {
            index: self.index.with_reranker(reranker),
            ..self
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn index(&self) -> &ToolIndex<SqliteToolStore> {
        &self.index
    }

    pub fn add_source(&mut self, source: Box<dyn ToolSource>) {
        self.sources.push(source);
        self.loaded = false;
    }

    pub fn sources(&self) -> &[Box<dyn ToolSource>] {
        &self.sources
    }

    /// Rebuild the registry from every source plus directly registered tools.
    ///
    /// Stored embeddings are not touched; [`sync`](Self::sync) brings them in
    /// line with the new registry.
    pub async fn refresh(&mut self) -> Result<usize> {
        let mut registry = sources::load_registry(&self.sources).await?;
        registry.extend(self.extra.iter().cloned());
        let n = registry.len();
        self.index.replace_registry(registry);
        self.loaded = false;
        tracing::info!(sources = self.sources.len(), tools = n, "tool registry refreshed");
        Ok(n)
    }

    /// Register tools directly, alongside those from sources, and sync. They
    /// survive every refresh; registering a name again replaces its
    /// descriptor.
    pub async fn register_tools(
        &mut self,
        tools: impl IntoIterator<Item = ToolDescriptor>,
    ) -> Result<SyncSummary> {
        for tool in tools {
            match self.extra.iter_mut().find(|t| t.name == tool.name) {
                Some(existing) => *existing = tool,
                None => self.extra.push(tool),
            }
        }
        self.sync().await
    }

    /// Refresh from sources, embed new or changed tools, and prune the rest.
    pub async fn sync(&mut self) -> Result<SyncSummary> {
        self.refresh().await?;
        let report = self.index.sync().await?;
        let pruned = self.index.prune().await?;
        self.loaded = true;
        Ok(SyncSummary {
            tools: self.index.registry().len(),
            report,
            pruned,
        })
    }

    /// Sync once per instance before the first query, so a descriptor a
    /// source changed since the last `sync` is never served stale.
    async fn ensure_loaded(&mut self) -> Result<()> {
        if !self.loaded {
            self.sync().await?;
        }
        Ok(())
    }

    /// Reject a bad threshold and skip blank queries before touching any
    /// source or provider.
    fn precheck(query: &str, threshold: Option<f64>) -> Result<bool> {
        if let Some(t) = threshold {
            validate_threshold(t)?;
        }
        Ok(!query.trim().is_empty())
    }

    /// Ranked retrieval results for `query`.
    pub async fn retrieve(
        &mut self,
        query: &str,
        threshold: Option<f64>,
    ) -> Result<Vec<RetrievalResult>> {
        if !Self::precheck(query, threshold)? {
            return Ok(Vec::new());
        }
        self.ensure_loaded().await?;
        Ok(self.index.retrieve(query, threshold).await?)
    }

    /// Function-tool definitions relevant to `query`, most relevant first.
    pub async fn list_tools(
        &mut self,
        query: &str,
        threshold: Option<f64>,
    ) -> Result<Vec<FunctionTool>> {
        if !Self::precheck(query, threshold)? {
            return Ok(Vec::new());
        }
        self.ensure_loaded().await?;
        Ok(self.index.list_tools(query, threshold).await?)
    }

    pub async fn stats(&self) -> Result<IndexStats> {
        let provider = self.index.provider();
        Ok(IndexStats {
            namespace: self.index.namespace().to_string(),
            provider: provider.name().to_string(),
            model: provider.model_id().to_string(),
            dims: provider.dims(),
            rows: self.index.count().await?,
        })
    }
}

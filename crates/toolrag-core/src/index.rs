//! `ToolIndex`: one namespace, one provider, one registry.
//!
//! Ties the registry, [`sync`](crate::sync), [`prune`](crate::prune) and
//! [`retrieve`](crate::retrieve) together behind the operations callers use:
//! register tools, keep embeddings current, and answer queries.
//!
//! Every retrieval prunes first, so a tool dropped from the registry is
//! never returned, and bootstraps an empty namespace with a full sync.

use std::sync::Arc;

use crate::embedding::EmbeddingProvider;
use crate::error::{Result, ToolRagError};
use crate::models::{FunctionTool, RetrievalResult, ToolDescriptor};
use crate::prune::prune_missing;
use crate::registry::ToolRegistry;
use crate::retrieve::{retrieve, to_function_tools, validate_threshold, Reranker, RetrieveOptions};
use crate::store::{Namespace, ToolStore};
use crate::sync::{sync_embeddings, SyncOptions, SyncReport};

#[derive(Debug, Clone, Default)]
pub struct IndexOptions {
    pub sync: SyncOptions,
    pub retrieve: RetrieveOptions,
}

pub struct ToolIndex<S: ToolStore> {
    store: S,
    provider: Arc<dyn EmbeddingProvider>,
    namespace: Namespace,
    registry: ToolRegistry,
    options: IndexOptions,
    reranker: Option<Arc<dyn Reranker>>,
}

impl<S: ToolStore> ToolIndex<S> {
    /// Open the provider's namespace in `store`, creating it if needed.
    pub async fn open(
        store: S,
        provider: Arc<dyn EmbeddingProvider>,
        options: IndexOptions,
    ) -> Result<Self> {
        if options.sync.concurrency == 0 {
            return Err(ToolRagError::Configuration(
                "sync concurrency must be >= 1".to_string(),
            ));
        }
        options.retrieve.validate()?;

        let namespace = Namespace::for_provider(provider.as_ref());
        store.ensure_schema(&namespace, provider.dims()).await?;
        tracing::info!(
            namespace = %namespace,
            provider = provider.name(),
            model = provider.model_id(),
            dims = provider.dims(),
            "opened tool index"
        );

        Ok(Self {
            store,
            provider,
            namespace,
            registry: ToolRegistry::new(),
            options,
            reranker: None,
        })
    }

    pub fn with_reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn provider(&self) -> &dyn EmbeddingProvider {
        self.provider.as_ref()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ToolRegistry {
        &mut self.registry
    }

    /// Swap in a new registry, e.g. after reloading every source. Returns
    /// the previous one. Stored rows are untouched until the next prune.
    pub fn replace_registry(&mut self, registry: ToolRegistry) -> ToolRegistry {
        std::mem::replace(&mut self.registry, registry)
    }

    /// Add tools to the registry and sync them.
    pub async fn register_tools(
        &mut self,
        tools: impl IntoIterator<Item = ToolDescriptor>,
    ) -> Result<SyncReport> {
        self.registry.extend(tools);
        self.sync().await
    }

    /// Embed every registered tool whose descriptor hash is not stored yet.
    pub async fn sync(&self) -> Result<SyncReport> {
        sync_embeddings(
            &self.store,
            self.provider.as_ref(),
            &self.namespace,
            self.registry.tools(),
            &self.options.sync,
        )
        .await
    }

    /// Delete stored rows for tools no longer in the registry.
    pub async fn prune(&self) -> Result<usize> {
        prune_missing(&self.store, &self.namespace, &self.registry).await
    }

    pub async fn count(&self) -> Result<usize> {
        self.store.count(&self.namespace).await
    }

    /// Ranked tools for `query`. `threshold` overrides the configured
    /// relevance threshold for this call.
    pub async fn retrieve(
        &self,
        query: &str,
        threshold: Option<f64>,
    ) -> Result<Vec<RetrievalResult>> {
        let mut opts = self.options.retrieve.clone();
        if let Some(t) = threshold {
            validate_threshold(t)?;
            opts.relevance_threshold = t;
        }
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }

        self.prune().await?;
        if self.count().await? == 0 {
            tracing::info!(namespace = %self.namespace, "namespace empty; running initial sync");
            self.sync().await?;
        }

        let results = retrieve(
            &self.store,
            self.provider.as_ref(),
            &self.namespace,
            query,
            &opts,
        )
        .await?;

        match &self.reranker {
            Some(reranker) if !results.is_empty() => reranker
                .rerank(query, results)
                .await
                .map_err(ToolRagError::Rerank),
            _ => Ok(results),
        }
    }

    /// Function-tool definitions for `query`, most relevant first.
    pub async fn list_tools(&self, query: &str, threshold: Option<f64>) -> Result<Vec<FunctionTool>> {
        let results = self.retrieve(query, threshold).await?;
        Ok(to_function_tools(&results))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryStore;
    use crate::test_support::FakeProvider;
    use async_trait::async_trait;
    use serde_json::json;

    fn calendar_tools() -> Vec<ToolDescriptor> {
        ["get_weather", "create_event", "delete_event"]
            .iter()
            .map(|name| {
                ToolDescriptor::from_value(json!({
                    "name": name,
                    "description": format!("{} tool", name.replace('_', " ")),
                    "inputSchema": {
                        "type": "object",
                        "properties": {
                            "city": { "type": "string", "description": "city name" },
                            "note": { "type": "string", "optional": true }
                        }
                    }
                }))
                .unwrap()
            })
            .collect()
    }

    async fn open(provider: FakeProvider) -> ToolIndex<InMemoryStore> {
        ToolIndex::open(InMemoryStore::new(), Arc::new(provider), IndexOptions::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_first_query_bootstraps_empty_namespace() {
        let mut index = open(FakeProvider::new(32)).await;
        index.registry_mut().extend(calendar_tools());
        assert_eq!(index.count().await.unwrap(), 0);

        let tools = index.list_tools("weather in city", Some(-1.0)).await.unwrap();
        assert_eq!(index.count().await.unwrap(), 3);
        assert_eq!(tools.len(), 3);

        let weather = tools.iter().find(|t| t.name == "get_weather").unwrap();
        assert_eq!(weather.kind, "function");
        assert_eq!(weather.description, "get weather tool");
        assert!(weather.strict);
        assert!(!weather.parameters.additional_properties);
        assert_eq!(weather.parameters.required, vec!["city"]);
    }

    #[tokio::test]
    async fn test_removed_tool_is_pruned_before_query() {
        let mut index = open(FakeProvider::new(32)).await;
        let report = index.register_tools(calendar_tools()).await.unwrap();
        assert_eq!(report.written.len(), 3);

        index.registry_mut().remove("delete_event");
        let tools = index.list_tools("delete event tool", Some(-1.0)).await.unwrap();
        assert!(tools.iter().all(|t| t.name != "delete_event"));
        assert_eq!(index.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_threshold_override_is_validated() {
        let index = open(FakeProvider::new(8)).await;
        let err = index.list_tools("x", Some(2.0)).await.unwrap_err();
        assert!(matches!(err, ToolRagError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_open_rejects_zero_concurrency() {
        let opts = IndexOptions {
            sync: SyncOptions { concurrency: 0 },
            ..Default::default()
        };
        let err = ToolIndex::open(InMemoryStore::new(), Arc::new(FakeProvider::new(8)), opts)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ToolRagError::Configuration(_)));
    }

    struct Reverse;

    #[async_trait]
    impl Reranker for Reverse {
        async fn rerank(
            &self,
            _query: &str,
            mut results: Vec<RetrievalResult>,
        ) -> anyhow::Result<Vec<RetrievalResult>> {
            results.reverse();
            Ok(results)
        }
    }

    struct Failing;

    #[async_trait]
    impl Reranker for Failing {
        async fn rerank(
            &self,
            _query: &str,
            _results: Vec<RetrievalResult>,
        ) -> anyhow::Result<Vec<RetrievalResult>> {
            anyhow::bail!("cross-encoder unavailable")
        }
    }

    #[tokio::test]
    async fn test_reranker_failure_is_rerank_error() {
        let provider = FakeProvider::new(2)
            .pin("get weather", vec![1.0, 0.0])
            .pin("create event", vec![0.6, 0.8])
            .pin("delete event", vec![0.0, 1.0])
            .pin("query", vec![1.0, 0.0]);
        let mut index = open(provider).await.with_reranker(Arc::new(Failing));
        index.register_tools(calendar_tools()).await.unwrap();

        let err = index.retrieve("query", Some(0.5)).await.unwrap_err();
        assert!(matches!(err, ToolRagError::Rerank(_)));
        assert!(err.to_string().contains("cross-encoder unavailable"));
    }

    #[tokio::test]
    async fn test_reranker_output_returned_as_is() {
        let provider = FakeProvider::new(2)
            .pin("get weather", vec![1.0, 0.0])
            .pin("create event", vec![0.6, 0.8])
            .pin("delete event", vec![0.0, 1.0])
            .pin("query", vec![1.0, 0.0]);
        let mut index = open(provider).await.with_reranker(Arc::new(Reverse));
        index.register_tools(calendar_tools()).await.unwrap();

        let names: Vec<String> = index
            .retrieve("query", Some(0.5))
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.tool_name)
            .collect();
        assert_eq!(names, vec!["create_event", "get_weather"]);
    }
}

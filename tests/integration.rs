//! End-to-end tests of `ToolRag` over a temporary SQLite database with a
//! deterministic embedding provider.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tempfile::TempDir;

use toolrag::config::{Config, FileSourceConfig};
use toolrag::embedding::{EmbeddingProvider, ProviderRegistry};
use toolrag::{ToolDescriptor, ToolRag, ToolRagError};
use toolrag_core::hash::{hash_str, hash_tool};
use toolrag_core::store::{Namespace, ToolStore};
use toolrag_core::text::embedding_text;

/// Maps the first word of the embedding text (the tool name, or the query)
/// to a fixed 2-d vector.
struct TableProvider {
    name: &'static str,
    vectors: HashMap<&'static str, Vec<f32>>,
    calls: AtomicUsize,
}

impl TableProvider {
    fn new(name: &'static str) -> Self {
        let vectors = HashMap::from([
            ("alpha", vec![0.8, 0.6]),
            ("beta", vec![0.4, (1.0f32 - 0.16).sqrt()]),
            ("gamma", vec![0.6, 0.8]),
            ("query", vec![1.0, 0.0]),
        ]);
        Self {
            name,
            vectors,
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for TableProvider {
    fn name(&self) -> &str {
        self.name
    }

    fn model_id(&self) -> &str {
        "table-v1"
    }

    fn dims(&self) -> usize {
        2
    }

    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let key = text
            .split(|c: char| !c.is_ascii_alphanumeric())
            .next()
            .unwrap_or_default();
        self.vectors
            .get(key)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no vector for '{}'", key))
    }
}

fn tool(name: &str, properties: serde_json::Value) -> serde_json::Value {
    json!({
        "name": name,
        "description": format!("the {} tool", name),
        "inputSchema": { "type": "object", "properties": properties }
    })
}

fn write_tools(path: &Path, tools: &[serde_json::Value]) {
    fs::write(path, serde_json::to_string_pretty(&json!({ "tools": tools })).unwrap()).unwrap();
}

fn abc() -> Vec<serde_json::Value> {
    vec![
        tool("alpha", json!({ "a": { "type": "string", "description": "first" } })),
        tool("beta", json!({ "b": { "type": "number" } })),
        tool("gamma", json!({})),
    ]
}

fn setup() -> (TempDir, Config, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let tools_path = tmp.path().join("tools.json");
    write_tools(&tools_path, &abc());

    let mut config = Config::minimal(tmp.path().join("data/toolrag.sqlite"));
    config.sources.file.push(FileSourceConfig {
        name: "builtin".to_string(),
        path: tools_path.clone(),
    });
    (tmp, config, tools_path)
}

async fn open(config: &Config, provider: Arc<TableProvider>) -> ToolRag {
    ToolRag::open_with_provider(config.clone(), provider)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_first_sync_writes_every_tool_then_nothing() {
    let (_tmp, config, _) = setup();
    let provider = Arc::new(TableProvider::new("table"));
    let mut rag = open(&config, provider.clone()).await;

    let summary = rag.sync().await.unwrap();
    assert_eq!(summary.tools, 3);
    assert_eq!(summary.report.written, vec!["alpha", "beta", "gamma"]);
    assert_eq!(summary.pruned, 0);
    assert_eq!(provider.calls(), 3);

    let index = rag.index();
    for name in ["alpha", "beta", "gamma"] {
        let row = index
            .store()
            .get_by_name(index.namespace(), name)
            .await
            .unwrap()
            .unwrap()
            .record;
        let descriptor = index.registry().get(name).unwrap();
        assert_eq!(row.tool_hash, hash_tool(descriptor));
        assert_eq!(row.tool_hash, hash_str(&row.tool_json));
        assert_eq!(row.embedding_text, embedding_text(descriptor));
    }

    let again = rag.sync().await.unwrap();
    assert!(again.report.written.is_empty());
    assert_eq!(again.report.unchanged, 3);
    assert_eq!(provider.calls(), 3);
}

#[tokio::test]
async fn test_changed_schema_reembeds_only_that_tool_and_keeps_id() {
    let (_tmp, config, tools_path) = setup();
    let provider = Arc::new(TableProvider::new("table"));
    let mut rag = open(&config, provider.clone()).await;
    rag.sync().await.unwrap();

    let ns = rag.index().namespace().clone();
    let before = rag.index().store().get_by_name(&ns, "beta").await.unwrap().unwrap();

    let mut tools = abc();
    tools[1] = tool(
        "beta",
        json!({ "b": { "type": "number" }, "extra": { "type": "boolean", "optional": true } }),
    );
    write_tools(&tools_path, &tools);

    let summary = rag.sync().await.unwrap();
    assert_eq!(summary.report.written, vec!["beta"]);
    assert_eq!(summary.report.unchanged, 2);
    assert_eq!(provider.calls(), 4);

    let after = rag.index().store().get_by_name(&ns, "beta").await.unwrap().unwrap();
    assert_eq!(after.id, before.id);
    assert_ne!(after.record.tool_hash, before.record.tool_hash);
    assert_eq!(rag.index().count().await.unwrap(), 3);
}

#[tokio::test]
async fn test_removed_tool_is_pruned_and_never_returned() {
    let (_tmp, config, tools_path) = setup();
    let provider = Arc::new(TableProvider::new("table"));
    let mut rag = open(&config, provider.clone()).await;
    rag.sync().await.unwrap();

    write_tools(&tools_path, &abc()[..2]);
    let summary = rag.sync().await.unwrap();
    assert_eq!(summary.pruned, 1);
    assert_eq!(rag.index().count().await.unwrap(), 2);

    let tools = rag.list_tools("query", Some(-1.0)).await.unwrap();
    assert!(tools.iter().all(|t| t.name != "gamma"));
}

#[tokio::test]
async fn test_threshold_filters_and_orders_results() {
    let (_tmp, config, _) = setup();
    let provider = Arc::new(TableProvider::new("table"));
    let mut rag = open(&config, provider).await;
    rag.sync().await.unwrap();

    let tools = rag.list_tools("query", Some(0.5)).await.unwrap();
    let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["alpha", "gamma"]);
    assert!((tools[0].relevance - 0.8).abs() < 1e-5);
    assert!((tools[1].relevance - 0.6).abs() < 1e-5);

    let alpha = &tools[0];
    assert_eq!(alpha.kind, "function");
    assert_eq!(alpha.description, "the alpha tool");
    assert_eq!(alpha.parameters.required, vec!["a"]);
    assert!(alpha.strict);
    assert!(!alpha.parameters.additional_properties);

    let value = serde_json::to_value(alpha).unwrap();
    assert_eq!(value["type"], "function");
    assert_eq!(value["parameters"]["additionalProperties"], false);

    let all = rag.list_tools("query", None).await.unwrap();
    assert_eq!(all.len(), 3, "default threshold 0.15 keeps beta at 0.4");
}

#[tokio::test]
async fn test_first_query_bootstraps_empty_index() {
    let (_tmp, config, _) = setup();
    let provider = Arc::new(TableProvider::new("table"));
    let mut rag = open(&config, provider.clone()).await;

    let tools = rag.list_tools("query", Some(0.5)).await.unwrap();
    assert_eq!(tools.len(), 2);
    assert_eq!(rag.index().count().await.unwrap(), 3);
    // Three tools plus the query.
    assert_eq!(provider.calls(), 4);
}

#[tokio::test]
async fn test_blank_query_returns_nothing() {
    let (_tmp, config, _) = setup();
    let provider = Arc::new(TableProvider::new("table"));
    let mut rag = open(&config, provider.clone()).await;
    rag.sync().await.unwrap();

    assert!(rag.list_tools("  ", None).await.unwrap().is_empty());
    assert_eq!(provider.calls(), 3);
}

#[tokio::test]
async fn test_provider_failure_leaves_store_unchanged() {
    let (_tmp, config, tools_path) = setup();
    let provider = Arc::new(TableProvider::new("table"));
    let mut rag = open(&config, provider.clone()).await;

    let mut tools = abc();
    tools.push(tool("delta", json!({})));
    write_tools(&tools_path, &tools);

    let err = rag.sync().await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ToolRagError>(),
        Some(ToolRagError::Provider(_))
    ));
    assert_eq!(rag.index().count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_providers_use_separate_namespaces() {
    let (_tmp, config, _) = setup();
    let first = Arc::new(TableProvider::new("first"));
    let second = Arc::new(TableProvider::new("second"));

    let first_ns = Namespace::for_provider(first.as_ref());
    let second_ns = Namespace::for_provider(second.as_ref());
    assert!(first_ns.as_str().starts_with("tool_embeddings_first_table_v1_2_"));
    assert!(second_ns.as_str().starts_with("tool_embeddings_second_table_v1_2_"));

    let mut rag = open(&config, first).await;
    rag.sync().await.unwrap();
    assert_eq!(rag.index().namespace(), &first_ns);
    drop(rag);

    let rag = open(&config, second.clone()).await;
    assert_eq!(rag.index().count().await.unwrap(), 0);
    let namespaces = rag.index().store().list_namespaces().await.unwrap();
    let names: Vec<&str> = namespaces.iter().map(|n| n.name.as_str()).collect();
    assert_eq!(names, vec![first_ns.as_str(), second_ns.as_str()]);
    assert_eq!(second.calls(), 0);
}

#[tokio::test]
async fn test_directly_registered_tools_survive_refresh() {
    let (_tmp, config, _) = setup();
    let provider = Arc::new(TableProvider::new("table"));
    let mut rag = open(&config, provider).await;

    let extra = ToolDescriptor::from_value(tool("query", json!({}))).unwrap();
    let summary = rag.register_tools([extra]).await.unwrap();
    assert_eq!(summary.tools, 4);
    assert_eq!(summary.report.written, vec!["alpha", "beta", "gamma", "query"]);

    let again = rag.sync().await.unwrap();
    assert!(again.report.written.is_empty());
    assert_eq!(again.pruned, 0);
    assert_eq!(rag.index().count().await.unwrap(), 4);
}

#[tokio::test]
async fn test_registering_a_name_again_replaces_it() {
    let (_tmp, config, _) = setup();
    let provider = Arc::new(TableProvider::new("table"));
    let mut rag = open(&config, provider).await;

    let first = ToolDescriptor::from_value(tool("query", json!({}))).unwrap();
    rag.register_tools([first]).await.unwrap();

    let second = ToolDescriptor::from_value(tool(
        "query",
        json!({ "q": { "type": "string", "description": "search text" } }),
    ))
    .unwrap();
    let summary = rag.register_tools([second]).await.unwrap();
    assert_eq!(summary.tools, 4);
    assert_eq!(summary.report.written, vec!["query"]);

    let tools = rag.list_tools("query", Some(0.9)).await.unwrap();
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0].name, "query");
    assert_eq!(tools[0].parameters.required, vec!["q"]);
}

#[tokio::test]
async fn test_changed_source_is_served_fresh_after_reopen() {
    let (_tmp, config, tools_path) = setup();
    let provider = Arc::new(TableProvider::new("table"));
    let mut rag = open(&config, provider.clone()).await;
    rag.sync().await.unwrap();
    drop(rag);

    let mut tools = abc();
    tools[1] = tool(
        "beta",
        json!({ "b": { "type": "number" }, "extra": { "type": "boolean", "optional": true } }),
    );
    write_tools(&tools_path, &tools);

    let mut rag = open(&config, provider.clone()).await;
    let served = rag.list_tools("query", Some(-1.0)).await.unwrap();
    let beta = served.iter().find(|t| t.name == "beta").unwrap();
    assert!(beta.parameters.properties.contains_key("extra"));
    assert_eq!(beta.parameters.required, vec!["b"]);
    // Three initial embeddings, the changed beta, and the query.
    assert_eq!(provider.calls(), 5);
}

#[tokio::test]
async fn test_open_with_unknown_provider_is_configuration_error() {
    let (_tmp, mut config, _) = setup();
    config.embedding.provider = "nope".to_string();
    let err = ToolRag::open_with(config, &ProviderRegistry::with_defaults())
        .await
        .err()
        .unwrap();
    assert!(matches!(
        err.downcast_ref::<ToolRagError>(),
        Some(ToolRagError::Configuration(_))
    ));
}

#[tokio::test]
async fn test_open_with_custom_registry() {
    let (_tmp, mut config, _) = setup();
    config.embedding.provider = "table".to_string();
    let mut providers = ProviderRegistry::empty();
    providers.register("table", |_| Ok(Arc::new(TableProvider::new("table"))));

    let mut rag = ToolRag::open_with(config, &providers).await.unwrap();
    let tools = rag.list_tools("query", Some(0.7)).await.unwrap();
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0].name, "alpha");
}

//! Retriever / ranker: turn a natural-language query into a ranked,
//! threshold-filtered list of tools.
//!
//! 1. Embed the query.
//! 2. Fetch the `top_k` nearest rows by cosine distance (nearest first).
//! 3. `relevance = 1 - distance`. Cosine distance spans `[0, 2]`, so
//!    relevance spans `[-1, 1]`; negative values are kept as-is.
//! 4. Keep rows with `relevance >= threshold`. Filtering never reorders, so
//!    the output stays sorted by non-increasing relevance.
//!
//! Pruning and the lazy bootstrap of an empty namespace happen one level up,
//! in [`ToolIndex`](crate::index::ToolIndex), which owns the registry.

use async_trait::async_trait;

use crate::embedding::EmbeddingProvider;
use crate::error::{Result, ToolRagError};
use crate::models::{FunctionTool, RetrievalResult, ToolDescriptor};
use crate::store::{Namespace, Neighbor, ToolStore};

pub const DEFAULT_RELEVANCE_THRESHOLD: f64 = 0.15;
pub const DEFAULT_TOP_K: usize = 40;

#[derive(Debug, Clone)]
pub struct RetrieveOptions {
    /// Minimum relevance to keep, within `[-1.0, 1.0]`.
    pub relevance_threshold: f64,
    /// Number of nearest neighbours fetched before filtering.
    pub top_k: usize,
}

impl Default for RetrieveOptions {
    fn default() -> Self {
        Self {
            relevance_threshold: DEFAULT_RELEVANCE_THRESHOLD,
            top_k: DEFAULT_TOP_K,
        }
    }
}

impl RetrieveOptions {
    pub fn validate(&self) -> Result<()> {
        validate_threshold(self.relevance_threshold)?;
        if self.top_k == 0 {
            return Err(ToolRagError::Configuration(
                "retrieval top_k must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

pub fn validate_threshold(threshold: f64) -> Result<()> {
    if !threshold.is_finite() || !(-1.0..=1.0).contains(&threshold) {
        return Err(ToolRagError::Configuration(format!(
            "relevance threshold must be a finite number in [-1.0, 1.0], got {}",
            threshold
        )));
    }
    Ok(())
}

/// Optional post-filter hook. Receives the filtered, ranked candidates and
/// returns the list to hand back; the core applies no further ordering.
/// A failure surfaces as [`ToolRagError::Rerank`].
#[async_trait]
pub trait Reranker: Send + Sync {
    async fn rerank(
        &self,
        query: &str,
        results: Vec<RetrievalResult>,
    ) -> anyhow::Result<Vec<RetrievalResult>>;
}

/// Convert a cosine distance to a relevance score.
pub fn relevance(distance: f64) -> f64 {
    1.0 - distance
}

/// Drop results below `threshold`, preserving order.
pub fn filter_by_relevance(results: Vec<RetrievalResult>, threshold: f64) -> Vec<RetrievalResult> {
    results
        .into_iter()
        .filter(|r| r.relevance >= threshold)
        .collect()
}

/// Map retrieval results to function-tool definitions, in order.
pub fn to_function_tools(results: &[RetrievalResult]) -> Vec<FunctionTool> {
    results.iter().map(FunctionTool::from).collect()
}

fn to_result(neighbor: Neighbor) -> Result<RetrievalResult> {
    let descriptor: ToolDescriptor = serde_json::from_str(&neighbor.tool_json).map_err(|e| {
        ToolRagError::store(anyhow::anyhow!(
            "row {} ('{}') holds unreadable tool_json: {}",
            neighbor.id,
            neighbor.tool_name,
            e
        ))
    })?;
    Ok(RetrievalResult {
        tool_name: neighbor.tool_name,
        descriptor,
        relevance: relevance(neighbor.distance),
    })
}

/// Embed `query` and return the ranked, filtered tools of namespace `ns`.
///
/// A blank query returns an empty list without calling the provider.
pub async fn retrieve<S: ToolStore + ?Sized>(
    store: &S,
    provider: &dyn EmbeddingProvider,
    ns: &Namespace,
    query: &str,
    opts: &RetrieveOptions,
) -> Result<Vec<RetrievalResult>> {
    opts.validate()?;
    if query.trim().is_empty() {
        return Ok(Vec::new());
    }

    let query_vec = provider
        .embed(query)
        .await
        .map_err(|e| ToolRagError::Provider(e.context("embedding query")))?;
    if query_vec.len() != provider.dims() {
        return Err(ToolRagError::provider(anyhow::anyhow!(
            "query embedding has {} dimensions, expected {}",
            query_vec.len(),
            provider.dims()
        )));
    }

    let neighbors = store.nearest_neighbors(ns, &query_vec, opts.top_k).await?;
    tracing::info!(namespace = %ns, candidates = neighbors.len(), "vector search complete");

    let ranked = neighbors
        .into_iter()
        .map(to_result)
        .collect::<Result<Vec<_>>>()?;
    let kept = filter_by_relevance(ranked, opts.relevance_threshold);
    tracing::debug!(
        kept = kept.len(),
        threshold = opts.relevance_threshold,
        "applied relevance threshold"
    );
    Ok(kept)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryStore;
    use crate::sync::{sync_embeddings, SyncOptions};
    use crate::test_support::FakeProvider;

    fn result(name: &str, relevance: f64) -> RetrievalResult {
        RetrievalResult {
            tool_name: name.to_string(),
            descriptor: ToolDescriptor::new(name, None, None),
            relevance,
        }
    }

    #[test]
    fn test_relevance_is_signed() {
        assert!((relevance(0.0) - 1.0).abs() < 1e-12);
        assert!((relevance(1.0)).abs() < 1e-12);
        assert!((relevance(2.0) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_filter_preserves_order_and_threshold() {
        let input = vec![
            result("a", 0.9),
            result("b", 0.5),
            result("c", 0.5),
            result("d", 0.2),
            result("e", -0.3),
        ];
        let kept = filter_by_relevance(input, 0.5);
        let names: Vec<&str> = kept.iter().map(|r| r.tool_name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);

        let negative = filter_by_relevance(vec![result("x", -0.2), result("y", -0.8)], -0.5);
        assert_eq!(negative.len(), 1);
        assert_eq!(negative[0].relevance, -0.2);
    }

    #[test]
    fn test_threshold_validation() {
        assert!(validate_threshold(0.15).is_ok());
        assert!(validate_threshold(-1.0).is_ok());
        assert!(validate_threshold(1.0).is_ok());
        assert!(validate_threshold(1.5).is_err());
        assert!(validate_threshold(f64::NAN).is_err());
        let opts = RetrieveOptions {
            top_k: 0,
            ..Default::default()
        };
        assert!(matches!(opts.validate(), Err(ToolRagError::Configuration(_))));
    }

    async fn scenario_d() -> (InMemoryStore, FakeProvider, Namespace) {
        // Unit vectors at cosine 0.8, 0.4 and 0.6 from the query direction.
        let provider = FakeProvider::new(2)
            .pin("alpha", vec![0.8, 0.6])
            .pin("beta", vec![0.4, (1.0f32 - 0.16).sqrt()])
            .pin("gamma", vec![0.6, 0.8])
            .pin("query", vec![1.0, 0.0]);
        let store = InMemoryStore::new();
        let ns = Namespace::for_provider(&provider);
        store.ensure_schema(&ns, 2).await.unwrap();
        let tools = vec![
            ToolDescriptor::new("alpha", None, None),
            ToolDescriptor::new("beta", None, None),
            ToolDescriptor::new("gamma", None, None),
        ];
        sync_embeddings(&store, &provider, &ns, &tools, &SyncOptions::default())
            .await
            .unwrap();
        (store, provider, ns)
    }

    #[tokio::test]
    async fn test_threshold_half_returns_a_then_c() {
        let (store, provider, ns) = scenario_d().await;
        let opts = RetrieveOptions {
            relevance_threshold: 0.5,
            ..Default::default()
        };
        let results = retrieve(&store, &provider, &ns, "query", &opts).await.unwrap();
        let names: Vec<&str> = results.iter().map(|r| r.tool_name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "gamma"]);
        assert!((results[0].relevance - 0.8).abs() < 1e-5);
        assert!((results[1].relevance - 0.6).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_results_non_increasing_and_above_threshold() {
        let (store, provider, ns) = scenario_d().await;
        let opts = RetrieveOptions::default();
        let results = retrieve(&store, &provider, &ns, "query", &opts).await.unwrap();
        assert_eq!(results.len(), 3);
        for pair in results.windows(2) {
            assert!(pair[0].relevance >= pair[1].relevance);
        }
        assert!(results.iter().all(|r| r.relevance >= opts.relevance_threshold));
    }

    #[tokio::test]
    async fn test_top_k_limits_candidates() {
        let (store, provider, ns) = scenario_d().await;
        let opts = RetrieveOptions {
            relevance_threshold: -1.0,
            top_k: 2,
        };
        let results = retrieve(&store, &provider, &ns, "query", &opts).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].tool_name, "alpha");
    }

    #[tokio::test]
    async fn test_blank_query_skips_provider() {
        let (store, provider, ns) = scenario_d().await;
        let calls = provider.calls();
        let results = retrieve(&store, &provider, &ns, "   ", &RetrieveOptions::default())
            .await
            .unwrap();
        assert!(results.is_empty());
        assert_eq!(provider.calls(), calls);
    }

    #[tokio::test]
    async fn test_query_failure_is_provider_error() {
        let (store, provider, ns) = scenario_d().await;
        provider.fail_when(Some("query"));
        let err = retrieve(&store, &provider, &ns, "query", &RetrieveOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolRagError::Provider(_)));
    }
}

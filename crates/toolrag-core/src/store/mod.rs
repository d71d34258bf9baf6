//! Storage abstraction for ToolRAG.
//!
//! The [`ToolStore`] trait defines every persisted-store operation the sync,
//! prune and retrieval algorithms need. Rows live in per-provider
//! [`Namespace`]s; a backend keeps one table-like collection per namespace
//! with a secondary index on `tool_hash` and a nearest-neighbour access path
//! on `embedding`.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.
//! Writes are not coordinated across processes: one writer per namespace is
//! a precondition the caller must uphold.

pub mod memory;

use std::collections::HashSet;
use std::fmt;

use async_trait::async_trait;

use crate::embedding::EmbeddingProvider;
use crate::error::{Result, ToolRagError};
use crate::hash::hash_str;

/// Version of the per-namespace row layout. Backends refuse to reopen a
/// namespace recorded under a different version.
pub const SCHEMA_VERSION: i64 = 1;

/// Name of one persisted collection, derived from provider identity.
///
/// Always a valid SQL identifier: lowercase ASCII letters, digits and `_`,
/// starting with a letter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace(String);

impl Namespace {
    /// Sanitize `raw` into a namespace name.
    pub fn new(raw: &str) -> Result<Self> {
        let sanitized: String = raw
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_lowercase()
                } else {
                    '_'
                }
            })
            .collect();
        match sanitized.chars().next() {
            Some(c) if c.is_ascii_lowercase() => Ok(Self(sanitized)),
            _ => Err(ToolRagError::Configuration(format!(
                "invalid namespace name: '{}'",
                raw
            ))),
        }
    }

    /// The namespace for a provider:
    /// `tool_embeddings_<name>_<model>_<dims>_<digest>`.
    ///
    /// Sanitizing is lossy (`a-b` and `a:b` both become `a_b`), so the name
    /// ends with the first 8 hex digits of the SHA-256 of the raw
    /// `name/model_id/dims` identity.
    pub fn for_provider(provider: &dyn EmbeddingProvider) -> Self {
        let identity = format!(
            "{}/{}/{}",
            provider.name(),
            provider.model_id(),
            provider.dims()
        );
        let digest = hash_str(&identity);
        let raw = format!(
            "tool_embeddings_{}_{}_{}_{}",
            provider.name(),
            provider.model_id(),
            provider.dims(),
            &digest[..8]
        );
        // The fixed prefix guarantees a leading letter.
        Self::new(&raw).unwrap_or(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A row to write: one tool's embedding and the data it was derived from.
///
/// `embedding_text` is exactly the text that produced `embedding`;
/// `tool_hash` is the hash of the descriptor serialized as `tool_json`.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingRecord {
    pub tool_name: String,
    pub tool_hash: String,
    pub embedding: Vec<f32>,
    pub embedding_text: String,
    pub tool_json: String,
}

/// A persisted row with its store-assigned surrogate key.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub id: i64,
    pub record: EmbeddingRecord,
}

/// One nearest-neighbour hit.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    pub id: i64,
    pub tool_name: String,
    pub tool_json: String,
    /// Cosine distance to the query, in `[0.0, 2.0]`.
    pub distance: f64,
}

/// Abstract persisted store for tool embeddings.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`ensure_schema`](ToolStore::ensure_schema) | Idempotently create a namespace |
/// | [`hashes_in_namespace`](ToolStore::hashes_in_namespace) | All stored `tool_hash` values |
/// | [`names_in_namespace`](ToolStore::names_in_namespace) | All stored `tool_name` values |
/// | [`upsert_by_name`](ToolStore::upsert_by_name) | Update the row for a name, else insert |
/// | [`delete_by_name`](ToolStore::delete_by_name) | Remove the row for a name |
/// | [`count`](ToolStore::count) | Number of rows |
/// | [`nearest_neighbors`](ToolStore::nearest_neighbors) | Top-k by ascending cosine distance |
/// | [`get_by_name`](ToolStore::get_by_name) | Fetch one full row |
#[async_trait]
pub trait ToolStore: Send + Sync {
    /// Create the namespace collection and its indexes if missing.
    ///
    /// Fails with [`ToolRagError::Configuration`] if the namespace already
    /// exists with a different dimension or schema version.
    async fn ensure_schema(&self, ns: &Namespace, dims: usize) -> Result<()>;

    async fn hashes_in_namespace(&self, ns: &Namespace) -> Result<HashSet<String>>;

    async fn names_in_namespace(&self, ns: &Namespace) -> Result<HashSet<String>>;

    /// Update the row whose `tool_name` matches, keeping its surrogate key;
    /// insert a new row otherwise.
    async fn upsert_by_name(&self, ns: &Namespace, record: &EmbeddingRecord) -> Result<()>;

    /// Delete the row for `name`. Returns whether a row was removed.
    async fn delete_by_name(&self, ns: &Namespace, name: &str) -> Result<bool>;

    async fn count(&self, ns: &Namespace) -> Result<usize>;

    /// Up to `k` rows ordered by ascending cosine distance to `query`
    /// (nearest first). Equal distances are ordered by `id`.
    async fn nearest_neighbors(
        &self,
        ns: &Namespace,
        query: &[f32],
        k: usize,
    ) -> Result<Vec<Neighbor>>;

    async fn get_by_name(&self, ns: &Namespace, name: &str) -> Result<Option<StoredRecord>>;
}

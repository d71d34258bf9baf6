//! Synchronization engine: keep a namespace's embeddings consistent with the
//! live tool set while embedding as little as possible.
//!
//! # Algorithm
//!
//! 1. Hash every descriptor ([`hash_tool`]).
//! 2. Fetch the namespace's stored hashes in one query.
//! 3. A tool needs (re)embedding iff its hash is not stored. This covers new
//!    tools and changed schemas; unchanged tools cost no provider call.
//! 4. Embed the pending tools concurrently (at most `concurrency` calls in
//!    flight) and wait for the whole batch. If any call fails the pass fails
//!    and nothing is written; the next pass recomputes the same diff.
//! 5. Write results one row at a time with
//!    [`upsert_by_name`](ToolStore::upsert_by_name), in registry order.

use futures::stream::{self, StreamExt, TryStreamExt};

use crate::embedding::EmbeddingProvider;
use crate::error::{Result, ToolRagError};
use crate::hash::{canonical_json, hash_tool};
use crate::models::ToolDescriptor;
use crate::store::{EmbeddingRecord, Namespace, ToolStore};
use crate::text::embedding_text;

/// Default cap on concurrent provider calls within one pass.
pub const DEFAULT_CONCURRENCY: usize = 8;

#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Maximum embedding calls in flight. Must be at least 1.
    pub concurrency: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

/// Outcome of one sync pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Tools embedded and written, in write order.
    pub written: Vec<String>,
    /// Tools whose hash was already stored.
    pub unchanged: usize,
}

/// Run one sync pass for `tools` against namespace `ns`.
pub async fn sync_embeddings<S: ToolStore + ?Sized>(
    store: &S,
    provider: &dyn EmbeddingProvider,
    ns: &Namespace,
    tools: &[ToolDescriptor],
    opts: &SyncOptions,
) -> Result<SyncReport> {
    if opts.concurrency == 0 {
        return Err(ToolRagError::Configuration(
            "sync concurrency must be >= 1".to_string(),
        ));
    }

    let existing = store.hashes_in_namespace(ns).await?;
    let pending: Vec<(&ToolDescriptor, String)> = tools
        .iter()
        .map(|tool| (tool, hash_tool(tool)))
        .filter(|(_, hash)| !existing.contains(hash))
        .collect();
    let unchanged = tools.len() - pending.len();

    if pending.is_empty() {
        tracing::info!(namespace = %ns, tools = tools.len(), "all tool embeddings up to date");
        return Ok(SyncReport {
            written: Vec::new(),
            unchanged,
        });
    }

    tracing::info!(
        namespace = %ns,
        pending = pending.len(),
        unchanged,
        "generating embeddings for new or changed tools"
    );

    let dims = provider.dims();
    let records: Vec<EmbeddingRecord> = stream::iter(pending)
        .map(|(tool, tool_hash)| async move {
            let text = embedding_text(tool);
            tracing::debug!(tool = %tool.name, text = %text, "embedding tool");
            let embedding = provider.embed(&text).await.map_err(|e| {
                ToolRagError::Provider(e.context(format!("embedding tool '{}'", tool.name)))
            })?;
            if embedding.len() != dims {
                return Err(ToolRagError::provider(anyhow::anyhow!(
                    "tool '{}': provider returned {} dimensions, expected {}",
                    tool.name,
                    embedding.len(),
                    dims
                )));
            }
            Ok::<_, ToolRagError>(EmbeddingRecord {
                tool_name: tool.name.clone(),
                tool_hash,
                embedding,
                embedding_text: text,
                tool_json: canonical_json(tool),
            })
        })
        .buffered(opts.concurrency)
        .try_collect()
        .await?;

    let mut written = Vec::with_capacity(records.len());
    for record in &records {
        store.upsert_by_name(ns, record).await?;
        tracing::debug!(namespace = %ns, tool = %record.tool_name, "stored embedding");
        written.push(record.tool_name.clone());
    }

    tracing::info!(namespace = %ns, written = written.len(), "tool embeddings updated");
    Ok(SyncReport { written, unchanged })
}

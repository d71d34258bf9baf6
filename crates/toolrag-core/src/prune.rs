//! Pruner: remove persisted rows for tools the registry no longer reports.
//!
//! Runs before every retrieval so a query can never return a tool that has
//! disappeared upstream. Costs one delete round trip per stale row, which is
//! acceptable for tool sets in the tens or hundreds.

use std::collections::HashSet;

use crate::error::Result;
use crate::registry::ToolRegistry;
use crate::store::{Namespace, ToolStore};

/// Delete every row in `ns` whose `tool_name` is not in `registry`.
///
/// Deletes are issued sequentially in name order. Returns the number of rows
/// removed.
pub async fn prune_missing<S: ToolStore + ?Sized>(
    store: &S,
    ns: &Namespace,
    registry: &ToolRegistry,
) -> Result<usize> {
    let live: HashSet<&str> = registry.names().collect();
    let mut stale: Vec<String> = store
        .names_in_namespace(ns)
        .await?
        .into_iter()
        .filter(|name| !live.contains(name.as_str()))
        .collect();

    if stale.is_empty() {
        tracing::debug!(namespace = %ns, "no tools to prune");
        return Ok(0);
    }
    stale.sort();

    let mut removed = 0;
    for name in &stale {
        if store.delete_by_name(ns, name).await? {
            removed += 1;
            tracing::debug!(namespace = %ns, tool = %name, "pruned tool");
        }
    }

    tracing::info!(namespace = %ns, removed, "pruned tools no longer reported by any source");
    Ok(removed)
}

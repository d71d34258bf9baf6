//! In-memory [`ToolStore`] implementation for testing and WASM targets.
//!
//! Namespaces are `Vec`s of rows behind a `std::sync::RwLock`. Nearest
//! neighbour search is brute-force cosine distance over every row.

use std::collections::{HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use crate::embedding::cosine_distance;
use crate::error::{Result, ToolRagError};

use super::{EmbeddingRecord, Namespace, Neighbor, StoredRecord, ToolStore, SCHEMA_VERSION};

struct Collection {
    dims: usize,
    schema_version: i64,
    next_id: i64,
    rows: Vec<StoredRecord>,
}

/// In-memory store for tests and WASM environments.
#[derive(Default)]
pub struct InMemoryStore {
    namespaces: RwLock<HashMap<Namespace, Collection>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<Namespace, Collection>>> {
        self.namespaces
            .read()
            .map_err(|_| ToolRagError::store(anyhow::anyhow!("in-memory store lock poisoned")))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<Namespace, Collection>>> {
        self.namespaces
            .write()
            .map_err(|_| ToolRagError::store(anyhow::anyhow!("in-memory store lock poisoned")))
    }
}

fn missing(ns: &Namespace) -> ToolRagError {
    ToolRagError::NotInitialized(format!("namespace '{}' has no schema", ns))
}

#[async_trait]
impl ToolStore for InMemoryStore {
    async fn ensure_schema(&self, ns: &Namespace, dims: usize) -> Result<()> {
        let mut namespaces = self.write()?;
        let collection = namespaces.entry(ns.clone()).or_insert_with(|| Collection {
            dims,
            schema_version: SCHEMA_VERSION,
            next_id: 1,
            rows: Vec::new(),
        });
        if collection.dims != dims || collection.schema_version != SCHEMA_VERSION {
            return Err(ToolRagError::Configuration(format!(
                "namespace '{}' exists with dims={} schema_version={}, requested dims={} schema_version={}",
                ns, collection.dims, collection.schema_version, dims, SCHEMA_VERSION
            )));
        }
        Ok(())
    }

    async fn hashes_in_namespace(&self, ns: &Namespace) -> Result<HashSet<String>> {
        let namespaces = self.read()?;
        let collection = namespaces.get(ns).ok_or_else(|| missing(ns))?;
        Ok(collection
            .rows
            .iter()
            .map(|r| r.record.tool_hash.clone())
            .collect())
    }

    async fn names_in_namespace(&self, ns: &Namespace) -> Result<HashSet<String>> {
        let namespaces = self.read()?;
        let collection = namespaces.get(ns).ok_or_else(|| missing(ns))?;
        Ok(collection
            .rows
            .iter()
            .map(|r| r.record.tool_name.clone())
            .collect())
    }

    async fn upsert_by_name(&self, ns: &Namespace, record: &EmbeddingRecord) -> Result<()> {
        let mut namespaces = self.write()?;
        let collection = namespaces.get_mut(ns).ok_or_else(|| missing(ns))?;
        match collection
            .rows
            .iter_mut()
            .find(|r| r.record.tool_name == record.tool_name)
        {
            Some(existing) => existing.record = record.clone(),
            None => {
                let id = collection.next_id;
                collection.next_id += 1;
                collection.rows.push(StoredRecord {
                    id,
                    record: record.clone(),
                });
            }
        }
        Ok(())
    }

    async fn delete_by_name(&self, ns: &Namespace, name: &str) -> Result<bool> {
        let mut namespaces = self.write()?;
        let collection = namespaces.get_mut(ns).ok_or_else(|| missing(ns))?;
        let before = collection.rows.len();
        collection.rows.retain(|r| r.record.tool_name != name);
        Ok(collection.rows.len() < before)
    }

    async fn count(&self, ns: &Namespace) -> Result<usize> {
        let namespaces = self.read()?;
        let collection = namespaces.get(ns).ok_or_else(|| missing(ns))?;
        Ok(collection.rows.len())
    }

    async fn nearest_neighbors(
        &self,
        ns: &Namespace,
        query: &[f32],
        k: usize,
    ) -> Result<Vec<Neighbor>> {
        let namespaces = self.read()?;
        let collection = namespaces.get(ns).ok_or_else(|| missing(ns))?;
        let mut neighbors: Vec<Neighbor> = collection
            .rows
            .iter()
            .map(|r| Neighbor {
                id: r.id,
                tool_name: r.record.tool_name.clone(),
                tool_json: r.record.tool_json.clone(),
                distance: cosine_distance(query, &r.record.embedding),
            })
            .collect();
        neighbors.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.id.cmp(&b.id))
        });
        neighbors.truncate(k);
        Ok(neighbors)
    }

    async fn get_by_name(&self, ns: &Namespace, name: &str) -> Result<Option<StoredRecord>> {
        let namespaces = self.read()?;
        let collection = namespaces.get(ns).ok_or_else(|| missing(ns))?;
        Ok(collection
            .rows
            .iter()
            .find(|r| r.record.tool_name == name)
            .cloned())
    }
}

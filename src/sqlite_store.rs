//! SQLite-backed [`ToolStore`] implementation.
//!
//! Each namespace is its own table (see [`ensure_schema`](ToolStore::ensure_schema)),
//! and `toolrag_namespaces` records the dimension and row-layout version each
//! table was created with. Namespace names are sanitized identifiers, so they
//! are interpolated into SQL directly.
//!
//! SQLite has no vector index without an extension: nearest-neighbour
//! queries load the namespace's vectors and rank them in process.

use std::collections::HashSet;

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use tokio::sync::RwLock;

use toolrag_core::embedding::{blob_to_vec, cosine_distance, vec_to_blob};
use toolrag_core::store::{
    EmbeddingRecord, Namespace, Neighbor, StoredRecord, ToolStore, SCHEMA_VERSION,
};
use toolrag_core::{Result, ToolRagError};

/// SQLite implementation of the [`ToolStore`] trait.
pub struct SqliteToolStore {
    pool: SqlitePool,
    /// Namespaces whose table is known to exist.
    ready: RwLock<HashSet<Namespace>>,
}

impl SqliteToolStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            ready: RwLock::new(HashSet::new()),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Fail with `NotInitialized` unless the namespace table exists.
    async fn require(&self, ns: &Namespace) -> Result<()> {
        if self.ready.read().await.contains(ns) {
            return Ok(());
        }
        let exists: Option<String> =
            sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?")
                .bind(ns.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(ToolRagError::store)?;
        if exists.is_none() {
            return Err(ToolRagError::NotInitialized(format!(
                "namespace '{}' has no schema; run `toolrag init`",
                ns
            )));
        }
        self.ready.write().await.insert(ns.clone());
        Ok(())
    }

    /// Namespaces recorded in the metadata table.
    pub async fn list_namespaces(&self) -> Result<Vec<NamespaceInfo>> {
        let has_meta: Option<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'toolrag_namespaces'",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(ToolRagError::store)?;
        if has_meta.is_none() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            "SELECT namespace, dims, created_at FROM toolrag_namespaces ORDER BY namespace",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(ToolRagError::store)?;
        Ok(rows
            .iter()
            .map(|row| {
                let dims: i64 = row.get("dims");
                NamespaceInfo {
                    name: row.get("namespace"),
                    dims: dims as usize,
                    created_at: row.get("created_at"),
                }
            })
            .collect())
    }
}

/// One row of `toolrag_namespaces`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceInfo {
    pub name: String,
    pub dims: usize,
    /// Unix timestamp, seconds.
    pub created_at: i64,
}

#[async_trait]
impl ToolStore for SqliteToolStore {
    async fn ensure_schema(&self, ns: &Namespace, dims: usize) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(ToolRagError::store)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS toolrag_namespaces (
                namespace TEXT PRIMARY KEY,
                dims INTEGER NOT NULL,
                schema_version INTEGER NOT NULL,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&mut *tx)
        .await
        .map_err(ToolRagError::store)?;

        let existing = sqlx::query(
            "SELECT dims, schema_version FROM toolrag_namespaces WHERE namespace = ?",
        )
        .bind(ns.as_str())
        .fetch_optional(&mut *tx)
        .await
        .map_err(ToolRagError::store)?;

        match existing {
            Some(row) => {
                let stored_dims: i64 = row.get("dims");
                let stored_version: i64 = row.get("schema_version");
                if stored_dims != dims as i64 || stored_version != SCHEMA_VERSION {
                    return Err(ToolRagError::Configuration(format!(
                        "namespace '{}' exists with dims={} schema_version={}, requested dims={} schema_version={}",
                        ns, stored_dims, stored_version, dims, SCHEMA_VERSION
                    )));
                }
            }
            None => {
                sqlx::query(
                    "INSERT INTO toolrag_namespaces (namespace, dims, schema_version, created_at) VALUES (?, ?, ?, ?)",
                )
                .bind(ns.as_str())
                .bind(dims as i64)
                .bind(SCHEMA_VERSION)
                .bind(chrono::Utc::now().timestamp())
                .execute(&mut *tx)
                .await
                .map_err(ToolRagError::store)?;
            }
        }

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS "{ns}" (
                id INTEGER PRIMARY KEY,
                tool_name TEXT NOT NULL UNIQUE,
                tool_hash TEXT NOT NULL,
                embedding BLOB NOT NULL,
                embedding_text TEXT NOT NULL,
                tool_json TEXT NOT NULL
            )
            "#
        ))
        .execute(&mut *tx)
        .await
        .map_err(ToolRagError::store)?;

        sqlx::query(&format!(
            r#"CREATE INDEX IF NOT EXISTS "idx_{ns}_tool_hash" ON "{ns}"(tool_hash)"#
        ))
        .execute(&mut *tx)
        .await
        .map_err(ToolRagError::store)?;

        tx.commit().await.map_err(ToolRagError::store)?;
        self.ready.write().await.insert(ns.clone());
        tracing::debug!(namespace = %ns, dims, "namespace schema ready");
        Ok(())
    }

    async fn hashes_in_namespace(&self, ns: &Namespace) -> Result<HashSet<String>> {
        self.require(ns).await?;
        let hashes: Vec<String> = sqlx::query_scalar(&format!(r#"SELECT tool_hash FROM "{ns}""#))
            .fetch_all(&self.pool)
            .await
            .map_err(ToolRagError::store)?;
        Ok(hashes.into_iter().collect())
    }

    async fn names_in_namespace(&self, ns: &Namespace) -> Result<HashSet<String>> {
        self.require(ns).await?;
        let names: Vec<String> = sqlx::query_scalar(&format!(r#"SELECT tool_name FROM "{ns}""#))
            .fetch_all(&self.pool)
            .await
            .map_err(ToolRagError::store)?;
        Ok(names.into_iter().collect())
    }

    async fn upsert_by_name(&self, ns: &Namespace, record: &EmbeddingRecord) -> Result<()> {
        self.require(ns).await?;
        sqlx::query(&format!(
            r#"
            INSERT INTO "{ns}" (tool_name, tool_hash, embedding, embedding_text, tool_json)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(tool_name) DO UPDATE SET
                tool_hash = excluded.tool_hash,
                embedding = excluded.embedding,
                embedding_text = excluded.embedding_text,
                tool_json = excluded.tool_json
            "#
        ))
        .bind(&record.tool_name)
        .bind(&record.tool_hash)
        .bind(vec_to_blob(&record.embedding))
        .bind(&record.embedding_text)
        .bind(&record.tool_json)
        .execute(&self.pool)
        .await
        .map_err(ToolRagError::store)?;
        Ok(())
    }

    async fn delete_by_name(&self, ns: &Namespace, name: &str) -> Result<bool> {
        self.require(ns).await?;
        let result = sqlx::query(&format!(r#"DELETE FROM "{ns}" WHERE tool_name = ?"#))
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(ToolRagError::store)?;
        Ok(result.rows_affected() > 0)
    }

    async fn count(&self, ns: &Namespace) -> Result<usize> {
        self.require(ns).await?;
        let n: i64 = sqlx::query_scalar(&format!(r#"SELECT COUNT(*) FROM "{ns}""#))
            .fetch_one(&self.pool)
            .await
            .map_err(ToolRagError::store)?;
        Ok(n as usize)
    }

    async fn nearest_neighbors(
        &self,
        ns: &Namespace,
        query: &[f32],
        k: usize,
    ) -> Result<Vec<Neighbor>> {
        self.require(ns).await?;
        let rows = sqlx::query(&format!(
            r#"SELECT id, tool_name, tool_json, embedding FROM "{ns}""#
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(ToolRagError::store)?;

        let mut neighbors: Vec<Neighbor> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                Neighbor {
                    id: row.get("id"),
                    tool_name: row.get("tool_name"),
                    tool_json: row.get("tool_json"),
                    distance: cosine_distance(query, &blob_to_vec(&blob)),
                }
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
        self.require(ns).await?;
        let row = sqlx::query(&format!(
            r#"
            SELECT id, tool_name, tool_hash, embedding, embedding_text, tool_json
            FROM "{ns}" WHERE tool_name = ?
            "#
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(ToolRagError::store)?;

        Ok(row.map(|row| {
            let blob: Vec<u8> = row.get("embedding");
            StoredRecord {
                id: row.get("id"),
                record: EmbeddingRecord {
                    tool_name: row.get("tool_name"),
                    tool_hash: row.get("tool_hash"),
                    embedding: blob_to_vec(&blob),
                    embedding_text: row.get("embedding_text"),
                    tool_json: row.get("tool_json"),
                },
            }
        }))
    }
}

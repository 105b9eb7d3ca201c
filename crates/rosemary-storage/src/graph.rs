// SPDX-FileCopyrightText: 2026 Rosemary Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the [`GraphStore`] trait.
//!
//! Nodes live in one table keyed by `(label, key)` with JSON properties and
//! an optional f32 BLOB vector. Similarity search is a brute-force cosine
//! scan over the vectors of one label.

use std::str::FromStr;
use std::sync::OnceLock;

use async_trait::async_trait;
use rusqlite::{OptionalExtension, Row, params, types::Type};
use serde_json::{Map, Value};
use tracing::{debug, info};

use rosemary_config::model::StorageConfig;
use rosemary_core::types::{
    Direction, Edge, EdgeType, Node, NodeFilter, NodeLabel, NodeRef, WriteBatch, WriteMode,
};
use rosemary_core::vector::{blob_to_vec, cosine_similarity, vec_to_blob};
use rosemary_core::{AdapterType, GraphStore, HealthStatus, PluginAdapter, RosemaryError};

use crate::database::{Database, flatten_tr_err, map_tr_err};

const DIMENSIONS_KEY: &str = "embedding_dimensions";

const NODE_COLUMNS: &str = "label, key, attrs, embedding";

/// Graph store backed by a single SQLite database.
pub struct SqliteGraphStore {
    db: Database,
    dimensions: OnceLock<usize>,
}

impl SqliteGraphStore {
    /// Wraps an already-open database.
    pub fn new(db: Database) -> Self {
        Self {
            db,
            dimensions: OnceLock::new(),
        }
    }

    /// Opens the database described by `config`.
    pub async fn open(config: &StorageConfig) -> Result<Self, RosemaryError> {
        let db = Database::open(&config.database_path, config.wal_mode).await?;
        Ok(Self::new(db))
    }

    /// Opens a private in-memory store.
    pub async fn open_in_memory() -> Result<Self, RosemaryError> {
        Ok(Self::new(Database::open_in_memory().await?))
    }

    /// Vector dimensionality pinned by [`GraphStore::ensure_graph`], if any.
    pub fn dimensions(&self) -> Option<usize> {
        self.dimensions.get().copied()
    }

    /// Number of nodes per label, for diagnostics.
    pub async fn node_counts(&self) -> Result<Vec<(NodeLabel, usize)>, RosemaryError> {
        let rows = self
            .db
            .connection()
            .call(|conn| -> Result<Vec<(String, i64)>, rusqlite::Error> {
                let mut stmt =
                    conn.prepare("SELECT label, COUNT(*) FROM nodes GROUP BY label ORDER BY label")?;
                let rows = stmt
                    .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(map_tr_err)?;

        Ok(rows
            .into_iter()
            .filter_map(|(label, count)| {
                NodeLabel::from_str(&label)
                    .ok()
                    .map(|l| (l, usize::try_from(count).unwrap_or(0)))
            })
            .collect())
    }

    fn check_vector(&self, vector: &[f32]) -> Result<(), RosemaryError> {
        match self.dimensions.get() {
            Some(&dims) if dims != vector.len() => Err(RosemaryError::Config(format!(
                "vector has {} dimensions, store is pinned to {dims}",
                vector.len()
            ))),
            _ => Ok(()),
        }
    }
}

fn now() -> String {
    chrono::Utc::now()
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
}

fn conversion_err(
    idx: usize,
    ty: Type,
    e: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, ty, Box::new(e))
}

/// Maps a row selected with [`NODE_COLUMNS`].
fn row_to_node(row: &Row<'_>) -> Result<Node, rusqlite::Error> {
    let label: String = row.get(0)?;
    let label = NodeLabel::from_str(&label).map_err(|e| conversion_err(0, Type::Text, e))?;
    let key: String = row.get(1)?;
    let attrs: String = row.get(2)?;
    let attrs: Map<String, Value> =
        serde_json::from_str(&attrs).map_err(|e| conversion_err(2, Type::Text, e))?;
    let embedding: Option<Vec<u8>> = row.get(3)?;
    Ok(Node {
        label,
        key,
        attrs,
        embedding: embedding.map(|b| blob_to_vec(&b)),
    })
}

fn write_node(
    conn: &rusqlite::Connection,
    node: &Node,
    mode: WriteMode,
    ts: &str,
) -> Result<(), rusqlite::Error> {
    let attrs = Value::Object(node.attrs.clone()).to_string();
    let blob = node.embedding.as_deref().map(vec_to_blob);
    let sql = match mode {
        WriteMode::Upsert => {
            "INSERT INTO nodes (label, key, attrs, embedding, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)
             ON CONFLICT (label, key) DO UPDATE SET
                attrs = excluded.attrs,
                embedding = excluded.embedding,
                updated_at = excluded.updated_at"
        }
        WriteMode::CreateOnly => {
            "INSERT OR IGNORE INTO nodes (label, key, attrs, embedding, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)"
        }
    };
    conn.execute(
        sql,
        params![node.label.to_string(), node.key, attrs, blob, ts],
    )?;
    Ok(())
}

fn write_edge(conn: &rusqlite::Connection, edge: &Edge, ts: &str) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT OR IGNORE INTO edges (from_label, from_key, to_label, to_key, edge_type, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            edge.from.label.to_string(),
            edge.from.key,
            edge.to.label.to_string(),
            edge.to.key,
            edge.edge_type.to_string(),
            ts,
        ],
    )?;
    Ok(())
}

fn parse_edge(
    from_label: String,
    from_key: String,
    to_label: String,
    to_key: String,
    edge_type: String,
) -> Result<Edge, rusqlite::Error> {
    let from_label =
        NodeLabel::from_str(&from_label).map_err(|e| conversion_err(0, Type::Text, e))?;
    let to_label = NodeLabel::from_str(&to_label).map_err(|e| conversion_err(2, Type::Text, e))?;
    let edge_type =
        EdgeType::from_str(&edge_type).map_err(|e| conversion_err(4, Type::Text, e))?;
    Ok(Edge::new(
        NodeRef::new(from_label, from_key),
        NodeRef::new(to_label, to_key),
        edge_type,
    ))
}

#[async_trait]
impl PluginAdapter for SqliteGraphStore {
    fn name(&self) -> &str {
        "sqlite-graph"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::GraphStore
    }

    async fn health_check(&self) -> Result<HealthStatus, RosemaryError> {
        self.db
            .connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), RosemaryError> {
        self.db.checkpoint().await?;
        debug!("graph store shutdown: WAL checkpoint complete");
        Ok(())
    }
}

#[async_trait]
impl GraphStore for SqliteGraphStore {
    async fn ensure_graph(&self, dimensions: usize) -> Result<(), RosemaryError> {
        if dimensions == 0 {
            return Err(RosemaryError::Config(
                "embedding dimensions must be non-zero".into(),
            ));
        }
        let pinned = self
            .db
            .connection()
            .call(move |conn| -> Result<usize, RosemaryError> {
                let storage = |e: rusqlite::Error| RosemaryError::Storage {
                    source: Box::new(e),
                };
                let tx = conn.transaction().map_err(storage)?;
                let existing: Option<String> = tx
                    .query_row(
                        "SELECT value FROM graph_meta WHERE key = ?1",
                        params![DIMENSIONS_KEY],
                        |row| row.get(0),
                    )
                    .optional()
                    .map_err(storage)?;
                let pinned = match existing {
                    Some(value) => value.parse::<usize>().map_err(|_| {
                        RosemaryError::Config(format!(
                            "stored embedding dimensions `{value}` is not a number"
                        ))
                    })?,
                    None => {
                        tx.execute(
                            "INSERT INTO graph_meta (key, value) VALUES (?1, ?2)",
                            params![DIMENSIONS_KEY, dimensions.to_string()],
                        )
                        .map_err(storage)?;
                        dimensions
                    }
                };
                tx.commit().map_err(storage)?;
                Ok(pinned)
            })
            .await
            .map_err(flatten_tr_err)?;

        if pinned != dimensions {
            return Err(RosemaryError::Config(format!(
                "store holds {pinned}-dimensional vectors but the embedding provider produces {dimensions}"
            )));
        }
        let _ = self.dimensions.set(pinned);
        info!(dimensions = pinned, "graph schema ready");
        Ok(())
    }

    async fn upsert_node(&self, node: &Node) -> Result<(), RosemaryError> {
        let mut batch = WriteBatch::new();
        batch.upsert(node.clone());
        self.apply(batch).await
    }

    async fn upsert_edge(&self, edge: &Edge) -> Result<(), RosemaryError> {
        let mut batch = WriteBatch::new();
        batch.link(edge.clone());
        self.apply(batch).await
    }

    async fn apply(&self, batch: WriteBatch) -> Result<(), RosemaryError> {
        if batch.is_empty() {
            return Ok(());
        }
        for write in &batch.nodes {
            if let Some(vector) = &write.node.embedding {
                self.check_vector(vector)?;
            }
        }
        let (node_count, edge_count) = (batch.nodes.len(), batch.edges.len());
        self.db
            .connection()
            .call(move |conn| -> Result<(), rusqlite::Error> {
                let ts = now();
                let tx = conn.transaction()?;
                for write in &batch.nodes {
                    write_node(&tx, &write.node, write.mode, &ts)?;
                }
                for edge in &batch.edges {
                    write_edge(&tx, edge, &ts)?;
                }
                tx.commit()
            })
            .await
            .map_err(map_tr_err)?;
        debug!(nodes = node_count, edges = edge_count, "write batch applied");
        Ok(())
    }

    async fn get_node(&self, label: NodeLabel, key: &str) -> Result<Option<Node>, RosemaryError> {
        let key = key.to_string();
        self.db
            .connection()
            .call(move |conn| -> Result<Option<Node>, rusqlite::Error> {
                conn.query_row(
                    &format!("SELECT {NODE_COLUMNS} FROM nodes WHERE label = ?1 AND key = ?2"),
                    params![label.to_string(), key],
                    row_to_node,
                )
                .optional()
            })
            .await
            .map_err(map_tr_err)
    }

    async fn scan_nodes(
        &self,
        label: NodeLabel,
        filter: &NodeFilter,
    ) -> Result<Vec<Node>, RosemaryError> {
        let nodes = self
            .db
            .connection()
            .call(move |conn| -> Result<Vec<Node>, rusqlite::Error> {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {NODE_COLUMNS} FROM nodes WHERE label = ?1 ORDER BY key"
                ))?;
                let nodes = stmt
                    .query_map(params![label.to_string()], row_to_node)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(nodes)
            })
            .await
            .map_err(map_tr_err)?;
        Ok(nodes.into_iter().filter(|n| filter.matches(n)).collect())
    }

    async fn query_nodes_by_similarity(
        &self,
        label: NodeLabel,
        vector: &[f32],
        min_score: f32,
    ) -> Result<Vec<(Node, f32)>, RosemaryError> {
        self.check_vector(vector)?;
        let nodes = self
            .db
            .connection()
            .call(move |conn| -> Result<Vec<Node>, rusqlite::Error> {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {NODE_COLUMNS} FROM nodes
                     WHERE label = ?1 AND embedding IS NOT NULL ORDER BY key"
                ))?;
                let nodes = stmt
                    .query_map(params![label.to_string()], row_to_node)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(nodes)
            })
            .await
            .map_err(map_tr_err)?;

        let mut scored: Vec<(Node, f32)> = nodes
            .into_iter()
            .filter_map(|node| {
                let score = node
                    .embedding
                    .as_deref()
                    .map(|e| cosine_similarity(vector, e))?;
                (score >= min_score).then_some((node, score))
            })
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.key.cmp(&b.0.key)));
        Ok(scored)
    }

    async fn neighbors(
        &self,
        node: &NodeRef,
        edge_type: EdgeType,
        direction: Direction,
    ) -> Result<Vec<Node>, RosemaryError> {
        let (near, far) = match direction {
            Direction::Outgoing => ("from", "to"),
            Direction::Incoming => ("to", "from"),
        };
        let sql = format!(
            "SELECT n.label, n.key, n.attrs, n.embedding
             FROM edges e
             JOIN nodes n ON n.label = e.{far}_label AND n.key = e.{far}_key
             WHERE e.{near}_label = ?1 AND e.{near}_key = ?2 AND e.edge_type = ?3
             ORDER BY n.label, n.key"
        );
        let node = node.clone();
        self.db
            .connection()
            .call(move |conn| -> Result<Vec<Node>, rusqlite::Error> {
                let mut stmt = conn.prepare(&sql)?;
                let nodes = stmt
                    .query_map(
                        params![node.label.to_string(), node.key, edge_type.to_string()],
                        row_to_node,
                    )?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(nodes)
            })
            .await
            .map_err(map_tr_err)
    }

    async fn scan_edges(&self, edge_type: Option<EdgeType>) -> Result<Vec<Edge>, RosemaryError> {
        let edge_type = edge_type.map(|t| t.to_string());
        self.db
            .connection()
            .call(move |conn| -> Result<Vec<Edge>, rusqlite::Error> {
                let mut stmt = conn.prepare(
                    "SELECT from_label, from_key, to_label, to_key, edge_type FROM edges
                     WHERE ?1 IS NULL OR edge_type = ?1
                     ORDER BY from_label, from_key, edge_type, to_label, to_key",
                )?;
                let raw = stmt
                    .query_map(params![edge_type], |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, String>(3)?,
                            row.get::<_, String>(4)?,
                        ))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                raw.into_iter()
                    .map(|(fl, fk, tl, tk, et)| parse_edge(fl, fk, tl, tk, et))
                    .collect()
            })
            .await
            .map_err(map_tr_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topic(key: &str, domain: &str) -> Node {
        Node::new(NodeLabel::Topic, key)
            .with_attr("domain_code", domain)
            .with_attr("label", key)
    }

    #[tokio::test]
    async fn upsert_is_idempotent() {
        let store = SqliteGraphStore::open_in_memory().await.unwrap();
        store.upsert_node(&topic("t1", "A")).await.unwrap();
        store
            .upsert_node(&topic("t1", "A").with_attr("detail_count", 2))
            .await
            .unwrap();

        let nodes = store
            .scan_nodes(NodeLabel::Topic, &NodeFilter::all())
            .await
            .unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].attr_u64("detail_count"), Some(2));
    }

    #[tokio::test]
    async fn create_only_keeps_existing_node() {
        let store = SqliteGraphStore::open_in_memory().await.unwrap();
        let mut batch = WriteBatch::new();
        batch.create(Node::new(NodeLabel::Domain, "A").with_attr("name", "Artistic"));
        store.apply(batch).await.unwrap();

        let mut batch = WriteBatch::new();
        batch.create(Node::new(NodeLabel::Domain, "A").with_attr("name", "Other"));
        store.apply(batch).await.unwrap();

        let node = store.get_node(NodeLabel::Domain, "A").await.unwrap().unwrap();
        assert_eq!(node.attr_str("name"), Some("Artistic"));
    }

    #[tokio::test]
    async fn edges_are_unique_and_traversable() {
        let store = SqliteGraphStore::open_in_memory().await.unwrap();
        let edge = Edge::new(
            NodeRef::new(NodeLabel::Topic, "t1"),
            NodeRef::new(NodeLabel::Domain, "A"),
            EdgeType::InDomain,
        );
        let mut batch = WriteBatch::new();
        batch
            .create(Node::new(NodeLabel::Domain, "A"))
            .upsert(topic("t1", "A"))
            .link(edge.clone())
            .link(edge.clone());
        store.apply(batch).await.unwrap();
        store.upsert_edge(&edge).await.unwrap();

        assert_eq!(store.scan_edges(None).await.unwrap().len(), 1);
        let domains = store
            .neighbors(&edge.from, EdgeType::InDomain, Direction::Outgoing)
            .await
            .unwrap();
        assert_eq!(domains.len(), 1);
        assert_eq!(domains[0].key, "A");
        let topics = store
            .neighbors(&edge.to, EdgeType::InDomain, Direction::Incoming)
            .await
            .unwrap();
        assert_eq!(topics[0].key, "t1");
    }

    #[tokio::test]
    async fn failed_batch_writes_nothing() {
        let store = SqliteGraphStore::open_in_memory().await.unwrap();
        let mut batch = WriteBatch::new();
        batch.upsert(topic("t1", "A")).link(Edge::new(
            NodeRef::new(NodeLabel::Topic, "t1"),
            NodeRef::new(NodeLabel::Domain, "missing"),
            EdgeType::InDomain,
        ));
        assert!(store.apply(batch).await.is_err());
        assert!(
            store
                .get_node(NodeLabel::Topic, "t1")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn filter_on_properties() {
        let store = SqliteGraphStore::open_in_memory().await.unwrap();
        store.upsert_node(&topic("t1", "A")).await.unwrap();
        store.upsert_node(&topic("t2", "S")).await.unwrap();
        let found = store
            .scan_nodes(NodeLabel::Topic, &NodeFilter::all().eq("domain_code", "S"))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].key, "t2");
    }

    #[tokio::test]
    async fn similarity_orders_best_first_and_applies_floor() {
        let store = SqliteGraphStore::open_in_memory().await.unwrap();
        store.ensure_graph(2).await.unwrap();
        for (key, v) in [("a", [1.0, 0.0]), ("b", [0.8, 0.6]), ("c", [0.0, 1.0])] {
            store
                .upsert_node(&Node::new(NodeLabel::Detail, key).with_embedding(v.to_vec()))
                .await
                .unwrap();
        }
        let hits = store
            .query_nodes_by_similarity(NodeLabel::Detail, &[1.0, 0.0], 0.5)
            .await
            .unwrap();
        let keys: Vec<&str> = hits.iter().map(|(n, _)| n.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert!((hits[1].1 - 0.8).abs() < 1e-6);
    }

    #[tokio::test]
    async fn dimension_mismatch_is_config_error() {
        let store = SqliteGraphStore::open_in_memory().await.unwrap();
        store.ensure_graph(3).await.unwrap();
        store.ensure_graph(3).await.unwrap();
        assert!(matches!(
            store.ensure_graph(4).await,
            Err(RosemaryError::Config(_))
        ));
        let wrong = Node::new(NodeLabel::Detail, "d").with_embedding(vec![1.0, 0.0]);
        assert!(matches!(
            store.upsert_node(&wrong).await,
            Err(RosemaryError::Config(_))
        ));
    }
}

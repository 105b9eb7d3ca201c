// SPDX-FileCopyrightText: 2026 Rosemary Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Graph store trait for labeled nodes and typed edges.

use async_trait::async_trait;

use crate::error::RosemaryError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{Direction, Edge, EdgeType, Node, NodeFilter, NodeLabel, NodeRef, WriteBatch};

/// Persistence backend for the memory graph.
///
/// Nodes are unique per `(label, key)`; edges are unique per
/// `(from, to, edge_type)`. Upserts are idempotent: writing the same key
/// twice updates the node rather than duplicating it.
#[async_trait]
pub trait GraphStore: PluginAdapter {
    /// Prepares the backend (schema, indexes) and pins the vector dimensionality.
    ///
    /// Fails with [`RosemaryError::Config`] if the store already holds vectors
    /// of a different dimensionality.
    async fn ensure_graph(&self, dimensions: usize) -> Result<(), RosemaryError>;

    /// Inserts or updates a node.
    async fn upsert_node(&self, node: &Node) -> Result<(), RosemaryError>;

    /// Inserts an edge if it does not already exist.
    async fn upsert_edge(&self, edge: &Edge) -> Result<(), RosemaryError>;

    /// Applies a batch of node and edge writes atomically.
    async fn apply(&self, batch: WriteBatch) -> Result<(), RosemaryError>;

    /// Fetches a node by label and key.
    async fn get_node(&self, label: NodeLabel, key: &str) -> Result<Option<Node>, RosemaryError>;

    /// Returns all nodes of `label` matching `filter`, ordered by key.
    async fn scan_nodes(
        &self,
        label: NodeLabel,
        filter: &NodeFilter,
    ) -> Result<Vec<Node>, RosemaryError>;

    /// Scores every vector-bearing node of `label` against `vector` by cosine
    /// similarity and returns those scoring at least `min_score`, best first.
    async fn query_nodes_by_similarity(
        &self,
        label: NodeLabel,
        vector: &[f32],
        min_score: f32,
    ) -> Result<Vec<(Node, f32)>, RosemaryError>;

    /// Returns the nodes adjacent to `node` over edges of `edge_type`.
    async fn neighbors(
        &self,
        node: &NodeRef,
        edge_type: EdgeType,
        direction: Direction,
    ) -> Result<Vec<Node>, RosemaryError>;

    /// Returns every edge, optionally restricted to one type.
    async fn scan_edges(&self, edge_type: Option<EdgeType>) -> Result<Vec<Edge>, RosemaryError>;
}

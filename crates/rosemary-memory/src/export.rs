// SPDX-FileCopyrightText: 2026 Rosemary Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! GraphExporter: read-only serialization of the memory graph.
//!
//! A [`GraphSnapshot`] holds every node (without vectors) and edge in a
//! stable order, so exporting an unchanged store twice yields identical
//! output. Snapshots render to Graphviz DOT or JSON.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use rosemary_core::types::{Edge, NodeFilter, NodeLabel, NodeRef};
use rosemary_core::{GraphStore, RosemaryError};

/// Longest node caption in DOT output.
const MAX_CAPTION_CHARS: usize = 80;

const EXPORTED_LABELS: [NodeLabel; 5] = [
    NodeLabel::Domain,
    NodeLabel::Topic,
    NodeLabel::Summary,
    NodeLabel::Detail,
    NodeLabel::Insight,
];

/// One exported node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotNode {
    #[serde(rename = "ref")]
    pub node_ref: NodeRef,
    /// Human-readable caption: label for Domains and Topics, text otherwise.
    pub caption: String,
    pub attrs: serde_json::Map<String, serde_json::Value>,
}

/// Every node and edge of the graph at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<SnapshotNode>,
    pub edges: Vec<Edge>,
}

impl GraphSnapshot {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }
}

/// Reads the whole graph for visualization. Never writes.
pub struct GraphExporter {
    store: Arc<dyn GraphStore>,
}

impl GraphExporter {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }

    /// Collects all nodes and edges, sorted by label, key and edge identity.
    pub async fn snapshot(&self) -> Result<GraphSnapshot, RosemaryError> {
        let mut nodes = Vec::new();
        for label in EXPORTED_LABELS {
            for node in self.store.scan_nodes(label, &NodeFilter::all()).await? {
                let caption = match label {
                    NodeLabel::Domain | NodeLabel::Topic => node.attr_str("label"),
                    NodeLabel::Summary | NodeLabel::Detail | NodeLabel::Insight => {
                        node.attr_str("text")
                    }
                }
                .unwrap_or(&node.key)
                .to_string();
                nodes.push(SnapshotNode {
                    node_ref: node.node_ref(),
                    caption,
                    attrs: node.attrs,
                });
            }
        }
        nodes.sort_by(|a, b| a.node_ref.cmp(&b.node_ref));

        let mut edges = self.store.scan_edges(None).await?;
        edges.sort();
        Ok(GraphSnapshot { nodes, edges })
    }

    /// Snapshot rendered as Graphviz DOT.
    pub async fn export_dot(&self) -> Result<String, RosemaryError> {
        Ok(to_dot(&self.snapshot().await?))
    }

    /// Snapshot rendered as pretty-printed JSON.
    pub async fn export_json(&self) -> Result<String, RosemaryError> {
        to_json(&self.snapshot().await?)
    }
}

/// Renders a snapshot as a `digraph Memory` DOT document.
pub fn to_dot(snapshot: &GraphSnapshot) -> String {
    let mut lines = vec![
        "digraph Memory {".to_string(),
        "  rankdir=LR;".to_string(),
        "  dpi=200;".to_string(),
        "  nodesep=0.4;".to_string(),
        "  ranksep=0.6;".to_string(),
        r##"  node [shape=box, style="rounded,filled", color="#444444", fillcolor="#f6f6f6", fontname="Helvetica", fontsize=12];"##.to_string(),
        r##"  edge [color="#666666", fontname="Helvetica", fontsize=10];"##.to_string(),
    ];
    for node in &snapshot.nodes {
        let caption = format!("{}: {}", node.node_ref.label, sanitize(&node.caption));
        lines.push(format!(
            "  \"{}\" [label=\"{}\"];",
            escape(&node.node_ref.to_string()),
            escape(&caption)
        ));
    }
    for edge in &snapshot.edges {
        lines.push(format!(
            "  \"{}\" -> \"{}\" [label=\"{}\"];",
            escape(&edge.from.to_string()),
            escape(&edge.to.to_string()),
            edge.edge_type
        ));
    }
    lines.push("}".to_string());
    lines.join("\n")
}

/// Renders a snapshot as pretty-printed JSON.
pub fn to_json(snapshot: &GraphSnapshot) -> Result<String, RosemaryError> {
    serde_json::to_string_pretty(snapshot)
        .map_err(|e| RosemaryError::Internal(format!("graph export serialization failed: {e}")))
}

/// `<dir>/graph-YYYYMMDD-HHMMSS.<ext>` for the current UTC time.
pub fn default_snapshot_path(dir: &Path, ext: &str) -> PathBuf {
    let slug = chrono::Utc::now().format("%Y%m%d-%H%M%S");
    dir.join(format!("graph-{slug}.{ext}"))
}

/// Collapses whitespace and truncates to [`MAX_CAPTION_CHARS`].
fn sanitize(text: &str) -> String {
    let clean = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if clean.chars().count() > MAX_CAPTION_CHARS {
        let cut: String = clean.chars().take(MAX_CAPTION_CHARS - 3).collect();
        format!("{cut}...")
    } else {
        clean
    }
}

/// DOT string literals cannot contain raw double quotes or trailing backslashes.
fn escape(text: &str) -> String {
    text.replace('\\', "/").replace('"', "'")
}

// SPDX-FileCopyrightText: 2026 Rosemary Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types used across adapter traits and the memory engine.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{Display, EnumString};

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of collaborator an adapter provides.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Embedding,
    Completion,
    GraphStore,
}

// --- Embedding types ---

/// Input for an embedding adapter.
#[derive(Debug, Clone)]
pub struct EmbeddingInput {
    /// Texts to embed, one vector is produced per text.
    pub texts: Vec<String>,
}

/// Output from an embedding adapter.
#[derive(Debug, Clone)]
pub struct EmbeddingOutput {
    /// One vector per input text, in input order.
    pub embeddings: Vec<Vec<f32>>,
    /// Dimensionality of every vector in `embeddings`.
    pub dimensions: usize,
}

// --- Completion types ---

/// What a completion request is for. Used for logging and metrics labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
pub enum CompletionPurpose {
    /// Map a detail onto the fixed Domain vocabulary.
    ClassifyDomain,
    /// Name a newly created Topic.
    LabelTopic,
    /// Regenerate a Topic summary.
    Summarize,
    /// Extract insights from a Topic.
    Insight,
    /// Free-form agent reply.
    Chat,
}

/// A request to a completion provider.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Why this request is being made.
    pub purpose: CompletionPurpose,
    /// Optional system instruction.
    pub system: Option<String>,
    /// The user prompt.
    pub prompt: String,
    /// When set, the reply must be exactly one of these values.
    pub constrained_vocabulary: Option<Vec<String>>,
    /// Upper bound on generated tokens.
    pub max_tokens: u32,
}

impl CompletionRequest {
    /// Creates an unconstrained request with a default token budget.
    pub fn new(purpose: CompletionPurpose, prompt: impl Into<String>) -> Self {
        Self {
            purpose,
            system: None,
            prompt: prompt.into(),
            constrained_vocabulary: None,
            max_tokens: 512,
        }
    }

    /// Sets the system instruction.
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Restricts the reply to a closed set of values.
    pub fn with_vocabulary(mut self, vocabulary: Vec<String>) -> Self {
        self.constrained_vocabulary = Some(vocabulary);
        self
    }

    /// Overrides the token budget.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Token usage reported by a completion provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// A response from a completion provider.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// Generated text.
    pub text: String,
    /// Model that produced the text.
    pub model: String,
    /// Token usage, when the provider reports it.
    pub usage: Option<TokenUsage>,
}

// --- Graph types ---

/// Node labels in the memory graph.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
pub enum NodeLabel {
    Domain,
    Topic,
    Summary,
    Detail,
    Insight,
}

/// Edge types in the memory graph.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeType {
    /// Topic -> Domain. Exactly one per Topic.
    InDomain,
    /// Detail -> Topic. At least one per Detail.
    InTopic,
    /// Topic -> Summary. At most one per Topic.
    HasSummary,
    /// Insight -> Topic or Insight -> Domain.
    About,
}

/// A reference to a node by its label and unique key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeRef {
    pub label: NodeLabel,
    pub key: String,
}

impl NodeRef {
    pub fn new(label: NodeLabel, key: impl Into<String>) -> Self {
        Self {
            label,
            key: key.into(),
        }
    }
}

impl std::fmt::Display for NodeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.label, self.key)
    }
}

/// A labeled graph node with JSON properties and an optional vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub label: NodeLabel,
    pub key: String,
    pub attrs: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl Node {
    /// Creates a node with no properties and no vector.
    pub fn new(label: NodeLabel, key: impl Into<String>) -> Self {
        Self {
            label,
            key: key.into(),
            attrs: Map::new(),
            embedding: None,
        }
    }

    /// Sets a property, replacing any previous value.
    pub fn with_attr(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.attrs.insert(name.to_string(), value.into());
        self
    }

    /// Attaches a vector.
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// Returns the reference for this node.
    pub fn node_ref(&self) -> NodeRef {
        NodeRef::new(self.label, self.key.clone())
    }

    /// Reads a string property.
    pub fn attr_str(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).and_then(Value::as_str)
    }

    /// Reads an unsigned integer property.
    pub fn attr_u64(&self, name: &str) -> Option<u64> {
        self.attrs.get(name).and_then(Value::as_u64)
    }
}

/// A directed, typed edge. Unique per `(from, to, edge_type)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Edge {
    pub from: NodeRef,
    pub to: NodeRef,
    pub edge_type: EdgeType,
}

impl Edge {
    pub fn new(from: NodeRef, to: NodeRef, edge_type: EdgeType) -> Self {
        Self {
            from,
            to,
            edge_type,
        }
    }
}

/// Edge traversal direction relative to a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Outgoing,
    Incoming,
}

/// Property equality filter for node scans. An empty filter matches every node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeFilter {
    pub equals: Vec<(String, Value)>,
}

impl NodeFilter {
    /// Matches every node of the scanned label.
    pub fn all() -> Self {
        Self::default()
    }

    /// Adds a `property == value` condition.
    pub fn eq(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.equals.push((name.to_string(), value.into()));
        self
    }

    /// Evaluates the filter against an in-memory node.
    pub fn matches(&self, node: &Node) -> bool {
        self.equals
            .iter()
            .all(|(name, value)| node.attrs.get(name) == Some(value))
    }
}

/// How a node write behaves when the key already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Replace properties and vector of an existing node.
    Upsert,
    /// Leave an existing node untouched.
    CreateOnly,
}

/// A single node write inside a [`WriteBatch`].
#[derive(Debug, Clone)]
pub struct NodeWrite {
    pub node: Node,
    pub mode: WriteMode,
}

/// A set of node and edge writes applied in one transaction.
///
/// Node writes are applied before edge writes; either all of them become
/// visible or none do.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    pub nodes: Vec<NodeWrite>,
    pub edges: Vec<Edge>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues an upsert.
    pub fn upsert(&mut self, node: Node) -> &mut Self {
        self.nodes.push(NodeWrite {
            node,
            mode: WriteMode::Upsert,
        });
        self
    }

    /// Queues a create-only write.
    pub fn create(&mut self, node: Node) -> &mut Self {
        self.nodes.push(NodeWrite {
            node,
            mode: WriteMode::CreateOnly,
        });
        self
    }

    /// Queues an edge.
    pub fn link(&mut self, edge: Edge) -> &mut Self {
        self.edges.push(edge);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }
}

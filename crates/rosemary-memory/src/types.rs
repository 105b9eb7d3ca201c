// SPDX-FileCopyrightText: 2026 Rosemary Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Memory entities and their mapping onto graph nodes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use rosemary_core::RosemaryError;
use rosemary_core::types::{Node, NodeLabel, NodeRef};

/// Current UTC time in the fixed-width format used for every stored timestamp.
///
/// Fixed width keeps lexicographic order equal to chronological order.
pub fn now_timestamp() -> String {
    chrono::Utc::now()
        .format("%Y-%m-%dT%H:%M:%S%.6fZ")
        .to_string()
}

fn missing(label: NodeLabel, key: &str, attr: &str) -> RosemaryError {
    RosemaryError::Internal(format!("{label} node `{key}` has no `{attr}` property"))
}

fn required_str(node: &Node, attr: &str) -> Result<String, RosemaryError> {
    node.attr_str(attr)
        .map(str::to_string)
        .ok_or_else(|| missing(node.label, &node.key, attr))
}

/// A coarse interest category from the fixed vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    pub code: String,
    pub label: String,
}

impl Domain {
    pub fn node_ref(code: &str) -> NodeRef {
        NodeRef::new(NodeLabel::Domain, code)
    }

    pub fn to_node(&self) -> Node {
        Node::new(NodeLabel::Domain, self.code.clone())
            .with_attr("code", self.code.clone())
            .with_attr("label", self.label.clone())
    }

    pub fn from_node(node: &Node) -> Result<Self, RosemaryError> {
        Ok(Self {
            code: node.key.clone(),
            label: node.attr_str("label").unwrap_or(&node.key).to_string(),
        })
    }
}

/// A group of related Details within one Domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    pub id: String,
    pub domain_code: String,
    pub label: String,
    pub created_at: String,
    /// Number of Details folded into `centroid`.
    pub detail_count: u64,
    /// When the InsightGenerator last looked at this Topic.
    pub last_analyzed_at: Option<String>,
    /// Running mean of member Detail embeddings.
    pub centroid: Vec<f32>,
}

impl Topic {
    pub fn node_ref(id: &str) -> NodeRef {
        NodeRef::new(NodeLabel::Topic, id)
    }

    /// Folds one more embedding into the running centroid.
    ///
    /// An embedding whose length differs from a non-empty centroid is a
    /// `Config` error and leaves the Topic untouched.
    pub fn absorb(&mut self, embedding: &[f32]) -> Result<(), RosemaryError> {
        if self.centroid.is_empty() {
            self.centroid = embedding.to_vec();
        } else if self.centroid.len() != embedding.len() {
            return Err(RosemaryError::Config(format!(
                "topic `{}` centroid has {} dimensions, embedding has {}",
                self.id,
                self.centroid.len(),
                embedding.len()
            )));
        } else {
            let n = self.detail_count as f32;
            for (c, e) in self.centroid.iter_mut().zip(embedding) {
                *c = (*c * n + e) / (n + 1.0);
            }
        }
        self.detail_count += 1;
        Ok(())
    }

    pub fn to_node(&self) -> Node {
        let last_analyzed = self
            .last_analyzed_at
            .clone()
            .map(Value::String)
            .unwrap_or(Value::Null);
        Node::new(NodeLabel::Topic, self.id.clone())
            .with_attr("id", self.id.clone())
            .with_attr("domain_code", self.domain_code.clone())
            .with_attr("label", self.label.clone())
            .with_attr("created_at", self.created_at.clone())
            .with_attr("detail_count", self.detail_count)
            .with_attr("last_analyzed_at", last_analyzed)
            .with_embedding(self.centroid.clone())
    }

    pub fn from_node(node: &Node) -> Result<Self, RosemaryError> {
        Ok(Self {
            id: node.key.clone(),
            domain_code: required_str(node, "domain_code")?,
            label: required_str(node, "label")?,
            created_at: required_str(node, "created_at")?,
            detail_count: node.attr_u64("detail_count").unwrap_or(0),
            last_analyzed_at: node.attr_str("last_analyzed_at").map(str::to_string),
            centroid: node.embedding.clone().unwrap_or_default(),
        })
    }
}

/// Regenerated digest of one Topic's Details. Keyed by the owning Topic id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub topic_id: String,
    pub text: String,
    /// Embedding of `text`; empty when it was never embedded.
    #[serde(skip)]
    pub embedding: Vec<f32>,
    pub updated_at: String,
}

impl Summary {
    pub fn to_node(&self) -> Node {
        let node = Node::new(NodeLabel::Summary, self.topic_id.clone())
            .with_attr("topic_id", self.topic_id.clone())
            .with_attr("text", self.text.clone())
            .with_attr("updated_at", self.updated_at.clone());
        if self.embedding.is_empty() {
            node
        } else {
            node.with_embedding(self.embedding.clone())
        }
    }

    pub fn from_node(node: &Node) -> Result<Self, RosemaryError> {
        Ok(Self {
            topic_id: node.key.clone(),
            text: required_str(node, "text")?,
            embedding: node.embedding.clone().unwrap_or_default(),
            updated_at: required_str(node, "updated_at")?,
        })
    }
}

/// An atomic stored memory fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detail {
    pub id: String,
    pub text: String,
    #[serde(skip)]
    pub embedding: Vec<f32>,
    /// Where the fact came from (`"agent"`, `"cli"`, ...).
    pub source: Option<String>,
    pub created_at: String,
}

impl Detail {
    pub fn node_ref(id: &str) -> NodeRef {
        NodeRef::new(NodeLabel::Detail, id)
    }

    pub fn to_node(&self) -> Node {
        let source = self
            .source
            .clone()
            .map(Value::String)
            .unwrap_or(Value::Null);
        Node::new(NodeLabel::Detail, self.id.clone())
            .with_attr("id", self.id.clone())
            .with_attr("text", self.text.clone())
            .with_attr("source", source)
            .with_attr("created_at", self.created_at.clone())
            .with_embedding(self.embedding.clone())
    }

    pub fn from_node(node: &Node) -> Result<Self, RosemaryError> {
        Ok(Self {
            id: node.key.clone(),
            text: required_str(node, "text")?,
            embedding: node.embedding.clone().unwrap_or_default(),
            source: node.attr_str("source").map(str::to_string),
            created_at: required_str(node, "created_at")?,
        })
    }
}

/// What an Insight is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "key", rename_all = "snake_case")]
pub enum InsightScope {
    Topic(String),
    Domain(String),
}

impl InsightScope {
    pub fn node_ref(&self) -> NodeRef {
        match self {
            InsightScope::Topic(id) => Topic::node_ref(id),
            InsightScope::Domain(code) => Domain::node_ref(code),
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        let (kind, key) = raw.split_once(':')?;
        match kind {
            "Topic" => Some(InsightScope::Topic(key.to_string())),
            "Domain" => Some(InsightScope::Domain(key.to_string())),
            _ => None,
        }
    }
}

/// A derived, append-only annotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Insight {
    pub id: String,
    pub scope: InsightScope,
    pub text: String,
    pub generated_at: String,
}

impl Insight {
    pub fn to_node(&self) -> Node {
        Node::new(NodeLabel::Insight, self.id.clone())
            .with_attr("id", self.id.clone())
            .with_attr("scope_ref", self.scope.node_ref().to_string())
            .with_attr("text", self.text.clone())
            .with_attr("generated_at", self.generated_at.clone())
    }

    pub fn from_node(node: &Node) -> Result<Self, RosemaryError> {
        let scope_ref = required_str(node, "scope_ref")?;
        let scope = InsightScope::parse(&scope_ref).ok_or_else(|| {
            RosemaryError::Internal(format!(
                "Insight node `{}` has malformed scope `{scope_ref}`",
                node.key
            ))
        })?;
        Ok(Self {
            id: node.key.clone(),
            scope,
            text: required_str(node, "text")?,
            generated_at: required_str(node, "generated_at")?,
        })
    }
}

/// A Detail that passed the retrieval threshold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchedDetail {
    pub id: String,
    pub text: String,
    pub score: f32,
    pub created_at: String,
}

/// Retrieval results for one Topic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopicMemory {
    pub domain: Domain,
    pub topic_id: String,
    pub topic_label: String,
    pub summary: Option<String>,
    /// Similarity of the query to the Summary, when the Summary itself matched.
    pub summary_score: Option<f32>,
    pub insights: Vec<String>,
    /// Best score first. Empty when only the Summary matched.
    pub matched_details: Vec<MatchedDetail>,
}

impl TopicMemory {
    /// The higher of the best Detail score and the Summary score.
    pub fn best_score(&self) -> f32 {
        let detail = self
            .matched_details
            .first()
            .map(|d| d.score)
            .unwrap_or(f32::MIN);
        detail.max(self.summary_score.unwrap_or(f32::MIN))
    }
}

/// Everything retrieval found for one query, grouped by Topic.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MemoryBundle {
    /// Topics ordered by their best score, Detail or Summary.
    pub groups: Vec<TopicMemory>,
    /// True when the query could not be embedded and the bundle is empty
    /// because retrieval was skipped, not because nothing matched.
    pub degraded: bool,
}

impl MemoryBundle {
    pub fn degraded() -> Self {
        Self {
            groups: Vec::new(),
            degraded: true,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Ids of every matched Detail, without duplicates, in rank order.
    pub fn detail_ids(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        self.groups
            .iter()
            .flat_map(|g| g.matched_details.iter())
            .filter(|d| seen.insert(d.id.clone()))
            .map(|d| d.id.clone())
            .collect()
    }
}

/// Outcome of one `store` call.
#[derive(Debug, Clone)]
pub struct StoreReport {
    pub detail: Detail,
    pub domain_code: String,
    /// Primary Topic first, then the secondary Topic if any.
    pub topic_ids: Vec<String>,
    /// Topics created by this store.
    pub created_topics: Vec<String>,
    /// Topics whose Summary could not be regenerated, with the cause.
    pub summary_failures: Vec<(String, String)>,
}

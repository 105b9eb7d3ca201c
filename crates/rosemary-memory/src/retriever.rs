// SPDX-FileCopyrightText: 2026 Rosemary Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! MemoryRetriever: similarity search over Details and Summaries, grouped by Topic.
//!
//! Scores are cosine similarities on the [-1.0, 1.0] scale. Details above
//! the `min_score` floor are ranked by score, then newest first, and each
//! is resolved to its Topic's Domain, Summary and Insights. A Topic whose
//! Summary clears the floor surfaces even when none of its Details do.
//! Topics are ordered by the higher of their best Detail and Summary score.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rosemary_config::model::MemoryConfig;
use rosemary_core::types::{Direction, EdgeType, NodeLabel};
use rosemary_core::{EmbeddingAdapter, GraphStore, RosemaryError};
use tracing::{debug, warn};

use crate::calls::{embed_one, preview};
use crate::types::{
    Detail, Domain, Insight, MatchedDetail, MemoryBundle, Summary, Topic, TopicMemory,
};

/// Per-call overrides for [`MemoryRetriever::retrieve_with`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RetrieveOptions {
    /// Similarity floor; defaults to `memory.retrieval_min_score`.
    pub min_score: Option<f32>,
    /// Cap on matched Details; defaults to `memory.max_results`.
    pub max_results: Option<usize>,
}

impl RetrieveOptions {
    pub fn min_score(score: f32) -> Self {
        Self {
            min_score: Some(score),
            max_results: None,
        }
    }
}

/// Read path into the memory graph.
pub struct MemoryRetriever {
    store: Arc<dyn GraphStore>,
    embedder: Arc<dyn EmbeddingAdapter>,
    config: MemoryConfig,
}

impl MemoryRetriever {
    pub fn new(
        store: Arc<dyn GraphStore>,
        embedder: Arc<dyn EmbeddingAdapter>,
        config: MemoryConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            config,
        }
    }

    /// Retrieves memory for `query` with the configured threshold.
    pub async fn retrieve(&self, query: &str) -> Result<MemoryBundle, RosemaryError> {
        self.retrieve_with(query, RetrieveOptions::default()).await
    }

    /// Retrieves memory for `query` with per-call overrides.
    ///
    /// An empty result is a normal outcome. When the query cannot be embedded
    /// and `memory.degrade_on_provider_error` is set, returns an empty bundle
    /// with `degraded = true` instead of failing.
    pub async fn retrieve_with(
        &self,
        query: &str,
        options: RetrieveOptions,
    ) -> Result<MemoryBundle, RosemaryError> {
        if query.trim().is_empty() {
            return Err(RosemaryError::validation("retrieve", "query is empty"));
        }
        let min_score = options
            .min_score
            .unwrap_or(self.config.retrieval_min_score as f32);
        if !(-1.0..=1.0).contains(&min_score) {
            return Err(RosemaryError::validation(
                "retrieve",
                format!("min_score {min_score} is outside [-1, 1]"),
            ));
        }
        let max_results = options.max_results.unwrap_or(self.config.max_results);

        let deadline = Duration::from_secs(self.config.provider_timeout_secs);
        let q_embedding =
            match embed_one(self.embedder.as_ref(), query, "retrieve", deadline).await {
                Ok(v) => v,
                Err(e) if e.is_provider_failure() && self.config.degrade_on_provider_error => {
                    warn!(error = %e, query = %preview(query), "retrieval degraded: query not embedded");
                    crate::metrics::record_retrieval(true, 0);
                    return Ok(MemoryBundle::degraded());
                }
                Err(e) => return Err(e),
            };

        let mut matches: Vec<(Detail, f32)> = self
            .store
            .query_nodes_by_similarity(NodeLabel::Detail, &q_embedding, min_score)
            .await?
            .into_iter()
            .map(|(node, score)| Detail::from_node(&node).map(|d| (d, score)))
            .collect::<Result<_, _>>()?;
        matches.sort_by(|(a, sa), (b, sb)| {
            sb.total_cmp(sa)
                .then_with(|| b.created_at.cmp(&a.created_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        matches.truncate(max_results);

        let summary_hits: Vec<(String, f32)> = self
            .store
            .query_nodes_by_similarity(NodeLabel::Summary, &q_embedding, min_score)
            .await?
            .into_iter()
            .map(|(node, score)| (node.key, score))
            .collect();

        let bundle = self.group_by_topic(matches, summary_hits).await?;
        let matched = bundle.detail_ids().len();
        let summary_count = bundle
            .groups
            .iter()
            .filter(|g| g.summary_score.is_some())
            .count();
        crate::metrics::record_retrieval(false, matched);
        debug!(
            query = %preview(query),
            min_score,
            matched,
            topics = bundle.groups.len(),
            summaries = summary_count,
            "retrieval complete"
        );
        Ok(bundle)
    }

    /// Groups ranked Details under every Topic they belong to, then merges
    /// in Summary matches keyed by Topic id.
    async fn group_by_topic(
        &self,
        matches: Vec<(Detail, f32)>,
        summary_hits: Vec<(String, f32)>,
    ) -> Result<MemoryBundle, RosemaryError> {
        let mut groups: Vec<TopicMemory> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for (detail, score) in matches {
            let topics = self
                .store
                .neighbors(&Detail::node_ref(&detail.id), EdgeType::InTopic, Direction::Outgoing)
                .await?;
            for node in topics {
                let topic = Topic::from_node(&node)?;
                let slot = match index.get(&topic.id) {
                    Some(&slot) => slot,
                    None => {
                        groups.push(self.resolve_topic(&topic).await?);
                        index.insert(topic.id.clone(), groups.len() - 1);
                        groups.len() - 1
                    }
                };
                groups[slot].matched_details.push(MatchedDetail {
                    id: detail.id.clone(),
                    text: detail.text.clone(),
                    score,
                    created_at: detail.created_at.clone(),
                });
            }
        }

        for (topic_id, score) in summary_hits {
            let slot = match index.get(&topic_id) {
                Some(&slot) => slot,
                None => {
                    let Some(node) = self.store.get_node(NodeLabel::Topic, &topic_id).await? else {
                        warn!(topic_id = %topic_id, "summary without topic, skipping");
                        continue;
                    };
                    groups.push(self.resolve_topic(&Topic::from_node(&node)?).await?);
                    index.insert(topic_id.clone(), groups.len() - 1);
                    groups.len() - 1
                }
            };
            groups[slot].summary_score = Some(score);
        }

        // Details arrive in rank order, so each group's first entry is its best.
        groups.sort_by(|a, b| {
            b.best_score()
                .total_cmp(&a.best_score())
                .then_with(|| a.topic_id.cmp(&b.topic_id))
        });
        Ok(MemoryBundle {
            groups,
            degraded: false,
        })
    }

    async fn resolve_topic(&self, topic: &Topic) -> Result<TopicMemory, RosemaryError> {
        let topic_ref = Topic::node_ref(&topic.id);

        let domain = match self
            .store
            .neighbors(&topic_ref, EdgeType::InDomain, Direction::Outgoing)
            .await?
            .first()
        {
            Some(node) => Domain::from_node(node)?,
            None => Domain {
                code: topic.domain_code.clone(),
                label: topic.domain_code.clone(),
            },
        };

        let summary = self
            .store
            .get_node(NodeLabel::Summary, &topic.id)
            .await?
            .map(|node| Summary::from_node(&node))
            .transpose()?
            .map(|s| s.text);

        let mut insights = self
            .store
            .neighbors(&topic_ref, EdgeType::About, Direction::Incoming)
            .await?
            .iter()
            .map(Insight::from_node)
            .collect::<Result<Vec<_>, _>>()?;
        insights.sort_by(|a, b| a.generated_at.cmp(&b.generated_at));

        Ok(TopicMemory {
            domain,
            topic_id: topic.id.clone(),
            topic_label: topic.label.clone(),
            summary,
            summary_score: None,
            insights: insights.into_iter().map(|i| i.text).collect(),
            matched_details: Vec::new(),
        })
    }
}

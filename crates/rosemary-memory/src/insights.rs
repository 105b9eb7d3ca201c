// SPDX-FileCopyrightText: 2026 Rosemary Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! InsightGenerator: derives short reusable insights from Topic contents.
//!
//! Topics are visited least-recently-analyzed first, and every visited
//! Topic is stamped with `last_analyzed_at` whether or not its provider
//! call succeeded, so repeated runs always move forward.

use std::sync::Arc;
use std::time::Duration;

use rosemary_config::model::InsightsConfig;
use rosemary_core::types::{
    CompletionPurpose, CompletionRequest, Direction, Edge, EdgeType, NodeFilter, NodeLabel,
    WriteBatch,
};
use rosemary_core::{CompletionAdapter, GraphStore, RosemaryError};
use tracing::{debug, info, warn};

use crate::calls::complete_text;
use crate::locks::DomainLocks;
use crate::types::{Detail, Insight, InsightScope, Summary, Topic, now_timestamp};

const INSIGHT_SYSTEM: &str = "You are an insight organizer for a personal memory store.";

/// Detail texts included in one insight prompt.
const MAX_PROMPT_DETAILS: usize = 20;

/// Generates and persists Topic-scoped Insights.
pub struct InsightGenerator {
    store: Arc<dyn GraphStore>,
    completion: Arc<dyn CompletionAdapter>,
    config: InsightsConfig,
    deadline: Duration,
    locks: DomainLocks,
}

impl InsightGenerator {
    pub fn new(
        store: Arc<dyn GraphStore>,
        completion: Arc<dyn CompletionAdapter>,
        config: InsightsConfig,
        deadline: Duration,
    ) -> Self {
        Self {
            store,
            completion,
            config,
            deadline,
            locks: DomainLocks::new(),
        }
    }

    /// Shares the writer's lock table so Topic stamps never race centroid updates.
    pub fn with_locks(mut self, locks: DomainLocks) -> Self {
        self.locks = locks;
        self
    }

    /// Analyzes up to `limit` Topics and returns the Insights created.
    ///
    /// A provider failure on one Topic is logged and skipped. Store errors
    /// abort the run.
    pub async fn generate(&self, limit: usize) -> Result<Vec<Insight>, RosemaryError> {
        let mut topics = self
            .store
            .scan_nodes(NodeLabel::Topic, &NodeFilter::all())
            .await?
            .iter()
            .map(Topic::from_node)
            .collect::<Result<Vec<_>, _>>()?;
        // Never-analyzed first, then oldest analysis.
        topics.sort_by(|a, b| {
            a.last_analyzed_at
                .is_some()
                .cmp(&b.last_analyzed_at.is_some())
                .then_with(|| a.last_analyzed_at.cmp(&b.last_analyzed_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        topics.truncate(limit);

        let mut created = Vec::new();
        let (mut failed, visited) = (0usize, topics.len());
        for topic in topics {
            let texts = match self.request_insights(&topic).await {
                Ok(texts) => texts,
                Err(e) if e.is_provider_failure() => {
                    warn!(topic_id = %topic.id, error = %e, "insight generation failed, skipping topic");
                    failed += 1;
                    Vec::new()
                }
                Err(e) => return Err(e),
            };
            created.extend(self.persist(&topic, texts).await?);
        }

        crate::metrics::record_insights(created.len());
        info!(
            topics = visited,
            failed,
            insights = created.len(),
            "insight generation complete"
        );
        Ok(created)
    }

    async fn request_insights(&self, topic: &Topic) -> Result<Vec<String>, RosemaryError> {
        let topic_ref = Topic::node_ref(&topic.id);
        let summary = self
            .store
            .get_node(NodeLabel::Summary, &topic.id)
            .await?
            .map(|n| Summary::from_node(&n))
            .transpose()?;
        let mut details = self
            .store
            .neighbors(&topic_ref, EdgeType::InTopic, Direction::Incoming)
            .await?
            .iter()
            .map(Detail::from_node)
            .collect::<Result<Vec<_>, _>>()?;
        details.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        details.truncate(MAX_PROMPT_DETAILS);
        let existing = self
            .store
            .neighbors(&topic_ref, EdgeType::About, Direction::Incoming)
            .await?
            .iter()
            .map(Insight::from_node)
            .collect::<Result<Vec<_>, _>>()?;

        let prompt = build_prompt(
            topic,
            summary.as_ref().map(|s| s.text.as_str()),
            &details,
            &existing,
            self.config.max_per_topic,
        );
        let request = CompletionRequest::new(CompletionPurpose::Insight, prompt)
            .with_system(INSIGHT_SYSTEM)
            .with_max_tokens(128);
        let reply = complete_text(self.completion.as_ref(), request, self.deadline).await?;

        let existing_texts: Vec<String> = existing.iter().map(|i| i.text.to_lowercase()).collect();
        Ok(parse_insights(&reply, self.config.max_per_topic)
            .into_iter()
            .filter(|t| !existing_texts.contains(&t.to_lowercase()))
            .collect())
    }

    /// Writes new Insights and stamps the Topic in one batch.
    async fn persist(&self, topic: &Topic, texts: Vec<String>) -> Result<Vec<Insight>, RosemaryError> {
        let _guard = self.locks.lock(&topic.domain_code).await;

        // Re-read under the lock so a concurrent store's centroid update survives.
        let mut current = match self.store.get_node(NodeLabel::Topic, &topic.id).await? {
            Some(node) => Topic::from_node(&node)?,
            None => topic.clone(),
        };
        let now = now_timestamp();
        current.last_analyzed_at = Some(now.clone());

        let insights: Vec<Insight> = texts
            .into_iter()
            .map(|text| Insight {
                id: uuid::Uuid::new_v4().to_string(),
                scope: InsightScope::Topic(topic.id.clone()),
                text,
                generated_at: now.clone(),
            })
            .collect();

        let mut batch = WriteBatch::new();
        batch.upsert(current.to_node());
        for insight in &insights {
            batch.create(insight.to_node()).link(Edge::new(
                insight.to_node().node_ref(),
                insight.scope.node_ref(),
                EdgeType::About,
            ));
        }
        self.store.apply(batch).await?;
        debug!(topic_id = %topic.id, insights = insights.len(), "topic analyzed");
        Ok(insights)
    }
}

fn build_prompt(
    topic: &Topic,
    summary: Option<&str>,
    details: &[Detail],
    existing: &[Insight],
    max: usize,
) -> String {
    let mut lines = vec![
        format!("Goal: write 1-{max} concise insights about the topic below."),
        "Insights must be short (4-12 words) and reusable.".to_string(),
        "Do not repeat an existing insight. Write one insight per line with no numbering."
            .to_string(),
        String::new(),
        format!("Topic: {}", topic.label),
        format!("Summary: {}", summary.unwrap_or("none")),
        "Details:".to_string(),
    ];
    lines.extend(details.iter().map(|d| format!("- {}", d.text.trim())));
    let existing = existing
        .iter()
        .map(|i| i.text.as_str())
        .collect::<Vec<_>>()
        .join("; ");
    lines.push(format!(
        "Existing insights: {}",
        if existing.is_empty() { "none" } else { existing.as_str() }
    ));
    lines.join("\n")
}

/// Splits a reply into insight lines, stripping bullets and numbering.
pub fn parse_insights(reply: &str, max: usize) -> Vec<String> {
    reply
        .lines()
        .map(|line| strip_list_marker(line).to_string())
        .filter(|line| !line.is_empty())
        .take(max)
        .collect()
}

/// Removes one leading bullet (`-`, `*`, `•`) or list number (`1.`, `2)`).
///
/// Digits that are part of the insight itself ("3 museum visits") stay.
fn strip_list_marker(line: &str) -> &str {
    let line = line.trim();
    if let Some(rest) = line.strip_prefix(['-', '*', '•']) {
        return rest.trim_start();
    }
    let digits = line.len() - line.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits > 0
        && let Some(rest) = line[digits..].strip_prefix(['.', ')'])
        && !rest.starts_with(|c: char| c.is_ascii_digit())
    {
        return rest.trim_start();
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_strips_bullets_and_numbers() {
        let reply = "1. Prefers boutique hotels in Paris\n\n- Plans trips around museums\n* extra";
        assert_eq!(
            parse_insights(reply, 5),
            vec![
                "Prefers boutique hotels in Paris",
                "Plans trips around museums",
                "extra"
            ]
        );
    }

    #[test]
    fn parse_keeps_numbers_that_belong_to_the_insight() {
        let reply = "3 museum visits per Paris trip\n2024 budget is tight\n\
                     2) Books hotels early\n3.5 hours in the Louvre is enough";
        assert_eq!(
            parse_insights(reply, 5),
            vec![
                "3 museum visits per Paris trip",
                "2024 budget is tight",
                "Books hotels early",
                "3.5 hours in the Louvre is enough"
            ]
        );
    }

    #[test]
    fn parse_caps_at_max() {
        assert_eq!(parse_insights("a\nb\nc", 2), vec!["a", "b"]);
        assert!(parse_insights("  \n", 2).is_empty());
    }

    #[test]
    fn prompt_lists_context() {
        let topic = Topic {
            id: "t1".into(),
            domain_code: "A".into(),
            label: "Paris travel".into(),
            created_at: now_timestamp(),
            detail_count: 1,
            last_analyzed_at: None,
            centroid: vec![1.0],
        };
        let detail = Detail {
            id: "d1".into(),
            text: "Booked a hotel in Le Marais".into(),
            embedding: vec![1.0],
            source: None,
            created_at: now_timestamp(),
        };
        let prompt = build_prompt(&topic, None, &[detail], &[], 2);
        assert!(prompt.contains("1-2 concise insights"));
        assert!(prompt.contains("Topic: Paris travel"));
        assert!(prompt.contains("Summary: none"));
        assert!(prompt.contains("- Booked a hotel in Le Marais"));
        assert!(prompt.contains("Existing insights: none"));
    }
}

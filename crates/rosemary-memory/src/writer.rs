// SPDX-FileCopyrightText: 2026 Rosemary Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! MemoryWriter: places new Details into the Domain/Topic graph.
//!
//! A store runs in three phases:
//!
//! 1. Provider calls with no store access: embed the text (fatal on
//!    failure) and classify its Domain (falls back to the default Domain).
//! 2. Under the Domain lock: read the Domain's Topics, pick or found a
//!    Topic, and write the Detail, Topic updates and edges as one batch.
//! 3. Regenerate the Summary of every Topic the Detail joined. Failures here
//!    are reported in the [`StoreReport`] and never undo phase 2.

use std::sync::Arc;
use std::time::Duration;

use rosemary_config::model::{DomainsConfig, MemoryConfig};
use rosemary_core::types::{
    CompletionPurpose, CompletionRequest, Direction, Edge, EdgeType, NodeFilter, NodeLabel,
    WriteBatch,
};
use rosemary_core::{CompletionAdapter, EmbeddingAdapter, GraphStore, RosemaryError};
use tracing::{debug, info, warn};

use crate::calls::{complete_text, embed_one, preview};
use crate::cluster::{DomainClassifier, Placement, assign_topics, generate_label, topic_id};
use crate::locks::DomainLocks;
use crate::types::{Detail, Domain, StoreReport, Summary, Topic, now_timestamp};

const SUMMARY_SYSTEM: &str = "You maintain short digests of a person's memories. \
Summarize the details below in one or two plain sentences. Mention only facts present in the details.";

/// Persists Details and keeps Topic summaries current.
pub struct MemoryWriter {
    store: Arc<dyn GraphStore>,
    embedder: Arc<dyn EmbeddingAdapter>,
    completion: Arc<dyn CompletionAdapter>,
    classifier: DomainClassifier,
    config: MemoryConfig,
    locks: DomainLocks,
}

impl MemoryWriter {
    pub fn new(
        store: Arc<dyn GraphStore>,
        embedder: Arc<dyn EmbeddingAdapter>,
        completion: Arc<dyn CompletionAdapter>,
        config: MemoryConfig,
        domains: DomainsConfig,
    ) -> Self {
        let deadline = Duration::from_secs(config.provider_timeout_secs);
        Self {
            classifier: DomainClassifier::new(completion.clone(), domains, deadline),
            store,
            embedder,
            completion,
            config,
            locks: DomainLocks::new(),
        }
    }

    /// Shares an existing lock table instead of a private one.
    pub fn with_locks(mut self, locks: DomainLocks) -> Self {
        self.locks = locks;
        self
    }

    /// The lock table guarding Topic updates.
    pub fn locks(&self) -> DomainLocks {
        self.locks.clone()
    }

    fn deadline(&self) -> Duration {
        Duration::from_secs(self.config.provider_timeout_secs)
    }

    /// Stores `text` as a new Detail and returns it.
    pub async fn store(&self, text: &str) -> Result<Detail, RosemaryError> {
        Ok(self.store_with_source(text, None).await?.detail)
    }

    /// Stores `text` tagged with where it came from.
    pub async fn store_with_source(
        &self,
        text: &str,
        source: Option<&str>,
    ) -> Result<StoreReport, RosemaryError> {
        if text.trim().is_empty() {
            return Err(RosemaryError::validation("store", "detail text is empty"));
        }

        let embedding = embed_one(self.embedder.as_ref(), text, "store", self.deadline())
            .await
            .inspect_err(|e| warn!(error = %e, text = %preview(text), "store aborted: embedding failed"))?;
        let domain = self.classifier.classify_or_default(text).await?;

        let detail = Detail {
            id: uuid::Uuid::new_v4().to_string(),
            text: text.to_string(),
            embedding,
            source: source.map(str::to_string),
            created_at: now_timestamp(),
        };

        let (topic_ids, created_topics) = {
            let _guard = self.locks.lock(&domain.code).await;
            self.link_detail(&detail, &domain).await?
        };

        crate::metrics::record_detail_stored(&domain.code);
        for _ in &created_topics {
            crate::metrics::record_topic_created(&domain.code);
        }
        info!(
            detail_id = %detail.id,
            domain = %domain.code,
            topics = ?topic_ids,
            created = created_topics.len(),
            "detail stored"
        );

        let mut summary_failures = Vec::new();
        for id in &topic_ids {
            if let Err(e) = self.regenerate_summary(id).await {
                warn!(topic_id = %id, detail_id = %detail.id, error = %e, "summary regeneration failed");
                crate::metrics::record_summary_failure();
                summary_failures.push((id.clone(), e.to_string()));
            }
        }

        Ok(StoreReport {
            detail,
            domain_code: domain.code,
            topic_ids,
            created_topics,
            summary_failures,
        })
    }

    /// Chooses Topics for `detail` and writes it with all its edges in one batch.
    ///
    /// Must be called with the Domain lock held. Returns the linked Topic ids
    /// (primary first) and the ids of Topics created here.
    async fn link_detail(
        &self,
        detail: &Detail,
        domain: &Domain,
    ) -> Result<(Vec<String>, Vec<String>), RosemaryError> {
        let topics = self
            .store
            .scan_nodes(
                NodeLabel::Topic,
                &NodeFilter::all().eq("domain_code", domain.code.clone()),
            )
            .await?
            .iter()
            .map(Topic::from_node)
            .collect::<Result<Vec<_>, _>>()?;

        let assignment = assign_topics(
            &detail.embedding,
            &topics,
            self.config.topic_threshold as f32,
        );
        let find = |id: &str| topics.iter().find(|t| t.id == id).cloned();

        // (topic, newly created)
        let mut targets: Vec<(Topic, bool)> = Vec::with_capacity(2);
        match assignment.primary {
            Placement::Existing(scored) => {
                debug!(topic_id = %scored.topic_id, score = scored.score, "joining existing topic");
                if let Some(topic) = find(&scored.topic_id) {
                    targets.push((topic, false));
                }
            }
            Placement::New => {
                let label =
                    generate_label(self.completion.as_ref(), domain, &detail.text, self.deadline())
                        .await;
                let id = topic_id(&domain.code, &label);
                match find(&id) {
                    // Same label as an existing Topic: join it rather than fork it.
                    Some(existing) => targets.push((existing, false)),
                    None => targets.push((
                        Topic {
                            id,
                            domain_code: domain.code.clone(),
                            label,
                            created_at: now_timestamp(),
                            detail_count: 0,
                            last_analyzed_at: None,
                            centroid: Vec::new(),
                        },
                        true,
                    )),
                }
            }
        }
        if let Some(secondary) = assignment.secondary
            && targets.iter().all(|(t, _)| t.id != secondary.topic_id)
            && let Some(topic) = find(&secondary.topic_id)
        {
            debug!(topic_id = %topic.id, score = secondary.score, "also linking secondary topic");
            targets.push((topic, false));
        }

        if targets.is_empty() {
            return Err(RosemaryError::Internal(format!(
                "store: no topic resolved for detail `{}`",
                detail.id
            )));
        }

        let mut batch = WriteBatch::new();
        batch.create(domain.to_node());
        for (topic, created) in &mut targets {
            topic.absorb(&detail.embedding)?;
            if *created {
                batch.create(topic.to_node());
            } else {
                batch.upsert(topic.to_node());
            }
        }
        batch.upsert(detail.to_node());
        for (topic, created) in &targets {
            if *created {
                batch.link(Edge::new(
                    Topic::node_ref(&topic.id),
                    Domain::node_ref(&domain.code),
                    EdgeType::InDomain,
                ));
            }
            batch.link(Edge::new(
                Detail::node_ref(&detail.id),
                Topic::node_ref(&topic.id),
                EdgeType::InTopic,
            ));
        }
        self.store.apply(batch).await?;

        let topic_ids = targets.iter().map(|(t, _)| t.id.clone()).collect();
        let created = targets
            .iter()
            .filter(|(_, created)| *created)
            .map(|(t, _)| t.id.clone())
            .collect();
        Ok((topic_ids, created))
    }

    /// Rebuilds a Topic's Summary from its current Details.
    ///
    /// The text is regenerated from scratch, never appended to. At most
    /// `memory.summary_max_details` of the newest Details are used. The new
    /// text is embedded so retrieval can match the Summary directly.
    pub async fn regenerate_summary(&self, topic_id: &str) -> Result<Summary, RosemaryError> {
        let node = self
            .store
            .get_node(NodeLabel::Topic, topic_id)
            .await?
            .ok_or_else(|| {
                RosemaryError::validation("summarize", format!("unknown topic `{topic_id}`"))
            })?;
        let topic = Topic::from_node(&node)?;

        let mut details = self
            .store
            .neighbors(&Topic::node_ref(topic_id), EdgeType::InTopic, Direction::Incoming)
            .await?
            .iter()
            .map(Detail::from_node)
            .collect::<Result<Vec<_>, _>>()?;
        if details.is_empty() {
            return Err(RosemaryError::validation(
                "summarize",
                format!("topic `{topic_id}` has no details"),
            ));
        }
        details.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        details.truncate(self.config.summary_max_details);
        details.reverse();

        let listing = details
            .iter()
            .map(|d| format!("- {}", d.text.trim()))
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = format!("Topic: {}\nDetails:\n{listing}", topic.label);
        let request = CompletionRequest::new(CompletionPurpose::Summarize, prompt)
            .with_system(SUMMARY_SYSTEM);

        let text = complete_text(self.completion.as_ref(), request, self.deadline()).await?;
        if text.is_empty() {
            return Err(RosemaryError::provider(format!(
                "summarize: empty summary for topic `{topic_id}`"
            )));
        }

        let embedding = embed_one(self.embedder.as_ref(), &text, "summarize", self.deadline()).await?;

        let summary = Summary {
            topic_id: topic_id.to_string(),
            text,
            embedding,
            updated_at: now_timestamp(),
        };
        let mut batch = WriteBatch::new();
        batch.upsert(summary.to_node()).link(Edge::new(
            Topic::node_ref(topic_id),
            summary.to_node().node_ref(),
            EdgeType::HasSummary,
        ));
        self.store.apply(batch).await?;
        debug!(topic_id, details = details.len(), "summary regenerated");
        Ok(summary)
    }
}

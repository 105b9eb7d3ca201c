// SPDX-FileCopyrightText: 2026 Rosemary Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness wiring the whole memory engine to mock providers.
//!
//! `TestHarness` owns an in-memory SQLite graph store plus a writer,
//! retriever, insight generator and exporter sharing one lock table.

use std::sync::Arc;
use std::time::Duration;

use rosemary_config::model::{DomainsConfig, InsightsConfig, MemoryConfig};
use rosemary_core::types::{Direction, EdgeType, NodeFilter, NodeLabel};
use rosemary_core::{CompletionAdapter, EmbeddingAdapter, GraphStore, RosemaryError};
use rosemary_memory::{
    Detail, GraphExporter, GroundedAgent, InsightGenerator, MemoryRetriever, MemoryWriter, Topic,
};
use rosemary_storage::SqliteGraphStore;

use crate::mock_completion::MockCompletion;
use crate::mock_embedder::HashEmbedder;

/// Dimensionality used by the default [`HashEmbedder`].
pub const TEST_DIMENSIONS: usize = 384;

/// Builder for [`TestHarness`].
pub struct TestHarnessBuilder {
    memory: MemoryConfig,
    domains: DomainsConfig,
    insights: InsightsConfig,
    embedder: Option<Arc<dyn EmbeddingAdapter>>,
    completion: Arc<MockCompletion>,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            memory: MemoryConfig::default(),
            domains: DomainsConfig::default(),
            insights: InsightsConfig::default(),
            embedder: None,
            completion: Arc::new(MockCompletion::new()),
        }
    }

    pub fn with_memory_config(mut self, memory: MemoryConfig) -> Self {
        self.memory = memory;
        self
    }

    pub fn with_domains(mut self, domains: DomainsConfig) -> Self {
        self.domains = domains;
        self
    }

    pub fn with_insights_config(mut self, insights: InsightsConfig) -> Self {
        self.insights = insights;
        self
    }

    /// Replaces the default [`HashEmbedder`].
    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingAdapter>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn with_completion(mut self, completion: MockCompletion) -> Self {
        self.completion = Arc::new(completion);
        self
    }

    pub async fn build(self) -> Result<TestHarness, RosemaryError> {
        let sqlite = Arc::new(SqliteGraphStore::open_in_memory().await?);
        let embedder = self
            .embedder
            .unwrap_or_else(|| Arc::new(HashEmbedder::new(TEST_DIMENSIONS)));
        sqlite.ensure_graph(embedder.dimensions()).await?;

        let store: Arc<dyn GraphStore> = sqlite.clone();
        let completion: Arc<dyn CompletionAdapter> = self.completion.clone();
        let deadline = Duration::from_secs(self.memory.provider_timeout_secs);

        let writer = Arc::new(MemoryWriter::new(
            store.clone(),
            embedder.clone(),
            completion.clone(),
            self.memory.clone(),
            self.domains,
        ));
        let retriever = Arc::new(MemoryRetriever::new(
            store.clone(),
            embedder.clone(),
            self.memory,
        ));
        let insights = InsightGenerator::new(store.clone(), completion, self.insights, deadline)
            .with_locks(writer.locks());
        let exporter = GraphExporter::new(store.clone());

        Ok(TestHarness {
            completion: self.completion,
            sqlite,
            store,
            writer,
            retriever,
            insights,
            exporter,
            deadline,
        })
    }
}

/// A memory engine over an in-memory store with scripted providers.
pub struct TestHarness {
    pub completion: Arc<MockCompletion>,
    /// Concrete store, for storage-level assertions.
    pub sqlite: Arc<SqliteGraphStore>,
    pub store: Arc<dyn GraphStore>,
    pub writer: Arc<MemoryWriter>,
    pub retriever: Arc<MemoryRetriever>,
    pub insights: InsightGenerator,
    pub exporter: GraphExporter,
    deadline: Duration,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Harness with all defaults.
    pub async fn new() -> Result<Self, RosemaryError> {
        Self::builder().build().await
    }

    /// A grounded agent over this harness's writer and retriever.
    pub fn agent(&self, top_k: usize) -> GroundedAgent {
        GroundedAgent::new(
            self.retriever.clone(),
            self.writer.clone(),
            self.completion.clone(),
            top_k,
            self.deadline,
        )
    }

    /// Stores every text in order and returns the Details.
    pub async fn store_all(&self, texts: &[&str]) -> Result<Vec<Detail>, RosemaryError> {
        let mut details = Vec::with_capacity(texts.len());
        for text in texts {
            details.push(self.writer.store(text).await?);
        }
        Ok(details)
    }

    pub async fn count(&self, label: NodeLabel) -> Result<usize, RosemaryError> {
        Ok(self.store.scan_nodes(label, &NodeFilter::all()).await?.len())
    }

    pub async fn topics(&self) -> Result<Vec<Topic>, RosemaryError> {
        self.store
            .scan_nodes(NodeLabel::Topic, &NodeFilter::all())
            .await?
            .iter()
            .map(Topic::from_node)
            .collect()
    }

    /// Ids of the Topics a Detail is filed under.
    pub async fn topics_of(&self, detail_id: &str) -> Result<Vec<String>, RosemaryError> {
        Ok(self
            .store
            .neighbors(&Detail::node_ref(detail_id), EdgeType::InTopic, Direction::Outgoing)
            .await?
            .into_iter()
            .map(|n| n.key)
            .collect())
    }

    /// Codes of the Domains a Topic is filed under.
    pub async fn domains_of(&self, topic_id: &str) -> Result<Vec<String>, RosemaryError> {
        Ok(self
            .store
            .neighbors(&Topic::node_ref(topic_id), EdgeType::InDomain, Direction::Outgoing)
            .await?
            .into_iter()
            .map(|n| n.key)
            .collect())
    }

    /// Checks the graph invariants: every Detail has at least one Topic,
    /// every Topic exactly one Domain and at most one Summary.
    pub async fn check_invariants(&self) -> Result<(), String> {
        let err = |e: RosemaryError| e.to_string();
        for node in self
            .store
            .scan_nodes(NodeLabel::Detail, &NodeFilter::all())
            .await
            .map_err(err)?
        {
            if self.topics_of(&node.key).await.map_err(err)?.is_empty() {
                return Err(format!("detail {} has no topic", node.key));
            }
        }
        for topic in self.topics().await.map_err(err)? {
            let domains = self.domains_of(&topic.id).await.map_err(err)?;
            if domains.len() != 1 {
                return Err(format!("topic {} has {} domains", topic.id, domains.len()));
            }
            let summaries = self
                .store
                .neighbors(&Topic::node_ref(&topic.id), EdgeType::HasSummary, Direction::Outgoing)
                .await
                .map_err(err)?;
            if summaries.len() > 1 {
                return Err(format!("topic {} has {} summaries", topic.id, summaries.len()));
            }
        }
        Ok(())
    }
}

// SPDX-FileCopyrightText: 2026 Rosemary Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wires configuration, providers and the graph store into one engine.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use rosemary_config::model::{EmbeddingConfig, RosemaryConfig};
use rosemary_core::{CompletionAdapter, EmbeddingAdapter, GraphStore, PluginAdapter, RosemaryError};
use rosemary_memory::{
    GraphExporter, GroundedAgent, InsightGenerator, MemoryRetriever, MemoryWriter, ModelManager,
    OnnxEmbedder, RemoteEmbedder,
};
use rosemary_openai::OpenAiProvider;
use rosemary_storage::SqliteGraphStore;
use tracing::{debug, info};

/// Everything a command needs, built from one loaded configuration.
pub struct Engine {
    pub config: RosemaryConfig,
    pub store: Arc<SqliteGraphStore>,
    pub embedder: Arc<dyn EmbeddingAdapter>,
    pub completion: Arc<dyn CompletionAdapter>,
    pub writer: Arc<MemoryWriter>,
    pub retriever: Arc<MemoryRetriever>,
}

impl Engine {
    /// Opens the store, builds both providers and pins the vector size.
    pub async fn open(config: RosemaryConfig) -> Result<Self, RosemaryError> {
        let embedder = build_embedder(&config.embedding, config.memory.provider_timeout_secs).await?;
        let completion: Arc<dyn CompletionAdapter> =
            Arc::new(OpenAiProvider::new(&config.completion)?);

        let store = Arc::new(SqliteGraphStore::open(&config.storage).await?);
        store.ensure_graph(embedder.dimensions()).await?;
        rosemary_memory::metrics::register_metrics();

        let graph: Arc<dyn GraphStore> = store.clone();
        let writer = Arc::new(MemoryWriter::new(
            graph.clone(),
            embedder.clone(),
            completion.clone(),
            config.memory.clone(),
            config.domains.clone(),
        ));
        let retriever = Arc::new(MemoryRetriever::new(
            graph,
            embedder.clone(),
            config.memory.clone(),
        ));

        info!(
            database = %config.storage.database_path,
            dimensions = embedder.dimensions(),
            embedder = embedder.name(),
            "memory engine ready"
        );
        Ok(Self {
            config,
            store,
            embedder,
            completion,
            writer,
            retriever,
        })
    }

    fn deadline(&self) -> Duration {
        Duration::from_secs(self.config.memory.provider_timeout_secs)
    }

    pub fn insights(&self) -> InsightGenerator {
        InsightGenerator::new(
            self.store.clone(),
            self.completion.clone(),
            self.config.insights.clone(),
            self.deadline(),
        )
        .with_locks(self.writer.locks())
    }

    pub fn exporter(&self) -> GraphExporter {
        GraphExporter::new(self.store.clone())
    }

    /// A grounded agent; `top_k` overrides `agent.top_k`.
    pub fn agent(&self, top_k: Option<usize>) -> GroundedAgent {
        GroundedAgent::new(
            self.retriever.clone(),
            self.writer.clone(),
            self.completion.clone(),
            top_k.unwrap_or(self.config.agent.top_k),
            self.deadline(),
        )
        .with_max_tokens(self.config.completion.max_tokens)
    }

    /// Releases provider and store resources.
    pub async fn shutdown(&self) -> Result<(), RosemaryError> {
        self.completion.shutdown().await?;
        self.embedder.shutdown().await?;
        self.store.shutdown().await?;
        debug!("engine shut down");
        Ok(())
    }
}

/// Picks the embedding backend: the remote service when `service_url` is
/// set, otherwise the local ONNX model (downloaded on first use).
pub async fn build_embedder(
    config: &EmbeddingConfig,
    timeout_secs: u64,
) -> Result<Arc<dyn EmbeddingAdapter>, RosemaryError> {
    if let Some(url) = &config.service_url {
        info!(url = %url, "using remote embedding service");
        let embedder =
            RemoteEmbedder::new(url, config.dimensions, Duration::from_secs(timeout_secs))?;
        return Ok(Arc::new(embedder));
    }
    Ok(Arc::new(local_embedder(config).await?))
}

/// Loads the local ONNX embedder, downloading the model if missing.
pub async fn local_embedder(config: &EmbeddingConfig) -> Result<OnnxEmbedder, RosemaryError> {
    let manager = ModelManager::from_config(config);
    let model_path: PathBuf = manager.ensure_model().await?;
    OnnxEmbedder::new(&model_path, config.dimensions)
}

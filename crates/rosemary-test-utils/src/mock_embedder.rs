// SPDX-FileCopyrightText: 2026 Rosemary Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deterministic embedding adapters for tests.
//!
//! [`HashEmbedder`] is a feature-hashed bag of words: texts sharing more
//! content words are more similar, which is enough to drive topic
//! clustering and retrieval without a model.

use std::time::Duration;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use rosemary_core::types::{AdapterType, EmbeddingInput, EmbeddingOutput, HealthStatus};
use rosemary_core::vector::l2_normalize;
use rosemary_core::{EmbeddingAdapter, PluginAdapter, RosemaryError};

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "from", "has", "have", "i",
    "in", "is", "it", "its", "me", "my", "of", "on", "or", "our", "so", "that", "the", "this",
    "to", "was", "we", "were", "with", "you", "your",
];

/// Lowercased content words of `text`.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .filter(|w| !STOP_WORDS.contains(&w.as_str()))
        .collect()
}

/// Feature-hashed bag-of-words embedder.
///
/// Each content word adds 1.0 to the bucket chosen by the first eight bytes
/// of its SHA-256 digest; the vector is then L2-normalized. Texts without
/// content words embed to the zero vector.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimensions: usize,
}

impl HashEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        if self.dimensions == 0 {
            return vector;
        }
        for token in tokenize(text) {
            let digest = Sha256::digest(token.as_bytes());
            let mut head = [0u8; 8];
            head.copy_from_slice(&digest[..8]);
            let bucket = (u64::from_le_bytes(head) % self.dimensions as u64) as usize;
            vector[bucket] += 1.0;
        }
        l2_normalize(&mut vector);
        vector
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(384)
    }
}

#[async_trait]
impl PluginAdapter for HashEmbedder {
    fn name(&self) -> &str {
        "hash-embedder"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Embedding
    }

    async fn health_check(&self) -> Result<HealthStatus, RosemaryError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), RosemaryError> {
        Ok(())
    }
}

#[async_trait]
impl EmbeddingAdapter for HashEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, input: EmbeddingInput) -> Result<EmbeddingOutput, RosemaryError> {
        Ok(EmbeddingOutput {
            embeddings: input.texts.iter().map(|t| self.embed_text(t)).collect(),
            dimensions: self.dimensions,
        })
    }
}

/// Embedder whose every call fails with a provider error.
#[derive(Debug, Clone)]
pub struct FailingEmbedder {
    dimensions: usize,
}

impl FailingEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

#[async_trait]
impl PluginAdapter for FailingEmbedder {
    fn name(&self) -> &str {
        "failing-embedder"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Embedding
    }

    async fn health_check(&self) -> Result<HealthStatus, RosemaryError> {
        Ok(HealthStatus::Unhealthy("always fails".to_string()))
    }

    async fn shutdown(&self) -> Result<(), RosemaryError> {
        Ok(())
    }
}

#[async_trait]
impl EmbeddingAdapter for FailingEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, input: EmbeddingInput) -> Result<EmbeddingOutput, RosemaryError> {
        tracing::debug!(texts = input.texts.len(), "failing embedder rejecting request");
        Err(RosemaryError::provider("embedding service unavailable"))
    }
}

/// Wraps [`HashEmbedder`] and sleeps before answering.
#[derive(Debug, Clone)]
pub struct SlowEmbedder {
    inner: HashEmbedder,
    delay: Duration,
}

impl SlowEmbedder {
    pub fn new(dimensions: usize, delay: Duration) -> Self {
        Self {
            inner: HashEmbedder::new(dimensions),
            delay,
        }
    }
}

#[async_trait]
impl PluginAdapter for SlowEmbedder {
    fn name(&self) -> &str {
        "slow-embedder"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Embedding
    }

    async fn health_check(&self) -> Result<HealthStatus, RosemaryError> {
        Ok(HealthStatus::Degraded(format!("responds after {:?}", self.delay)))
    }

    async fn shutdown(&self) -> Result<(), RosemaryError> {
        Ok(())
    }
}

#[async_trait]
impl EmbeddingAdapter for SlowEmbedder {
    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    async fn embed(&self, input: EmbeddingInput) -> Result<EmbeddingOutput, RosemaryError> {
        tokio::time::sleep(self.delay).await;
        self.inner.embed(input).await
    }
}

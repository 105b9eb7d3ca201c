// SPDX-FileCopyrightText: 2026 Rosemary Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding adapter trait for vector encoding of text.

use async_trait::async_trait;

use crate::error::RosemaryError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{EmbeddingInput, EmbeddingOutput};

/// Adapter for generating vector embeddings from text.
///
/// Encoding must be deterministic and every vector an adapter returns has
/// the same dimensionality for the lifetime of the adapter.
#[async_trait]
pub trait EmbeddingAdapter: PluginAdapter {
    /// Returns the fixed dimensionality of produced vectors.
    fn dimensions(&self) -> usize;

    /// Generates embeddings for the given input.
    async fn embed(&self, input: EmbeddingInput) -> Result<EmbeddingOutput, RosemaryError>;
}

// SPDX-FileCopyrightText: 2026 Rosemary Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Local sentence embeddings with ONNX Runtime.
//!
//! Runs a sentence-transformers model (all-MiniLM-L6-v2 by default) on CPU:
//! tokenize, run the encoder, mean-pool the token states under the attention
//! mask, then L2-normalize.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use ndarray::Array2;
use ort::session::Session;
use ort::session::builder::GraphOptimizationLevel;
use ort::value::TensorRef;

use rosemary_core::types::{AdapterType, EmbeddingInput, EmbeddingOutput, HealthStatus};
use rosemary_core::vector::l2_normalize;
use rosemary_core::{EmbeddingAdapter, PluginAdapter, RosemaryError};

/// Token ids, attention mask and segment ids for one text, each shaped `[1, seq_len]`.
struct EncodedText {
    input_ids: Array2<i64>,
    attention_mask: Array2<i64>,
    token_type_ids: Array2<i64>,
}

fn model_error(context: &str, e: impl std::fmt::Display) -> RosemaryError {
    RosemaryError::Provider {
        message: format!("onnx embedder: {context}: {e}"),
        source: None,
    }
}

/// ONNX embedding adapter.
pub struct OnnxEmbedder {
    session: Mutex<Session>,
    tokenizer: tokenizers::Tokenizer,
    dimensions: usize,
}

// Safety: the session is only reached through the Mutex; tokenizer encoding is read-only.
unsafe impl Send for OnnxEmbedder {}
unsafe impl Sync for OnnxEmbedder {}

impl OnnxEmbedder {
    /// Loads `model_path` and the `tokenizer.json` next to it.
    ///
    /// `dimensions` is the width the model is expected to produce; an output
    /// of any other width is rejected at inference time.
    pub fn new(model_path: &Path, dimensions: usize) -> Result<Self, RosemaryError> {
        let tokenizer_path = model_path
            .parent()
            .ok_or_else(|| RosemaryError::Config(format!("invalid model path {}", model_path.display())))?
            .join("tokenizer.json");
        let tokenizer = tokenizers::Tokenizer::from_file(&tokenizer_path).map_err(|e| {
            RosemaryError::Config(format!("cannot load tokenizer {}: {e}", tokenizer_path.display()))
        })?;

        let session = Session::builder()
            .map_err(|e| model_error("session builder", e))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| model_error("optimization level", e))?
            .with_intra_threads(1)
            .map_err(|e| model_error("thread count", e))?
            .commit_from_file(model_path)
            .map_err(|e| {
                RosemaryError::Config(format!("cannot load ONNX model {}: {e}", model_path.display()))
            })?;

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            dimensions,
        })
    }

    fn encode(&self, text: &str) -> Result<EncodedText, RosemaryError> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| model_error("tokenization failed", e))?;
        let seq_len = encoding.get_ids().len();
        let widen = |values: &[u32]| -> Result<Array2<i64>, RosemaryError> {
            Array2::from_shape_vec((1, seq_len), values.iter().map(|&v| i64::from(v)).collect())
                .map_err(|e| model_error("tensor shape", e))
        };
        Ok(EncodedText {
            input_ids: widen(encoding.get_ids())?,
            attention_mask: widen(encoding.get_attention_mask())?,
            token_type_ids: widen(encoding.get_type_ids())?,
        })
    }

    /// Embeds one text into a unit-length vector.
    pub fn embed_text(&self, text: &str) -> Result<Vec<f32>, RosemaryError> {
        let encoded = self.encode(text)?;
        let mask: Vec<i64> = encoded.attention_mask.iter().copied().collect();

        let mut session = self
            .session
            .lock()
            .map_err(|e| model_error("session lock poisoned", e))?;
        let input_ids = TensorRef::from_array_view(&encoded.input_ids)
            .map_err(|e| model_error("input_ids tensor", e))?;
        let attention_mask = TensorRef::from_array_view(&encoded.attention_mask)
            .map_err(|e| model_error("attention_mask tensor", e))?;
        let token_type_ids = TensorRef::from_array_view(&encoded.token_type_ids)
            .map_err(|e| model_error("token_type_ids tensor", e))?;
        let outputs = session
            .run(ort::inputs![
                "input_ids" => input_ids,
                "attention_mask" => attention_mask,
                "token_type_ids" => token_type_ids
            ])
            .map_err(|e| model_error("inference failed", e))?;

        // [1, seq_len, hidden]
        let (shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| model_error("output tensor", e))?;
        let hidden = shape.last().copied().unwrap_or(0) as usize;
        if hidden != self.dimensions {
            return Err(RosemaryError::Config(format!(
                "embedding model produces {hidden} dimensions, configured {}",
                self.dimensions
            )));
        }

        let mut pooled = mean_pool(data, &mask, hidden);
        l2_normalize(&mut pooled);
        Ok(pooled)
    }
}

/// Averages the token vectors whose attention mask is set.
fn mean_pool(token_states: &[f32], mask: &[i64], hidden: usize) -> Vec<f32> {
    let mut sum = vec![0.0f32; hidden];
    let mut kept = 0usize;
    for (token, _) in token_states
        .chunks_exact(hidden)
        .zip(mask)
        .filter(|(_, m)| **m > 0)
    {
        for (acc, v) in sum.iter_mut().zip(token) {
            *acc += v;
        }
        kept += 1;
    }
    if kept > 0 {
        let n = kept as f32;
        sum.iter_mut().for_each(|v| *v /= n);
    }
    sum
}

#[async_trait]
impl PluginAdapter for OnnxEmbedder {
    fn name(&self) -> &str {
        "onnx-embedder"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Embedding
    }

    async fn health_check(&self) -> Result<HealthStatus, RosemaryError> {
        match self.session.lock() {
            Ok(_) => Ok(HealthStatus::Healthy),
            Err(e) => Ok(HealthStatus::Unhealthy(format!("session lock poisoned: {e}"))),
        }
    }

    async fn shutdown(&self) -> Result<(), RosemaryError> {
        Ok(())
    }
}

#[async_trait]
impl EmbeddingAdapter for OnnxEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, input: EmbeddingInput) -> Result<EmbeddingOutput, RosemaryError> {
        let embeddings = input
            .texts
            .iter()
            .map(|text| self.embed_text(text))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(EmbeddingOutput {
            embeddings,
            dimensions: self.dimensions,
        })
    }
}

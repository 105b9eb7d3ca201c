// SPDX-FileCopyrightText: 2026 Rosemary Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Completion adapter trait for LLM text generation.

use async_trait::async_trait;

use crate::error::RosemaryError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{CompletionRequest, CompletionResponse};

/// Adapter for single-shot text completion.
///
/// Used for domain classification, topic naming, summary regeneration,
/// insight extraction, and grounded agent replies. Output is not assumed
/// to be stable across calls.
#[async_trait]
pub trait CompletionAdapter: PluginAdapter {
    /// Sends a completion request and returns the full response.
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, RosemaryError>;
}

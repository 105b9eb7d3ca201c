// SPDX-FileCopyrightText: 2026 Rosemary Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One grounded question/answer turn on top of the memory engine.

use std::sync::Arc;
use std::time::Duration;

use rosemary_core::types::{CompletionPurpose, CompletionRequest};
use rosemary_core::{CompletionAdapter, RosemaryError};
use tracing::{debug, warn};

use crate::calls::complete_text;
use crate::provider::ground_prompt;
use crate::retriever::MemoryRetriever;
use crate::types::MemoryBundle;
use crate::writer::MemoryWriter;

const AGENT_SYSTEM: &str = "You are a helpful assistant with long-term memory. \
Use the relevant memory when it applies and answer briefly.";

/// Source tag for Details recorded from agent turns.
pub const TURN_SOURCE: &str = "cli";

/// Result of one [`GroundedAgent::turn`].
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub reply: String,
    /// Memory used to ground the prompt, truncated to `top_k` Topics.
    pub context: MemoryBundle,
    /// Id of the Detail recording this turn, if it was stored.
    pub stored_detail: Option<String>,
}

/// Answers prompts grounded in retrieved memory and records each turn.
pub struct GroundedAgent {
    retriever: Arc<MemoryRetriever>,
    writer: Arc<MemoryWriter>,
    completion: Arc<dyn CompletionAdapter>,
    top_k: usize,
    max_tokens: u32,
    deadline: Duration,
    update_memory: bool,
}

impl GroundedAgent {
    pub fn new(
        retriever: Arc<MemoryRetriever>,
        writer: Arc<MemoryWriter>,
        completion: Arc<dyn CompletionAdapter>,
        top_k: usize,
        deadline: Duration,
    ) -> Self {
        Self {
            retriever,
            writer,
            completion,
            top_k,
            max_tokens: 512,
            deadline,
            update_memory: true,
        }
    }

    /// Disables recording turns as new Details.
    pub fn without_memory_updates(mut self) -> Self {
        self.update_memory = false;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Retrieves memory for `prompt`, asks the completion provider, and
    /// stores the exchange.
    ///
    /// Retrieval and completion failures are returned. A failure to store
    /// the exchange afterwards is logged and leaves `stored_detail` empty.
    pub async fn turn(&self, prompt: &str) -> Result<TurnOutcome, RosemaryError> {
        if prompt.trim().is_empty() {
            return Err(RosemaryError::validation("turn", "prompt is empty"));
        }

        let mut context = self.retriever.retrieve(prompt).await?;
        context.groups.truncate(self.top_k);
        debug!(groups = context.groups.len(), degraded = context.degraded, "turn context retrieved");

        let request = CompletionRequest::new(CompletionPurpose::Chat, ground_prompt(prompt, &context))
            .with_system(AGENT_SYSTEM)
            .with_max_tokens(self.max_tokens);
        let reply = complete_text(self.completion.as_ref(), request, self.deadline).await?;

        let mut stored_detail = None;
        if self.update_memory {
            let exchange = format!("User: {prompt}\nAgent: {reply}");
            match self.writer.store_with_source(&exchange, Some(TURN_SOURCE)).await {
                Ok(report) => stored_detail = Some(report.detail.id),
                Err(e) => warn!(error = %e, "turn reply delivered but not stored"),
            }
        }

        Ok(TurnOutcome {
            reply,
            context,
            stored_detail,
        })
    }
}

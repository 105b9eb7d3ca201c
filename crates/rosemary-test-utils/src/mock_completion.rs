// SPDX-FileCopyrightText: 2026 Rosemary Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted completion provider for deterministic tests.
//!
//! Replies are chosen per [`CompletionPurpose`], in this order:
//! injected failure, queued response (FIFO), first matching rule, then a
//! built-in default derived from the prompt. Every request is recorded.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use rosemary_core::types::{
    AdapterType, CompletionPurpose, CompletionRequest, CompletionResponse, HealthStatus,
    TokenUsage,
};
use rosemary_core::{CompletionAdapter, PluginAdapter, RosemaryError};

#[derive(Default)]
struct Script {
    queued: HashMap<CompletionPurpose, VecDeque<String>>,
    rules: Vec<(CompletionPurpose, String, String)>,
    failing: HashSet<CompletionPurpose>,
    failing_rules: Vec<(CompletionPurpose, String)>,
    delays: HashMap<CompletionPurpose, Duration>,
    domain: Option<String>,
    log: Vec<CompletionRequest>,
}

/// A completion provider that answers from a script.
///
/// Defaults when nothing is scripted:
/// - `ClassifyDomain`: the configured domain, else the first vocabulary entry
/// - `LabelTopic`: first three words of the prompt's last line
/// - `Summarize`: `"Summary of N details"`
/// - `Insight`: `"Insight about <topic label>"`
/// - `Chat`: `"mock reply"`
#[derive(Default)]
pub struct MockCompletion {
    script: Mutex<Script>,
}

impl MockCompletion {
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Classifies every detail into `code` unless a rule or queue says otherwise.
    pub fn with_domain(self, code: &str) -> Self {
        self.script().domain = Some(code.to_string());
        self
    }

    /// Queues a one-shot reply for `purpose`.
    pub fn push_response(&self, purpose: CompletionPurpose, text: &str) {
        self.script()
            .queued
            .entry(purpose)
            .or_default()
            .push_back(text.to_string());
    }

    /// Replies `reply` to every `purpose` request whose prompt contains `needle`.
    pub fn add_rule(&self, purpose: CompletionPurpose, needle: &str, reply: &str) {
        self.script()
            .rules
            .push((purpose, needle.to_string(), reply.to_string()));
    }

    /// Makes every `purpose` request fail with a provider error.
    pub fn fail(&self, purpose: CompletionPurpose) {
        self.script().failing.insert(purpose);
    }

    /// Makes `purpose` requests whose prompt contains `needle` fail.
    pub fn fail_when(&self, purpose: CompletionPurpose, needle: &str) {
        self.script()
            .failing_rules
            .push((purpose, needle.to_string()));
    }

    /// Lets `purpose` requests succeed again.
    pub fn recover(&self, purpose: CompletionPurpose) {
        let mut script = self.script();
        script.failing.remove(&purpose);
        script.failing_rules.retain(|(p, _)| *p != purpose);
    }

    /// Sleeps before answering `purpose` requests.
    pub fn delay(&self, purpose: CompletionPurpose, delay: Duration) {
        self.script().delays.insert(purpose, delay);
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.script().log.clone()
    }

    /// Requests received for one purpose.
    pub fn requests_for(&self, purpose: CompletionPurpose) -> Vec<CompletionRequest> {
        self.script()
            .log
            .iter()
            .filter(|r| r.purpose == purpose)
            .cloned()
            .collect()
    }

    fn reply(&self, request: &CompletionRequest) -> Result<String, RosemaryError> {
        let mut script = self.script();
        script.log.push(request.clone());

        let fails = script.failing.contains(&request.purpose)
            || script.failing_rules.iter().any(|(purpose, needle)| {
                *purpose == request.purpose && request.prompt.contains(needle.as_str())
            });
        if fails {
            tracing::debug!(purpose = %request.purpose, "mock completion failing request");
            return Err(RosemaryError::provider(format!(
                "mock {} failure",
                request.purpose
            )));
        }
        if let Some(text) = script
            .queued
            .get_mut(&request.purpose)
            .and_then(VecDeque::pop_front)
        {
            return Ok(text);
        }
        if let Some((_, _, reply)) = script
            .rules
            .iter()
            .find(|(purpose, needle, _)| *purpose == request.purpose && request.prompt.contains(needle.as_str()))
        {
            return Ok(reply.clone());
        }
        Ok(default_reply(request, script.domain.as_deref()))
    }
}

fn default_reply(request: &CompletionRequest, domain: Option<&str>) -> String {
    match request.purpose {
        CompletionPurpose::ClassifyDomain => domain
            .map(str::to_string)
            .or_else(|| {
                request
                    .constrained_vocabulary
                    .as_ref()
                    .and_then(|v| v.first().cloned())
            })
            .unwrap_or_else(|| "S".to_string()),
        CompletionPurpose::LabelTopic => {
            let last = request.prompt.lines().last().unwrap_or_default();
            let words: Vec<&str> = last.split_whitespace().take(3).collect();
            words.join(" ")
        }
        CompletionPurpose::Summarize => {
            let count = request
                .prompt
                .lines()
                .filter(|l| l.starts_with("- "))
                .count();
            format!("Summary of {count} details")
        }
        CompletionPurpose::Insight => {
            let topic = request
                .prompt
                .lines()
                .find_map(|l| l.strip_prefix("Topic: "))
                .unwrap_or("memory");
            format!("Insight about {topic}")
        }
        CompletionPurpose::Chat => "mock reply".to_string(),
    }
}

#[async_trait]
impl PluginAdapter for MockCompletion {
    fn name(&self) -> &str {
        "mock-completion"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Completion
    }

    async fn health_check(&self) -> Result<HealthStatus, RosemaryError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), RosemaryError> {
        Ok(())
    }
}

#[async_trait]
impl CompletionAdapter for MockCompletion {
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, RosemaryError> {
        let delay = self.script().delays.get(&request.purpose).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let text = self.reply(&request)?;
        Ok(CompletionResponse {
            text,
            model: "mock-model".to_string(),
            usage: Some(TokenUsage {
                input_tokens: 10,
                output_tokens: 5,
            }),
        })
    }
}

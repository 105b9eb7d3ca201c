// SPDX-FileCopyrightText: 2026 Rosemary Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! OpenAI-compatible completion provider for the Rosemary memory engine.
//!
//! Implements [`CompletionAdapter`] over the Chat Completions API. Works
//! with any server speaking the same protocol through `completion.base_url`.

pub mod client;
pub mod types;

use std::time::Duration;

use async_trait::async_trait;
use rosemary_config::model::CompletionConfig;
use rosemary_core::types::{
    AdapterType, CompletionRequest, CompletionResponse, HealthStatus, TokenUsage,
};
use rosemary_core::{CompletionAdapter, PluginAdapter, RosemaryError};
use tracing::{debug, info};

use crate::client::OpenAiClient;
use crate::types::{ChatMessage, ChatRequest};

/// Completion provider backed by an OpenAI-compatible endpoint.
///
/// API key resolution order: `completion.api_key` -> `OPENAI_API_KEY` -> error.
pub struct OpenAiProvider {
    client: OpenAiClient,
    model: String,
    max_tokens: u32,
}

impl OpenAiProvider {
    pub fn new(config: &CompletionConfig) -> Result<Self, RosemaryError> {
        let api_key = resolve_api_key(&config.api_key)?;
        let client = OpenAiClient::new(
            &api_key,
            config.base_url.as_deref(),
            Duration::from_secs(config.timeout_secs),
        )?;
        info!(model = %config.model, endpoint = client.endpoint(), "completion provider initialized");
        Ok(Self::with_client(client, config))
    }

    fn with_client(client: OpenAiClient, config: &CompletionConfig) -> Self {
        Self {
            client,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        }
    }

    fn to_chat_request(&self, request: &CompletionRequest) -> ChatRequest {
        let mut system = request.system.clone().unwrap_or_default();
        let mut temperature = None;
        if let Some(vocabulary) = &request.constrained_vocabulary {
            if !system.is_empty() {
                system.push_str("\n\n");
            }
            system.push_str(&format!(
                "Answer with exactly one of: {}. Reply with that value only.",
                vocabulary.join(", ")
            ));
            temperature = Some(0.0);
        }

        let mut messages = Vec::with_capacity(2);
        if !system.is_empty() {
            messages.push(ChatMessage::system(system));
        }
        messages.push(ChatMessage::user(request.prompt.clone()));

        ChatRequest {
            model: self.model.clone(),
            messages,
            max_tokens: request.max_tokens.min(self.max_tokens),
            temperature,
        }
    }
}

#[async_trait]
impl PluginAdapter for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Completion
    }

    async fn health_check(&self) -> Result<HealthStatus, RosemaryError> {
        // No request is made: a test call would spend tokens.
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), RosemaryError> {
        debug!("completion provider shutting down");
        Ok(())
    }
}

#[async_trait]
impl CompletionAdapter for OpenAiProvider {
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, RosemaryError> {
        let chat = self.to_chat_request(&request);
        let response = self.client.complete_chat(&chat).await?;
        debug!(purpose = %request.purpose, id = %response.id, "completion received");

        let text = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                RosemaryError::provider(format!("{} completion returned no content", request.purpose))
            })?;

        Ok(CompletionResponse {
            text,
            model: response.model,
            usage: response.usage.map(|u| TokenUsage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            }),
        })
    }
}

fn resolve_api_key(config_key: &Option<String>) -> Result<String, RosemaryError> {
    if let Some(key) = config_key
        && !key.is_empty()
    {
        return Ok(key.clone());
    }

    std::env::var("OPENAI_API_KEY").map_err(|_| {
        RosemaryError::Config(
            "OpenAI API key not found. Set completion.api_key in config or the OPENAI_API_KEY environment variable.".into(),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rosemary_core::types::CompletionPurpose;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(base_url: &str) -> OpenAiProvider {
        let config = CompletionConfig {
            api_key: Some("sk-test".into()),
            base_url: Some(base_url.to_string()),
            max_tokens: 256,
            ..CompletionConfig::default()
        };
        OpenAiProvider::new(&config).unwrap()
    }

    #[test]
    fn config_key_wins_over_env() {
        assert_eq!(resolve_api_key(&Some("sk-config".into())).unwrap(), "sk-config");
    }

    #[test]
    fn missing_key_names_both_sources() {
        if let Err(e) = resolve_api_key(&None) {
            let msg = e.to_string();
            assert!(msg.contains("completion.api_key") && msg.contains("OPENAI_API_KEY"), "got: {msg}");
        }
    }

    #[test]
    fn vocabulary_is_injected_into_system_prompt() {
        let p = provider("http://localhost:1");
        let req = CompletionRequest::new(CompletionPurpose::ClassifyDomain, "Detail: I paint")
            .with_system("Classify the detail.")
            .with_vocabulary(vec!["R".into(), "A".into()])
            .with_max_tokens(8);
        let chat = p.to_chat_request(&req);

        assert_eq!(chat.messages.len(), 2);
        assert_eq!(chat.messages[0].role, "system");
        assert!(chat.messages[0].content.starts_with("Classify the detail.\n\n"));
        assert!(chat.messages[0].content.contains("exactly one of: R, A."));
        assert_eq!(chat.messages[1].content, "Detail: I paint");
        assert_eq!(chat.temperature, Some(0.0));
        assert_eq!(chat.max_tokens, 8);
    }

    #[test]
    fn unconstrained_request_has_no_system_message() {
        let p = provider("http://localhost:1");
        let chat = p.to_chat_request(&CompletionRequest::new(CompletionPurpose::Chat, "hi"));
        assert_eq!(chat.messages.len(), 1);
        assert!(chat.temperature.is_none());
        // capped by completion.max_tokens
        assert_eq!(chat.max_tokens, 256);
    }

    #[tokio::test]
    async fn complete_maps_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(serde_json::json!({"model": "gpt-4o-mini"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "chatcmpl-9",
                "model": "gpt-4o-mini-2024-07-18",
                "choices": [{"message": {"role": "assistant", "content": "A"}, "finish_reason": "stop"}],
                "usage": {"prompt_tokens": 12, "completion_tokens": 1}
            })))
            .mount(&server)
            .await;

        let resp = provider(&server.uri())
            .complete(CompletionRequest::new(CompletionPurpose::ClassifyDomain, "Detail: I paint"))
            .await
            .unwrap();
        assert_eq!(resp.text, "A");
        assert_eq!(resp.model, "gpt-4o-mini-2024-07-18");
        assert_eq!(resp.usage.unwrap().output_tokens, 1);
    }

    #[tokio::test]
    async fn empty_choices_is_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "model": "gpt-4o-mini", "choices": []
            })))
            .mount(&server)
            .await;

        let err = provider(&server.uri())
            .complete(CompletionRequest::new(CompletionPurpose::Summarize, "x"))
            .await
            .unwrap_err();
        assert!(err.is_provider_failure());
        assert!(err.to_string().contains("summarize completion returned no content"), "got: {err}");
    }
}

// SPDX-FileCopyrightText: 2026 Rosemary Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for a running embedding service, plus the wire types the
//! service speaks.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use rosemary_core::types::{AdapterType, EmbeddingInput, EmbeddingOutput, HealthStatus};
use rosemary_core::{EmbeddingAdapter, PluginAdapter, RosemaryError};

/// `POST /embed` request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbedRequest {
    pub texts: Vec<String>,
}

/// `POST /embed` response body. One vector per requested text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbedResponse {
    pub vectors: Vec<Vec<f32>>,
}

/// `GET /health` response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

/// Embedding adapter backed by the embedding service.
#[derive(Debug, Clone)]
pub struct RemoteEmbedder {
    client: reqwest::Client,
    base_url: String,
    dimensions: usize,
}

impl RemoteEmbedder {
    pub fn new(base_url: &str, dimensions: usize, timeout: Duration) -> Result<Self, RosemaryError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RosemaryError::Provider {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            dimensions,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

fn http_error(context: &str, e: reqwest::Error) -> RosemaryError {
    RosemaryError::Provider {
        message: format!("embedding service {context}: {e}"),
        source: Some(Box::new(e)),
    }
}

#[async_trait]
impl PluginAdapter for RemoteEmbedder {
    fn name(&self) -> &str {
        "remote-embedder"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Embedding
    }

    async fn health_check(&self) -> Result<HealthStatus, RosemaryError> {
        let url = format!("{}/health", self.base_url);
        match self.client.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => Ok(HealthStatus::Healthy),
            Ok(resp) => Ok(HealthStatus::Unhealthy(format!(
                "{url} returned {}",
                resp.status()
            ))),
            Err(e) => Ok(HealthStatus::Unhealthy(format!("{url} unreachable: {e}"))),
        }
    }

    async fn shutdown(&self) -> Result<(), RosemaryError> {
        Ok(())
    }
}

#[async_trait]
impl EmbeddingAdapter for RemoteEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, input: EmbeddingInput) -> Result<EmbeddingOutput, RosemaryError> {
        let requested = input.texts.len();
        let response = self
            .client
            .post(format!("{}/embed", self.base_url))
            .json(&EmbedRequest { texts: input.texts })
            .send()
            .await
            .map_err(|e| http_error("request failed", e))?;

        let status = response.status();
        debug!(status = %status, texts = requested, "embedding service responded");
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RosemaryError::provider(format!(
                "embedding service returned {status}: {body}"
            )));
        }

        let body: EmbedResponse = response
            .json()
            .await
            .map_err(|e| http_error("returned an unreadable body", e))?;
        if body.vectors.len() != requested {
            return Err(RosemaryError::provider(format!(
                "embedding service returned {} vectors for {requested} texts",
                body.vectors.len()
            )));
        }
        Ok(EmbeddingOutput {
            embeddings: body.vectors,
            dimensions: self.dimensions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn embedder(uri: &str) -> RemoteEmbedder {
        RemoteEmbedder::new(&format!("{uri}/"), 3, Duration::from_secs(5)).unwrap()
    }

    fn input(texts: &[&str]) -> EmbeddingInput {
        EmbeddingInput {
            texts: texts.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn embed_posts_texts_and_reads_vectors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embed"))
            .and(body_json(serde_json::json!({"texts": ["a", "b"]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "vectors": [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let out = embedder(&server.uri()).embed(input(&["a", "b"])).await.unwrap();
        assert_eq!(out.embeddings.len(), 2);
        assert_eq!(out.embeddings[1], vec![0.0, 1.0, 0.0]);
        assert_eq!(out.dimensions, 3);
    }

    #[tokio::test]
    async fn server_error_is_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embed"))
            .respond_with(ResponseTemplate::new(500).set_body_string("model not loaded"))
            .mount(&server)
            .await;

        let err = embedder(&server.uri()).embed(input(&["a"])).await.unwrap_err();
        assert!(err.is_provider_failure());
        assert!(err.to_string().contains("model not loaded"), "got: {err}");
    }

    #[tokio::test]
    async fn vector_count_mismatch_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embed"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"vectors": []})),
            )
            .mount(&server)
            .await;

        let err = embedder(&server.uri()).embed(input(&["a"])).await.unwrap_err();
        assert!(err.to_string().contains("0 vectors for 1 texts"), "got: {err}");
    }

    #[tokio::test]
    async fn health_reflects_service_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"status": "ok"})),
            )
            .mount(&server)
            .await;

        let healthy = embedder(&server.uri()).health_check().await.unwrap();
        assert_eq!(healthy, HealthStatus::Healthy);

        let down = RemoteEmbedder::new("http://127.0.0.1:9", 3, Duration::from_millis(200))
            .unwrap()
            .health_check()
            .await
            .unwrap();
        assert!(matches!(down, HealthStatus::Unhealthy(_)));
    }
}

// SPDX-FileCopyrightText: 2026 Rosemary Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Rosemary memory engine.
//!
//! All structs use `#[serde(deny_unknown_fields)]` so a misspelled key is
//! reported at startup instead of silently falling back to a default.

use serde::{Deserialize, Serialize};

/// Top-level Rosemary configuration.
///
/// Every section is optional and defaults to the values documented on its
/// fields.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RosemaryConfig {
    /// Agent loop and logging settings.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Memory engine thresholds and limits.
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Fixed Domain vocabulary and fallback.
    #[serde(default)]
    pub domains: DomainsConfig,

    /// Embedding provider settings.
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Completion provider settings.
    #[serde(default)]
    pub completion: CompletionConfig,

    /// Graph store settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Insight generation settings.
    #[serde(default)]
    pub insights: InsightsConfig,

    /// Standalone embedding service settings.
    #[serde(default)]
    pub embed_server: EmbedServerConfig,
}

/// Agent loop configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Number of Topic groups injected into a prompt as grounding context.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            top_k: default_top_k(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_top_k() -> usize {
    5
}

/// Memory engine configuration.
///
/// All similarity values are cosine similarities on the [-1.0, 1.0] scale.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MemoryConfig {
    /// Minimum similarity between a detail and a Topic centroid for the
    /// detail to join that Topic instead of founding a new one.
    #[serde(default = "default_topic_threshold")]
    pub topic_threshold: f64,

    /// Default minimum similarity for a Detail to be returned by retrieval.
    #[serde(default = "default_retrieval_min_score")]
    pub retrieval_min_score: f64,

    /// Maximum number of Details a single retrieval returns.
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Deadline applied to every embedding and completion call.
    #[serde(default = "default_provider_timeout_secs")]
    pub provider_timeout_secs: u64,

    /// When true, a retrieval whose query cannot be embedded returns an empty
    /// bundle marked degraded instead of an error.
    #[serde(default)]
    pub degrade_on_provider_error: bool,

    /// Maximum number of Detail texts fed into one summary regeneration.
    #[serde(default = "default_summary_max_details")]
    pub summary_max_details: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            topic_threshold: default_topic_threshold(),
            retrieval_min_score: default_retrieval_min_score(),
            max_results: default_max_results(),
            provider_timeout_secs: default_provider_timeout_secs(),
            degrade_on_provider_error: false,
            summary_max_details: default_summary_max_details(),
        }
    }
}

fn default_topic_threshold() -> f64 {
    0.55
}

fn default_retrieval_min_score() -> f64 {
    0.35
}

fn default_max_results() -> usize {
    50
}

fn default_provider_timeout_secs() -> u64 {
    30
}

fn default_summary_max_details() -> usize {
    50
}

/// One entry of the fixed Domain vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DomainEntry {
    /// Unique short code, e.g. `"A"`.
    pub code: String,
    /// Human-readable label, e.g. `"Artistic"`.
    pub label: String,
}

impl DomainEntry {
    fn new(code: &str, label: &str) -> Self {
        Self {
            code: code.to_string(),
            label: label.to_string(),
        }
    }
}

/// Domain vocabulary configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DomainsConfig {
    /// Closed set of Domains a detail can be classified into.
    #[serde(default = "default_vocabulary")]
    pub vocabulary: Vec<DomainEntry>,

    /// Code used when classification fails or is ambiguous.
    #[serde(default = "default_domain")]
    pub default: String,
}

impl Default for DomainsConfig {
    fn default() -> Self {
        Self {
            vocabulary: default_vocabulary(),
            default: default_domain(),
        }
    }
}

impl DomainsConfig {
    /// Looks up a vocabulary entry by code.
    pub fn find(&self, code: &str) -> Option<&DomainEntry> {
        self.vocabulary.iter().find(|d| d.code == code)
    }
}

/// RIASEC interest codes.
fn default_vocabulary() -> Vec<DomainEntry> {
    vec![
        DomainEntry::new("R", "Realistic"),
        DomainEntry::new("I", "Investigative"),
        DomainEntry::new("A", "Artistic"),
        DomainEntry::new("S", "Social"),
        DomainEntry::new("E", "Enterprising"),
        DomainEntry::new("C", "Conventional"),
    ]
}

fn default_domain() -> String {
    "S".to_string()
}

/// Embedding provider configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EmbeddingConfig {
    /// Dimensionality of every stored vector. Fixed for the lifetime of a store.
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    /// Base URL of a running embedding service. `None` uses the local model.
    #[serde(default)]
    pub service_url: Option<String>,

    /// Name of the local embedding model.
    #[serde(default = "default_model_name")]
    pub model_name: String,

    /// Directory where the local model is downloaded.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            dimensions: default_dimensions(),
            service_url: None,
            model_name: default_model_name(),
            data_dir: default_data_dir(),
        }
    }
}

fn default_dimensions() -> usize {
    384
}

fn default_model_name() -> String {
    "all-MiniLM-L6-v2".to_string()
}

fn default_data_dir() -> String {
    dirs::data_dir()
        .map(|p| p.join("rosemary"))
        .unwrap_or_else(|| std::path::PathBuf::from(".rosemary"))
        .to_string_lossy()
        .into_owned()
}

/// Completion provider configuration (OpenAI-compatible chat completions).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CompletionConfig {
    /// API key. `None` falls back to the `OPENAI_API_KEY` environment variable.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Model identifier.
    #[serde(default = "default_completion_model")]
    pub model: String,

    /// Alternative API base URL (proxies, local servers).
    #[serde(default)]
    pub base_url: Option<String>,

    /// Maximum tokens generated per request.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// HTTP request timeout.
    #[serde(default = "default_completion_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_completion_model(),
            base_url: None,
            max_tokens: default_max_tokens(),
            timeout_secs: default_completion_timeout_secs(),
        }
    }
}

fn default_completion_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_max_tokens() -> u32 {
    512
}

fn default_completion_timeout_secs() -> u64 {
    60
}

/// Graph store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("rosemary").join("rosemary.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("rosemary.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Insight generation configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct InsightsConfig {
    /// Topics analyzed per run when the caller passes no limit.
    #[serde(default = "default_batch_limit")]
    pub batch_limit: usize,

    /// Maximum Insights kept from one provider response.
    #[serde(default = "default_max_per_topic")]
    pub max_per_topic: usize,
}

impl Default for InsightsConfig {
    fn default() -> Self {
        Self {
            batch_limit: default_batch_limit(),
            max_per_topic: default_max_per_topic(),
        }
    }
}

fn default_batch_limit() -> usize {
    25
}

fn default_max_per_topic() -> usize {
    2
}

/// Embedding service bind configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EmbedServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for EmbedServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8088
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_vocabulary_is_riasec() {
        let domains = DomainsConfig::default();
        let codes: Vec<&str> = domains.vocabulary.iter().map(|d| d.code.as_str()).collect();
        assert_eq!(codes, vec!["R", "I", "A", "S", "E", "C"]);
        assert_eq!(domains.find("A").map(|d| d.label.as_str()), Some("Artistic"));
        assert!(domains.find(&domains.default).is_some());
    }

    #[test]
    fn default_thresholds() {
        let memory = MemoryConfig::default();
        assert!((memory.topic_threshold - 0.55).abs() < f64::EPSILON);
        assert!((memory.retrieval_min_score - 0.35).abs() < f64::EPSILON);
        assert!(!memory.degrade_on_provider_error);
    }
}

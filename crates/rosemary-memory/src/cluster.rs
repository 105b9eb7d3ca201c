// SPDX-FileCopyrightText: 2026 Rosemary Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain classification and Topic assignment.
//!
//! Classification is constrained to the configured vocabulary and any
//! other reply is rejected. Topic assignment compares a Detail embedding
//! against each Topic's running centroid using cosine similarity.

use std::sync::Arc;
use std::time::Duration;

use rosemary_config::model::DomainsConfig;
use rosemary_core::types::{CompletionPurpose, CompletionRequest};
use rosemary_core::vector::cosine_similarity;
use rosemary_core::{CompletionAdapter, RosemaryError};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::calls::{complete_text, preview};
use crate::types::{Domain, Topic};

const CLASSIFY_SYSTEM: &str = "You sort personal memory details into life-interest domains. \
Reply with exactly one domain code from the list and nothing else.";

const LABEL_SYSTEM: &str = "You name clusters of personal memory details. \
Reply with a concise topic label of 3-5 words and nothing else.";

/// Longest label accepted from the completion provider.
const MAX_LABEL_CHARS: usize = 60;

/// Words kept when a label has to be derived from the detail text.
const FALLBACK_LABEL_WORDS: usize = 5;

/// Maps free text onto the fixed Domain vocabulary.
pub struct DomainClassifier {
    completion: Arc<dyn CompletionAdapter>,
    domains: DomainsConfig,
    deadline: Duration,
}

impl DomainClassifier {
    pub fn new(
        completion: Arc<dyn CompletionAdapter>,
        domains: DomainsConfig,
        deadline: Duration,
    ) -> Self {
        Self {
            completion,
            domains,
            deadline,
        }
    }

    /// Classifies `text`, failing on provider errors or out-of-vocabulary replies.
    pub async fn classify(&self, text: &str) -> Result<Domain, RosemaryError> {
        let codes: Vec<String> = self
            .domains
            .vocabulary
            .iter()
            .map(|d| d.code.clone())
            .collect();
        let listing = self
            .domains
            .vocabulary
            .iter()
            .map(|d| format!("{}: {}", d.code, d.label))
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = format!("Domains:\n{listing}\n\nDetail: {text}");
        let request = CompletionRequest::new(CompletionPurpose::ClassifyDomain, prompt)
            .with_system(CLASSIFY_SYSTEM)
            .with_vocabulary(codes)
            .with_max_tokens(8);

        let reply = complete_text(self.completion.as_ref(), request, self.deadline).await?;
        self.match_code(&reply)
            .ok_or(RosemaryError::Classification { output: reply })
    }

    /// Classifies `text`, falling back to the default Domain on any provider failure.
    pub async fn classify_or_default(&self, text: &str) -> Result<Domain, RosemaryError> {
        match self.classify(text).await {
            Ok(domain) => Ok(domain),
            Err(e) if e.is_provider_failure() => {
                warn!(
                    error = %e,
                    fallback = %self.domains.default,
                    text = %preview(text),
                    "domain classification failed, using default domain"
                );
                self.default_domain()
            }
            Err(e) => Err(e),
        }
    }

    fn default_domain(&self) -> Result<Domain, RosemaryError> {
        self.domains
            .find(&self.domains.default)
            .map(|d| Domain {
                code: d.code.clone(),
                label: d.label.clone(),
            })
            .ok_or_else(|| {
                RosemaryError::Config(format!(
                    "default domain `{}` is not in the vocabulary",
                    self.domains.default
                ))
            })
    }

    /// Accepts a reply that is exactly one vocabulary code, ignoring case,
    /// surrounding quotes and trailing punctuation.
    fn match_code(&self, reply: &str) -> Option<Domain> {
        let cleaned = reply
            .trim()
            .trim_matches(|c: char| c == '"' || c == '\'' || c == '`')
            .trim_end_matches(['.', ',', ';', ':', '!'])
            .trim();
        self.domains
            .vocabulary
            .iter()
            .find(|d| d.code.eq_ignore_ascii_case(cleaned))
            .map(|d| Domain {
                code: d.code.clone(),
                label: d.label.clone(),
            })
    }
}

/// A candidate Topic with its similarity to the new Detail.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredTopic {
    pub topic_id: String,
    pub score: f32,
}

/// Where a new Detail should go within its Domain.
#[derive(Debug, Clone, PartialEq)]
pub enum Placement {
    /// Join an existing Topic.
    Existing(ScoredTopic),
    /// No Topic is similar enough; found a new one.
    New,
}

/// Result of comparing one embedding against a Domain's Topics.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub primary: Placement,
    /// At most one additional Topic that also clears the threshold.
    pub secondary: Option<ScoredTopic>,
}

/// Picks the primary and optional secondary Topic for `embedding`.
///
/// Topics are ranked by centroid similarity, ties broken by id. A Topic
/// qualifies when its score is at least `threshold`.
pub fn assign_topics(embedding: &[f32], topics: &[Topic], threshold: f32) -> Assignment {
    let mut scored: Vec<ScoredTopic> = topics
        .iter()
        .filter(|t| !t.centroid.is_empty())
        .map(|t| ScoredTopic {
            topic_id: t.id.clone(),
            score: cosine_similarity(embedding, &t.centroid),
        })
        .filter(|s| s.score >= threshold)
        .collect();
    scored.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.topic_id.cmp(&b.topic_id))
    });

    let mut qualifying = scored.into_iter();
    match qualifying.next() {
        Some(best) => Assignment {
            primary: Placement::Existing(best),
            secondary: qualifying.next(),
        },
        None => Assignment {
            primary: Placement::New,
            secondary: None,
        },
    }
}

/// Deterministic Topic id for a label within a Domain.
///
/// Two writers that name the same cluster the same way converge on one node.
pub fn topic_id(domain_code: &str, label: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(domain_code.as_bytes());
    hasher.update([0x1f]);
    hasher.update(normalize_label(label).as_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..12])
}

/// Lowercases and keeps only alphanumeric words separated by single spaces.
pub fn normalize_label(label: &str) -> String {
    label
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Asks the completion provider for a short Topic label.
///
/// Falls back to the leading words of the detail when the provider fails or
/// replies with nothing usable. Labels are assigned once, at Topic creation.
pub async fn generate_label(
    completion: &dyn CompletionAdapter,
    domain: &Domain,
    text: &str,
    deadline: Duration,
) -> String {
    let prompt = format!(
        "Domain: {} ({})\nName the topic this detail belongs to.\n{text}",
        domain.label, domain.code
    );
    let request = CompletionRequest::new(CompletionPurpose::LabelTopic, prompt)
        .with_system(LABEL_SYSTEM)
        .with_max_tokens(16);

    match complete_text(completion, request, deadline).await {
        Ok(reply) => match clean_label(&reply) {
            Some(label) => label,
            None => {
                debug!(reply = %reply, "unusable topic label, deriving from text");
                fallback_label(text)
            }
        },
        Err(e) => {
            warn!(error = %e, text = %preview(text), "topic labelling failed, deriving from text");
            fallback_label(text)
        }
    }
}

fn clean_label(reply: &str) -> Option<String> {
    let line = reply.lines().map(str::trim).find(|l| !l.is_empty())?;
    let line = line
        .trim_start_matches(|c: char| c == '-' || c == '*' || c.is_whitespace())
        .trim_end_matches(|c: char| c == '.' || c.is_whitespace())
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '`')
        .trim_end_matches('.')
        .trim();
    if normalize_label(line).is_empty() {
        return None;
    }
    Some(line.chars().take(MAX_LABEL_CHARS).collect())
}

fn fallback_label(text: &str) -> String {
    let words: Vec<&str> = text
        .split_whitespace()
        .take(FALLBACK_LABEL_WORDS)
        .collect();
    if words.is_empty() {
        "general".to_string()
    } else {
        words.join(" ")
    }
}

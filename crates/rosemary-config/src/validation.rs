// SPDX-FileCopyrightText: 2026 Rosemary Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Checks the semantic constraints serde cannot express: similarity ranges,
//! a well-formed Domain vocabulary, and non-zero limits. All problems are
//! collected rather than failing on the first.

use std::collections::HashSet;

use crate::diagnostic::ConfigError;
use crate::model::RosemaryConfig;

/// Validates a deserialized configuration.
pub fn validate_config(config: &RosemaryConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    check_similarity(&mut errors, "memory.topic_threshold", config.memory.topic_threshold);
    check_similarity(
        &mut errors,
        "memory.retrieval_min_score",
        config.memory.retrieval_min_score,
    );

    for (key, value) in [
        ("memory.max_results", config.memory.max_results as u64),
        ("memory.provider_timeout_secs", config.memory.provider_timeout_secs),
        ("memory.summary_max_details", config.memory.summary_max_details as u64),
        ("embedding.dimensions", config.embedding.dimensions as u64),
        ("completion.max_tokens", config.completion.max_tokens as u64),
        ("completion.timeout_secs", config.completion.timeout_secs),
        ("insights.batch_limit", config.insights.batch_limit as u64),
        ("insights.max_per_topic", config.insights.max_per_topic as u64),
    ] {
        if value == 0 {
            errors.push(ConfigError::OutOfRange {
                key: key.to_string(),
                value: value.to_string(),
                range: ">= 1".to_string(),
            });
        }
    }

    if config.domains.vocabulary.is_empty() {
        errors.push(ConfigError::Validation {
            message: "domains.vocabulary must contain at least one domain".to_string(),
        });
    }

    let mut seen = HashSet::new();
    for (i, domain) in config.domains.vocabulary.iter().enumerate() {
        if domain.code.trim().is_empty() {
            errors.push(ConfigError::Validation {
                message: format!("domains.vocabulary[{i}].code must not be empty"),
            });
        } else if !seen.insert(domain.code.to_ascii_uppercase()) {
            errors.push(ConfigError::Validation {
                message: format!("duplicate domain code `{}`", domain.code),
            });
        }
    }

    if !config.domains.vocabulary.is_empty()
        && config.domains.find(&config.domains.default).is_none()
    {
        errors.push(ConfigError::Validation {
            message: format!(
                "domains.default `{}` is not in domains.vocabulary",
                config.domains.default
            ),
        });
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }

    if let Some(url) = &config.embedding.service_url
        && !(url.starts_with("http://") || url.starts_with("https://"))
    {
        errors.push(ConfigError::Validation {
            message: format!("embedding.service_url `{url}` must be an http(s) URL"),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_similarity(errors: &mut Vec<ConfigError>, key: &str, value: f64) {
    if !(-1.0..=1.0).contains(&value) {
        errors.push(ConfigError::OutOfRange {
            key: key.to_string(),
            value: value.to_string(),
            range: "[-1.0, 1.0]".to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DomainEntry;

    #[test]
    fn default_config_validates() {
        assert!(validate_config(&RosemaryConfig::default()).is_ok());
    }

    #[test]
    fn threshold_out_of_range_fails() {
        let mut config = RosemaryConfig::default();
        config.memory.topic_threshold = 1.5;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(
            |e| matches!(e, ConfigError::OutOfRange { key, .. } if key == "memory.topic_threshold")
        ));
    }

    #[test]
    fn default_domain_must_be_in_vocabulary() {
        let mut config = RosemaryConfig::default();
        config.domains.default = "Z".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(
            |e| matches!(e, ConfigError::Validation { message } if message.contains("domains.default"))
        ));
    }

    #[test]
    fn duplicate_domain_codes_fail() {
        let mut config = RosemaryConfig::default();
        config.domains.vocabulary.push(DomainEntry {
            code: "a".to_string(),
            label: "Another artistic".to_string(),
        });
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(
            |e| matches!(e, ConfigError::Validation { message } if message.contains("duplicate"))
        ));
    }

    #[test]
    fn collects_every_error() {
        let mut config = RosemaryConfig::default();
        config.embedding.dimensions = 0;
        config.memory.max_results = 0;
        config.storage.database_path = " ".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn service_url_must_be_http() {
        let mut config = RosemaryConfig::default();
        config.embedding.service_url = Some("localhost:8088".to_string());
        assert!(validate_config(&config).is_err());
        config.embedding.service_url = Some("http://localhost:8088".to_string());
        assert!(validate_config(&config).is_ok());
    }
}

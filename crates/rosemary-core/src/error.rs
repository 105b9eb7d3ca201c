// SPDX-FileCopyrightText: 2026 Rosemary Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Rosemary memory engine.

use thiserror::Error;

/// The primary error type used across all Rosemary adapter traits and memory operations.
#[derive(Debug, Error)]
pub enum RosemaryError {
    /// Configuration errors (invalid TOML, bad thresholds, embedding dimensionality mismatch).
    #[error("configuration error: {0}")]
    Config(String),

    /// Invalid input to a memory operation. Raised before any provider call.
    #[error("{operation}: invalid input: {message}")]
    Validation { operation: String, message: String },

    /// Embedding or completion provider failure.
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A provider call exceeded its deadline.
    #[error("{operation} timed out after {duration:?}")]
    Timeout {
        operation: String,
        duration: std::time::Duration,
    },

    /// Domain classification returned a label outside the configured vocabulary.
    #[error("classification out of vocabulary: `{output}`")]
    Classification { output: String },

    /// Graph store errors (database unavailable, query failure, constraint violation).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RosemaryError {
    /// Shorthand for a validation error on the named operation.
    pub fn validation(operation: impl Into<String>, message: impl Into<String>) -> Self {
        RosemaryError::Validation {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Shorthand for a provider error without an underlying source.
    pub fn provider(message: impl Into<String>) -> Self {
        RosemaryError::Provider {
            message: message.into(),
            source: None,
        }
    }

    /// Returns true when the error originated from an embedding or completion provider.
    ///
    /// Timeouts and out-of-vocabulary classifications count as provider failures.
    pub fn is_provider_failure(&self) -> bool {
        matches!(
            self,
            RosemaryError::Provider { .. }
                | RosemaryError::Timeout { .. }
                | RosemaryError::Classification { .. }
        )
    }
}

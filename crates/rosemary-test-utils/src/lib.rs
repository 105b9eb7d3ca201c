// SPDX-FileCopyrightText: 2026 Rosemary Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Rosemary integration tests.
//!
//! Deterministic providers and a ready-wired memory engine, so tests run
//! without a model download or network access.
//!
//! # Components
//!
//! - [`HashEmbedder`] - feature-hashed bag-of-words embeddings
//! - [`FailingEmbedder`] / [`SlowEmbedder`] - failure and timeout injection
//! - [`MockCompletion`] - scripted completion provider
//! - [`TestHarness`] - in-memory store plus writer, retriever, insights and exporter

pub mod harness;
pub mod mock_completion;
pub mod mock_embedder;

pub use harness::{TEST_DIMENSIONS, TestHarness};
pub use mock_completion::MockCompletion;
pub use mock_embedder::{FailingEmbedder, HashEmbedder, SlowEmbedder, tokenize};

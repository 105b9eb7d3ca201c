// SPDX-FileCopyrightText: 2026 Rosemary Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Capability traits for the external collaborators of the memory engine.
//!
//! All adapters extend the [`PluginAdapter`] base trait and use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod completion;
pub mod embedding;
pub mod graph;

pub use adapter::PluginAdapter;
pub use completion::CompletionAdapter;
pub use embedding::EmbeddingAdapter;
pub use graph::GraphStore;

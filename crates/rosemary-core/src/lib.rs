// SPDX-FileCopyrightText: 2026 Rosemary Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Rosemary memory engine.
//!
//! This crate provides the capability traits for the engine's external
//! collaborators (embedding provider, completion provider, graph store),
//! the shared error type, and the graph data types they exchange.

pub mod error;
pub mod traits;
pub mod types;
pub mod vector;

// Re-export key items at crate root for ergonomic imports.
pub use error::RosemaryError;
pub use types::{AdapterType, HealthStatus};

pub use traits::{CompletionAdapter, EmbeddingAdapter, GraphStore, PluginAdapter};

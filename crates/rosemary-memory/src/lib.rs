// SPDX-FileCopyrightText: 2026 Rosemary Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Structured long-term memory for the Rosemary agent.
//!
//! Memory is a graph of Domains, Topics, Summaries, Details and Insights
//! kept in a [`rosemary_core::GraphStore`].
//!
//! ## Architecture
//!
//! - **MemoryWriter**: embeds, classifies and files new Details, then refreshes summaries
//! - **MemoryRetriever**: similarity search over Details, grouped by Topic
//! - **InsightGenerator**: batch analysis producing Insight nodes
//! - **GraphExporter**: DOT and JSON snapshots of the whole graph
//! - **GroundedAgent**: one retrieve, answer and remember turn
//! - **OnnxEmbedder** / **RemoteEmbedder**: local or service-backed embeddings
//! - **ModelManager**: first-run model download

pub mod agent;
pub mod calls;
pub mod cluster;
pub mod embedder;
pub mod export;
pub mod insights;
pub mod locks;
pub mod metrics;
pub mod model_manager;
pub mod provider;
pub mod remote;
pub mod retriever;
pub mod types;
pub mod writer;

pub use agent::{GroundedAgent, TurnOutcome};
pub use embedder::OnnxEmbedder;
pub use export::{GraphExporter, GraphSnapshot, default_snapshot_path};
pub use insights::InsightGenerator;
pub use locks::DomainLocks;
pub use model_manager::ModelManager;
pub use provider::format_bundle;
pub use remote::RemoteEmbedder;
pub use retriever::{MemoryRetriever, RetrieveOptions};
pub use types::*;
pub use writer::MemoryWriter;

// SPDX-FileCopyrightText: 2026 Rosemary Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence for the Rosemary memory graph.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, a
//! single-writer concurrency model via `tokio-rusqlite`, and a
//! [`rosemary_core::GraphStore`] implementation over labeled nodes and
//! typed edges.

pub mod database;
pub mod graph;
pub mod migrations;

pub use database::Database;
pub use graph::SqliteGraphStore;

// SPDX-FileCopyrightText: 2026 Rosemary Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedded schema migrations using refinery.
//!
//! SQL files under `migrations/` are compiled in via `embed_migrations!`
//! and applied every time a [`crate::Database`] is opened.

use rosemary_core::RosemaryError;

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

/// Runs all pending migrations against the given connection.
///
/// Refinery records applied versions in `refinery_schema_history`.
pub fn run_migrations(conn: &mut rusqlite::Connection) -> Result<(), RosemaryError> {
    embedded::migrations::runner()
        .run(conn)
        .map_err(|e| RosemaryError::Storage {
            source: Box::new(e),
        })?;
    Ok(())
}

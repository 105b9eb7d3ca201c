// SPDX-FileCopyrightText: 2026 Rosemary Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and migrations.
//!
//! All reads and writes go through tokio-rusqlite's single background
//! thread, which serializes every closure submitted via [`Database::connection`].

use std::path::Path;

use rosemary_core::RosemaryError;
use tracing::debug;

/// Path that selects a private in-memory database.
pub const IN_MEMORY: &str = ":memory:";

/// Converts a tokio-rusqlite error into [`RosemaryError::Storage`].
pub fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> RosemaryError {
    RosemaryError::Storage {
        source: Box::new(e),
    }
}

/// Unwraps an error raised inside a closure that already speaks [`RosemaryError`].
pub(crate) fn flatten_tr_err(e: tokio_rusqlite::Error<RosemaryError>) -> RosemaryError {
    match e {
        tokio_rusqlite::Error::Error(inner) => inner,
        other => RosemaryError::Storage {
            source: other.to_string().into(),
        },
    }
}

/// A migrated SQLite database behind a single-writer connection.
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Opens (or creates) the database at `path` and applies migrations.
    ///
    /// `":memory:"` opens a private in-memory database. WAL mode is only
    /// applied to file-backed databases.
    pub async fn open(path: &str, wal_mode: bool) -> Result<Self, RosemaryError> {
        let in_memory = path == IN_MEMORY;
        let conn = if in_memory {
            tokio_rusqlite::Connection::open_in_memory().await
        } else {
            if let Some(parent) = Path::new(path).parent()
                && !parent.as_os_str().is_empty()
            {
                std::fs::create_dir_all(parent).map_err(|e| RosemaryError::Storage {
                    source: Box::new(e),
                })?;
            }
            tokio_rusqlite::Connection::open(path).await
        }
        .map_err(|e| RosemaryError::Storage {
            source: Box::new(e),
        })?;

        let wal = wal_mode && !in_memory;
        conn.call(move |conn| -> Result<(), RosemaryError> {
            apply_pragmas(conn, wal).map_err(|e| RosemaryError::Storage {
                source: Box::new(e),
            })?;
            crate::migrations::run_migrations(conn)
        })
        .await
        .map_err(flatten_tr_err)?;

        debug!(path, wal, "database opened");
        Ok(Self { conn })
    }

    /// Opens a private in-memory database.
    pub async fn open_in_memory() -> Result<Self, RosemaryError> {
        Self::open(IN_MEMORY, false).await
    }

    /// Returns the underlying single-writer connection.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Checkpoints the WAL so the main database file is self-contained.
    pub async fn checkpoint(&self) -> Result<(), RosemaryError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }
}

fn apply_pragmas(conn: &rusqlite::Connection, wal: bool) -> Result<(), rusqlite::Error> {
    if wal {
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
    }
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "busy_timeout", 5000)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_in_memory_runs_migrations() {
        let db = Database::open_in_memory().await.unwrap();
        let tables: Vec<String> = db
            .connection()
            .call(|conn| -> Result<Vec<String>, rusqlite::Error> {
                let mut stmt = conn.prepare(
                    "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
                )?;
                let rows = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .unwrap();
        assert!(tables.contains(&"nodes".to_string()));
        assert!(tables.contains(&"edges".to_string()));
        assert!(tables.contains(&"graph_meta".to_string()));
    }

    #[tokio::test]
    async fn open_file_creates_parent_dirs_and_reopens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/graph.db");
        let path = path.to_str().unwrap();

        let db = Database::open(path, true).await.unwrap();
        db.checkpoint().await.unwrap();
        drop(db);

        // Migrations are idempotent across reopen.
        Database::open(path, true).await.unwrap();
    }
}

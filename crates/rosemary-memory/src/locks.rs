// SPDX-FileCopyrightText: 2026 Rosemary Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-Domain serialization of read-then-write graph updates.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Async locks keyed by Domain code.
///
/// Cloning shares the same lock table, so the writer and the insight
/// generator can serialize updates to the same Topic nodes.
#[derive(Clone, Default)]
pub struct DomainLocks {
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl DomainLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `domain_code`.
    pub async fn lock(&self, domain_code: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(domain_code.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }
}

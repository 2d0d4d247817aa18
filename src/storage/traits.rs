// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The store could not be reached or rejected the command.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    /// The adapter is bound to one logical database and was asked about another.
    #[error("Store is bound to database {bound}, cannot list database {requested}")]
    WrongDatabase {
        bound: i64,
        requested: i64,
    },
}

/// Operations the eviction supervisor needs from a key-value store.
///
/// Every call may block on network I/O. Implementations own their
/// connection; callers treat them as stateless and reentrant.
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// Value representation handed back by [`get`](Self::get).
    type Value: Clone + Send + Sync + 'static;

    /// Snapshot of keys visible in `database` at call time.
    ///
    /// No ordering guarantee. The snapshot may miss keys created right after
    /// the call, or contain keys deleted right after it.
    async fn list_keys(&self, database: i64) -> Result<Vec<String>, StorageError>;

    /// Time since the store last observed a read or write of `key`.
    ///
    /// `Ok(None)` means the store cannot tell (feature unsupported, or the
    /// key is already gone). Callers must not treat that as stale.
    async fn idle_time(&self, key: &str) -> Result<Option<Duration>, StorageError>;

    async fn get(&self, key: &str) -> Result<Option<Self::Value>, StorageError>;

    /// Delete `key`. Returns `true` only if a key was present and removed.
    async fn remove(&self, key: &str) -> Result<bool, StorageError>;
}

// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! In-process [`KeyStore`] with sliding idle-time tracking.
//!
//! Idle time is measured on tokio's clock, so tests running with a paused
//! runtime (`#[tokio::test(start_paused = true)]`) get exact, deterministic
//! idle times. Reads and writes both reset a key's idle time, matching how
//! Redis updates its LRU clock.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;

use super::traits::{KeyStore, StorageError};

struct StoredEntry<V> {
    value: V,
    last_touched: Instant,
    idle_unknown: bool,
}

pub struct InMemoryStore<V = Vec<u8>> {
    data: DashMap<String, StoredEntry<V>>,
    database: i64,
    idle_time_supported: AtomicBool,
}

impl<V: Clone + Send + Sync + 'static> InMemoryStore<V> {
    #[must_use]
    pub fn new() -> Self {
        Self::with_database(0)
    }

    /// Create a store that answers for one logical database.
    #[must_use]
    pub fn with_database(database: i64) -> Self {
        Self {
            data: DashMap::new(),
            database,
            idle_time_supported: AtomicBool::new(true),
        }
    }

    #[must_use]
    pub fn database(&self) -> i64 {
        self.database
    }

    /// Insert or overwrite `key`, resetting its idle time.
    pub fn put(&self, key: impl Into<String>, value: V) {
        self.data.insert(
            key.into(),
            StoredEntry {
                value,
                last_touched: Instant::now(),
                idle_unknown: false,
            },
        );
    }

    /// Reset the idle time of `key` without changing its value.
    pub fn touch(&self, key: &str) -> bool {
        match self.data.get_mut(key) {
            Some(mut entry) => {
                entry.last_touched = Instant::now();
                true
            }
            None => false,
        }
    }

    /// Remove `key` on behalf of the application (not an eviction).
    pub fn delete(&self, key: &str) -> bool {
        self.data.remove(key).is_some()
    }

    /// Read a value without resetting its idle time.
    #[must_use]
    pub fn peek(&self, key: &str) -> Option<V> {
        self.data.get(key).map(|entry| entry.value.clone())
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Make the store report unknown idle time for `key`.
    pub fn mark_idle_unknown(&self, key: &str) -> bool {
        match self.data.get_mut(key) {
            Some(mut entry) => {
                entry.idle_unknown = true;
                true
            }
            None => false,
        }
    }

    /// Toggle idle-time reporting for every key, like a Redis server
    /// running an LFU maxmemory policy.
    pub fn set_idle_time_supported(&self, supported: bool) {
        self.idle_time_supported.store(supported, Ordering::Release);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn clear(&self) {
        self.data.clear();
    }
}

impl<V: Clone + Send + Sync + 'static> Default for InMemoryStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<V: Clone + Send + Sync + 'static> KeyStore for InMemoryStore<V> {
    type Value = V;

    async fn list_keys(&self, database: i64) -> Result<Vec<String>, StorageError> {
        if database != self.database {
            return Err(StorageError::WrongDatabase {
                bound: self.database,
                requested: database,
            });
        }
        Ok(self.data.iter().map(|entry| entry.key().clone()).collect())
    }

    async fn idle_time(&self, key: &str) -> Result<Option<Duration>, StorageError> {
        if !self.idle_time_supported.load(Ordering::Acquire) {
            return Ok(None);
        }
        Ok(self.data.get(key).and_then(|entry| {
            if entry.idle_unknown {
                None
            } else {
                Some(entry.last_touched.elapsed())
            }
        }))
    }

    async fn get(&self, key: &str) -> Result<Option<V>, StorageError> {
        Ok(self.data.get_mut(key).map(|mut entry| {
            entry.last_touched = Instant::now();
            entry.value.clone()
        }))
    }

    async fn remove(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.data.remove(key).is_some())
    }
}

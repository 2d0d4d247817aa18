// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Redis backend for the [`KeyStore`] contract.
//!
//! Command mapping:
//! ```text
//! list_keys  → SCAN <cursor> MATCH {prefix}* COUNT {scan_count}   (until cursor 0)
//! idle_time  → OBJECT IDLETIME {prefix}{key}                      (seconds)
//! get        → GET {prefix}{key}
//! remove     → DEL {prefix}{key}                                  (1 → true, 0 → false)
//! ```
//!
//! `SCAN`, `OBJECT IDLETIME` and `GET` are retried per [`RetryConfig`].
//! `DEL` is sent exactly once; a transport error surfaces as
//! [`StorageError::Unavailable`] and the next pass re-examines the key.
//!
//! `OBJECT IDLETIME` does not itself touch the key, so probing never extends
//! a key's life. A nil reply (key gone) and an error reply (the server runs
//! an LFU maxmemory policy and does not track idle time) both map to unknown.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, ErrorKind, IntoConnectionInfo, RedisError};
use tracing::{debug, info};

use super::traits::{KeyStore, StorageError};
use crate::config::{validate_prefix, ConfigError, EvictionConfig};
use crate::resilience::retry::{retry, RetryConfig};

fn unavailable(e: RedisError) -> StorageError {
    StorageError::Unavailable(e.to_string())
}

/// [`KeyStore`] over a single Redis endpoint.
///
/// Enumeration scans only the node behind the one connection. Against a
/// Redis Cluster or a set of replicas, run one store (and supervisor) per
/// primary; keys living on other nodes are never listed.
pub struct RedisStore {
    connection: ConnectionManager,
    database: i64,
    /// Optional key prefix for namespacing (e.g., "myapp:" → "myapp:user.alice")
    prefix: String,
    scan_count: usize,
    query_retry: RetryConfig,
}

impl RedisStore {
    /// Connect to database 0 without a key prefix.
    pub async fn new(connection_string: &str) -> Result<Self, StorageError> {
        Self::connect(connection_string, 0, None).await
    }

    /// Connect to `database`, optionally restricted to keys under `prefix`.
    ///
    /// The prefix is prepended to every key and stripped from listed keys,
    /// so a supervisor sharing a Redis instance only ever sees its own
    /// namespace. A prefix containing glob characters (`* ? [ ] \`) is
    /// rejected before connecting, since it would corrupt the `SCAN MATCH`
    /// pattern.
    ///
    /// ```rust,no_run
    /// # use sliding_expiry::storage::redis::RedisStore;
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let store = RedisStore::connect("redis://localhost", 1, Some("sessions:")).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn connect(
        connection_string: &str,
        database: i64,
        prefix: Option<&str>,
    ) -> Result<Self, StorageError> {
        if let Some(prefix) = prefix {
            validate_prefix(prefix).map_err(|e| StorageError::Unavailable(e.to_string()))?;
        }

        let mut info = connection_string
            .into_connection_info()
            .map_err(unavailable)?;
        info.redis.db = database;
        let client = Client::open(info).map_err(unavailable)?;

        let connection = retry("redis_connect", &RetryConfig::connect(), || async {
            ConnectionManager::new(client.clone()).await
        })
        .await
        .map_err(unavailable)?;

        info!(database, prefix = prefix.unwrap_or(""), "Connected to Redis");

        Ok(Self {
            connection,
            database,
            prefix: prefix.unwrap_or("").to_string(),
            scan_count: 1_000,
            query_retry: RetryConfig::query(),
        })
    }

    /// Connect using the Redis fields of an [`EvictionConfig`].
    pub async fn from_config(config: &EvictionConfig) -> Result<Self, StorageError> {
        let url = config.redis_url.as_deref().ok_or_else(|| {
            StorageError::Unavailable(ConfigError::MissingRedisUrl.to_string())
        })?;
        let store = Self::connect(url, config.database, config.redis_prefix.as_deref()).await?;
        Ok(store.with_scan_count(config.scan_count))
    }

    #[must_use]
    pub fn with_scan_count(mut self, scan_count: usize) -> Self {
        self.scan_count = scan_count.max(1);
        self
    }

    /// Retry policy for the read commands. `DEL` is never retried.
    #[must_use]
    pub fn with_query_retry(mut self, retry: RetryConfig) -> Self {
        self.query_retry = retry;
        self
    }

    #[inline]
    fn prefixed_key(&self, key: &str) -> String {
        if self.prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}{}", self.prefix, key)
        }
    }

    #[inline]
    fn strip_prefix<'a>(&self, key: &'a str) -> &'a str {
        if self.prefix.is_empty() {
            key
        } else {
            key.strip_prefix(&self.prefix).unwrap_or(key)
        }
    }

    fn match_pattern(&self) -> String {
        format!("{}*", self.prefix)
    }

    /// Clone of the managed connection, for callers writing to the same store.
    pub fn connection(&self) -> ConnectionManager {
        self.connection.clone()
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn database(&self) -> i64 {
        self.database
    }
}

#[async_trait]
impl KeyStore for RedisStore {
    type Value = Vec<u8>;

    async fn list_keys(&self, database: i64) -> Result<Vec<String>, StorageError> {
        if database != self.database {
            return Err(StorageError::WrongDatabase {
                bound: self.database,
                requested: database,
            });
        }

        let pattern = self.match_pattern();
        let mut cursor: u64 = 0;
        let mut keys = Vec::new();

        loop {
            let (next, page): (u64, Vec<String>) =
                retry("redis_scan", &self.query_retry, || {
                    let mut conn = self.connection.clone();
                    let pattern = pattern.clone();
                    async move {
                        let page: (u64, Vec<String>) = redis::cmd("SCAN")
                            .arg(cursor)
                            .arg("MATCH")
                            .arg(&pattern)
                            .arg("COUNT")
                            .arg(self.scan_count)
                            .query_async(&mut conn)
                            .await?;
                        Ok(page)
                    }
                })
                .await
                .map_err(unavailable)?;

            keys.extend(page.iter().map(|k| self.strip_prefix(k).to_string()));

            if next == 0 {
                break;
            }
            cursor = next;
        }

        // SCAN may return a key more than once across pages
        keys.sort_unstable();
        keys.dedup();

        debug!(database, count = keys.len(), "Listed keys");
        Ok(keys)
    }

    async fn idle_time(&self, key: &str) -> Result<Option<Duration>, StorageError> {
        let prefixed = self.prefixed_key(key);

        let reply: Result<Option<u64>, RedisError> =
            retry("redis_object_idletime", &self.query_retry, || {
                let mut conn = self.connection.clone();
                let key = prefixed.clone();
                async move {
                    let result: Result<Option<u64>, RedisError> = redis::cmd("OBJECT")
                        .arg("IDLETIME")
                        .arg(&key)
                        .query_async(&mut conn)
                        .await;
                    match result {
                        // The server answered; an error reply won't change on retry
                        Err(e) if e.kind() == ErrorKind::ResponseError => Ok(Err(e)),
                        Err(e) => Err(e),
                        Ok(v) => Ok(Ok(v)),
                    }
                }
            })
            .await
            .map_err(unavailable)?;

        match reply {
            Ok(secs) => Ok(secs.map(Duration::from_secs)),
            Err(e) => {
                debug!(key = %key, error = %e, "Idle time not reported");
                Ok(None)
            }
        }
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let prefixed = self.prefixed_key(key);

        retry("redis_get", &self.query_retry, || {
            let mut conn = self.connection.clone();
            let key = prefixed.clone();
            async move {
                let data: Option<Vec<u8>> = conn.get(&key).await?;
                Ok(data)
            }
        })
        .await
        .map_err(unavailable)
    }

    async fn remove(&self, key: &str) -> Result<bool, StorageError> {
        let prefixed = self.prefixed_key(key);

        // Never retried: replaying DEL after a lost reply answers 0 for our
        // own delete, which would read as a lost race
        let mut conn = self.connection.clone();
        let removed: u64 = conn.del(&prefixed).await.map_err(unavailable)?;
        Ok(removed > 0)
    }
}

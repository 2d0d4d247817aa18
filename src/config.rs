// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Configuration for an eviction supervisor.
//!
//! # Example
//!
//! ```
//! use sliding_expiry::EvictionConfig;
//! use std::time::Duration;
//!
//! // Defaults: one minute sliding TTL, scanned every second
//! let config = EvictionConfig::default();
//! assert_eq!(config.sliding_expiration(), Duration::from_secs(60));
//!
//! let config = EvictionConfig {
//!     redis_url: Some("redis://localhost:6379".into()),
//!     redis_prefix: Some("sessions:".into()),
//!     sliding_expiration_ms: 30_000,
//!     scan_interval_ms: 250,
//!     database: 2,
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! ```

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("sliding_expiration_ms must be greater than zero")]
    ZeroSlidingExpiration,
    #[error("scan_interval_ms must be greater than zero")]
    ZeroScanInterval,
    #[error("database must be non-negative, got {0}")]
    NegativeDatabase(i64),
    #[error("scan_count must be greater than zero")]
    ZeroScanCount,
    #[error("redis_prefix {0:?} contains glob metacharacters")]
    GlobInPrefix(String),
    #[error("redis_url is required to connect to Redis")]
    MissingRedisUrl,
}

/// Sliding-expiration policy for one logical namespace of a store.
///
/// Bound once to a supervisor and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EvictionConfig {
    /// Idle time after which a key is evicted (default: 60 s)
    #[serde(default = "default_sliding_expiration_ms")]
    pub sliding_expiration_ms: u64,

    /// Time between two sweep passes (default: 1 s)
    #[serde(default = "default_scan_interval_ms")]
    pub scan_interval_ms: u64,

    /// Logical database to sweep
    #[serde(default)]
    pub database: i64,

    /// Redis connection string (e.g., "redis://localhost:6379")
    #[serde(default)]
    pub redis_url: Option<String>,

    /// Key namespace; only keys under it are swept
    #[serde(default)]
    pub redis_prefix: Option<String>,

    /// SCAN COUNT hint
    #[serde(default = "default_scan_count")]
    pub scan_count: usize,
}

fn default_sliding_expiration_ms() -> u64 { 60_000 }
fn default_scan_interval_ms() -> u64 { 1_000 }
fn default_scan_count() -> usize { 1_000 }

fn whole_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl Default for EvictionConfig {
    fn default() -> Self {
        Self {
            sliding_expiration_ms: default_sliding_expiration_ms(),
            scan_interval_ms: default_scan_interval_ms(),
            database: 0,
            redis_url: None,
            redis_prefix: None,
            scan_count: default_scan_count(),
        }
    }
}

impl EvictionConfig {
    /// Config with the two timing knobs set, everything else default.
    ///
    /// Both durations are kept at millisecond granularity: sub-millisecond
    /// parts are dropped (so anything under 1ms fails [`validate`](Self::validate))
    /// and values beyond `u64::MAX` ms saturate.
    #[must_use]
    pub fn new(sliding_expiration: Duration, scan_interval: Duration) -> Self {
        Self {
            sliding_expiration_ms: whole_millis(sliding_expiration),
            scan_interval_ms: whole_millis(scan_interval),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn sliding_expiration(&self) -> Duration {
        Duration::from_millis(self.sliding_expiration_ms)
    }

    #[must_use]
    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sliding_expiration_ms == 0 {
            return Err(ConfigError::ZeroSlidingExpiration);
        }
        if self.scan_interval_ms == 0 {
            return Err(ConfigError::ZeroScanInterval);
        }
        if self.database < 0 {
            return Err(ConfigError::NegativeDatabase(self.database));
        }
        if self.scan_count == 0 {
            return Err(ConfigError::ZeroScanCount);
        }
        if let Some(prefix) = &self.redis_prefix {
            validate_prefix(prefix)?;
        }
        Ok(())
    }
}

/// A key prefix becomes a `SCAN MATCH` pattern, so it must be glob-free.
pub(crate) fn validate_prefix(prefix: &str) -> Result<(), ConfigError> {
    if prefix.contains(['*', '?', '[', ']', '\\']) {
        return Err(ConfigError::GlobInPrefix(prefix.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = EvictionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.scan_interval(), Duration::from_secs(1));
        assert_eq!(config.database, 0);
        assert!(config.redis_url.is_none());
    }

    #[test]
    fn test_new_sets_durations() {
        let config = EvictionConfig::new(Duration::from_millis(1000), Duration::from_millis(100));
        assert_eq!(config.sliding_expiration(), Duration::from_millis(1000));
        assert_eq!(config.scan_interval(), Duration::from_millis(100));
    }

    #[test]
    fn test_new_keeps_millisecond_granularity() {
        let config = EvictionConfig::new(Duration::from_micros(1500), Duration::from_micros(999));
        assert_eq!(config.sliding_expiration_ms, 1);
        assert_eq!(config.scan_interval_ms, 0);
        assert_eq!(config.validate(), Err(ConfigError::ZeroScanInterval));

        let config = EvictionConfig::new(Duration::MAX, Duration::from_millis(100));
        assert_eq!(config.sliding_expiration_ms, u64::MAX);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_durations_rejected() {
        let config = EvictionConfig { sliding_expiration_ms: 0, ..Default::default() };
        assert_eq!(config.validate(), Err(ConfigError::ZeroSlidingExpiration));

        let config = EvictionConfig { scan_interval_ms: 0, ..Default::default() };
        assert_eq!(config.validate(), Err(ConfigError::ZeroScanInterval));
    }

    #[test]
    fn test_negative_database_rejected() {
        let config = EvictionConfig { database: -1, ..Default::default() };
        assert_eq!(config.validate(), Err(ConfigError::NegativeDatabase(-1)));
    }

    #[test]
    fn test_glob_prefix_rejected() {
        let config = EvictionConfig { redis_prefix: Some("app:*".into()), ..Default::default() };
        assert!(matches!(config.validate(), Err(ConfigError::GlobInPrefix(_))));

        let config = EvictionConfig { redis_prefix: Some("app:".into()), ..Default::default() };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_prefix_glob_characters() {
        for prefix in ["a[1]:", "a?:", "a\\b:", "*"] {
            assert_eq!(
                validate_prefix(prefix),
                Err(ConfigError::GlobInPrefix(prefix.to_string()))
            );
        }
        assert!(validate_prefix("").is_ok());
        assert!(validate_prefix("tenant-1:sessions:").is_ok());
    }

    #[test]
    fn test_zero_scan_count_rejected() {
        let config = EvictionConfig { scan_count: 0, ..Default::default() };
        assert_eq!(config.validate(), Err(ConfigError::ZeroScanCount));
    }

    #[test]
    fn test_deserialize_fills_defaults() {
        let config: EvictionConfig = serde_json::from_str(
            r#"{"sliding_expiration_ms": 1500, "redis_url": "redis://cache:6379"}"#,
        )
        .unwrap();

        assert_eq!(config.sliding_expiration(), Duration::from_millis(1500));
        assert_eq!(config.scan_interval_ms, 1_000);
        assert_eq!(config.scan_count, 1_000);
        assert_eq!(config.redis_url.as_deref(), Some("redis://cache:6379"));
    }
}

// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Public types for the eviction supervisor.

use std::time::Duration;

use thiserror::Error;

use crate::config::ConfigError;
use crate::storage::traits::StorageError;
use crate::timer::TimerError;

/// Supervisor lifecycle state.
///
/// ```text
/// Created ──start()──► Running ──dispose()──► Disposed
///    └─────────────────dispose()────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    /// Constructed, not scanning
    Created,
    /// Subscribed to the timer, sweeping on every tick
    Running,
    /// Timer released; no new pass will start
    Disposed,
}

impl std::fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "Created"),
            Self::Running => write!(f, "Running"),
            Self::Disposed => write!(f, "Disposed"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SupervisorError {
    #[error("supervisor already started")]
    AlreadyStarted,
    #[error("supervisor has been disposed")]
    Disposed,
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("timer error: {0}")]
    Timer(#[from] TimerError),
}

/// Store call that failed during a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    ListKeys,
    IdleTime,
    Get,
    Remove,
}

impl StoreOp {
    /// Returns the label used in logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreOp::ListKeys => "list_keys",
            StoreOp::IdleTime => "idle_time",
            StoreOp::Get => "get",
            StoreOp::Remove => "remove",
        }
    }
}

/// A key found stale during enumeration, pending eviction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateKey {
    pub key: String,
    /// Idle time reported by the store when the key was checked
    pub idle_time: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepFailure {
    pub operation: StoreOp,
    /// `None` when enumeration itself failed
    pub key: Option<String>,
    pub error: StorageError,
}

/// Outcome of one sweep pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// 1-based pass number; 0 before the first pass
    pub pass: u64,
    pub scanned: usize,
    pub candidates: usize,
    /// Keys this supervisor deleted (one event each)
    pub evicted: usize,
    /// Candidates already gone when the delete ran
    pub suppressed: usize,
    pub unknown_idle: usize,
    pub failures: Vec<SweepFailure>,
    pub duration: Duration,
}

impl SweepReport {
    pub(crate) fn new(pass: u64) -> Self {
        Self {
            pass,
            ..Default::default()
        }
    }

    /// Check if every store call in the pass succeeded
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

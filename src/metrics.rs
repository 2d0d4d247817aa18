// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for eviction supervisors.
//!
//! Uses the `metrics` crate for backend-agnostic collection. The host
//! application picks the exporter (Prometheus, OTEL, etc.).
//!
//! # Metric Naming Convention
//! - `sliding_expiry_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Labels
//! - `operation`: list_keys, idle_time, get, remove, listener
//! - `state`: Created, Running, Disposed

use metrics::{counter, histogram};
use std::time::{Duration, Instant};

/// Record one completed sweep pass
pub fn record_pass(duration: Duration) {
    counter!("sliding_expiry_passes_total").increment(1);
    histogram!("sliding_expiry_pass_seconds").record(duration.as_secs_f64());
}

/// Keys returned by enumeration in one pass
pub fn record_keys_scanned(count: usize) {
    counter!("sliding_expiry_keys_scanned_total").increment(count as u64);
    histogram!("sliding_expiry_keys_per_pass").record(count as f64);
}

/// Keys whose idle time reached the sliding expiration
pub fn record_candidates(count: usize) {
    counter!("sliding_expiry_candidates_total").increment(count as u64);
}

/// Keys deleted by this supervisor (one event each)
pub fn record_evictions(count: usize) {
    counter!("sliding_expiry_evictions_total").increment(count as u64);
}

/// Deletes that found the key already gone (event suppressed)
pub fn record_suppressed(count: usize) {
    counter!("sliding_expiry_suppressed_total").increment(count as u64);
}

/// Keys skipped because the store could not report idle time
pub fn record_unknown_idle(count: usize) {
    counter!("sliding_expiry_unknown_idle_total").increment(count as u64);
}

/// Ticks dropped because a pass was still running
pub fn record_skipped_ticks(count: u64) {
    counter!("sliding_expiry_skipped_ticks_total").increment(count);
}

/// Record a failed store call or a panicking listener
pub fn record_error(operation: &'static str) {
    counter!(
        "sliding_expiry_errors_total",
        "operation" => operation
    )
    .increment(1);
}

/// Record store call latency
pub fn record_store_latency(operation: &'static str, duration: Duration) {
    histogram!(
        "sliding_expiry_store_call_seconds",
        "operation" => operation
    )
    .record(duration.as_secs_f64());
}

/// Record a supervisor lifecycle transition
pub fn set_supervisor_state(state: &str) {
    counter!(
        "sliding_expiry_state_transitions_total",
        "state" => state.to_string()
    )
    .increment(1);
}

/// A timing guard that records store call latency on drop
pub struct LatencyTimer {
    operation: &'static str,
    start: Instant,
}

impl LatencyTimer {
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            start: Instant::now(),
        }
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        record_store_latency(self.operation, self.start.elapsed());
    }
}

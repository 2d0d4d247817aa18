// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! One sweep pass.
//!
//! ```text
//! list_keys(db) ─► idle_time(k) per key ─► candidates (idle >= TTL)
//!                                              │
//!                          ┌───────────────────┘
//!                          ▼
//!              get(k) ─► remove(k) ─► true?  ─► publish Expired event
//!                                     false? ─► suppressed (someone else won)
//! ```
//!
//! Store failures never abort the loop: enumeration failure ends the pass,
//! a per-key failure skips that key. Either way the next tick retries.

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::events::RemovalEvent;
use crate::metrics::LatencyTimer;
use crate::storage::traits::{KeyStore, StorageError};

use super::{CandidateKey, StoreOp, SweepContext, SweepFailure, SweepReport};

impl<S: KeyStore> SweepContext<S> {
    /// Run one pass and publish its report.
    #[tracing::instrument(skip(self), fields(database = self.config.database))]
    pub(crate) async fn run_cleanup(&self) -> SweepReport {
        let started = Instant::now();
        let pass = self
            .passes
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed)
            + 1;
        let mut report = SweepReport::new(pass);
        let ttl = self.config.sliding_expiration();

        let listed = {
            let _timer = LatencyTimer::new(StoreOp::ListKeys.as_str());
            self.store.list_keys(self.config.database).await
        };
        let keys = match listed {
            Ok(keys) => keys,
            Err(e) => {
                record_failure(&mut report, StoreOp::ListKeys, None, e);
                return self.finish(report, started);
            }
        };
        report.scanned = keys.len();

        let mut candidates = Vec::new();
        for key in keys {
            let idle = {
                let _timer = LatencyTimer::new(StoreOp::IdleTime.as_str());
                self.store.idle_time(&key).await
            };
            match idle {
                Ok(Some(idle_time)) if idle_time >= ttl => {
                    candidates.push(CandidateKey { key, idle_time });
                }
                Ok(Some(_)) => {}
                // Unknown idle time is never treated as stale
                Ok(None) => report.unknown_idle += 1,
                Err(e) => record_failure(&mut report, StoreOp::IdleTime, Some(key), e),
            }
        }
        report.candidates = candidates.len();

        for candidate in candidates {
            self.evict(candidate, &mut report).await;
        }

        self.finish(report, started)
    }

    async fn evict(&self, candidate: CandidateKey, report: &mut SweepReport) {
        let value = {
            let _timer = LatencyTimer::new(StoreOp::Get.as_str());
            self.store.get(&candidate.key).await
        };
        let value = match value {
            Ok(value) => value,
            Err(e) => {
                record_failure(report, StoreOp::Get, Some(candidate.key), e);
                return;
            }
        };

        let removed = {
            let _timer = LatencyTimer::new(StoreOp::Remove.as_str());
            self.store.remove(&candidate.key).await
        };
        match removed {
            Ok(true) => {
                debug!(
                    key = %candidate.key,
                    idle_time = ?candidate.idle_time,
                    "Evicted idle key"
                );
                report.evicted += 1;
                self.events
                    .publish(&RemovalEvent::expired(candidate.key, value));
            }
            Ok(false) => {
                debug!(key = %candidate.key, "Key already gone, event suppressed");
                report.suppressed += 1;
            }
            Err(e) => record_failure(report, StoreOp::Remove, Some(candidate.key), e),
        }
    }

    fn finish(&self, mut report: SweepReport, started: Instant) -> SweepReport {
        report.duration = started.elapsed();

        crate::metrics::record_pass(report.duration);
        crate::metrics::record_keys_scanned(report.scanned);
        crate::metrics::record_candidates(report.candidates);
        crate::metrics::record_evictions(report.evicted);
        crate::metrics::record_suppressed(report.suppressed);
        crate::metrics::record_unknown_idle(report.unknown_idle);

        if report.evicted > 0 || !report.is_clean() {
            info!(
                pass = report.pass,
                scanned = report.scanned,
                evicted = report.evicted,
                suppressed = report.suppressed,
                failures = report.failures.len(),
                duration_ms = report.duration.as_millis() as u64,
                "Sweep pass complete"
            );
        } else {
            debug!(
                pass = report.pass,
                scanned = report.scanned,
                unknown_idle = report.unknown_idle,
                "Sweep pass complete, nothing to evict"
            );
        }

        self.reports.send_replace(report.clone());
        report
    }
}

fn record_failure(
    report: &mut SweepReport,
    operation: StoreOp,
    key: Option<String>,
    error: StorageError,
) {
    warn!(
        operation = operation.as_str(),
        key = key.as_deref().unwrap_or("-"),
        error = %error,
        "Store call failed during sweep"
    );
    crate::metrics::record_error(operation.as_str());
    report.failures.push(SweepFailure {
        operation,
        key,
        error,
    });
}

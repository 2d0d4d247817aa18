// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;
use tokio::sync::watch;

use super::{Ticks, Timer, TimerError};

/// Timer whose ticks are fired by hand.
///
/// Lets callers (tests, or hosts with their own scheduler) decide exactly
/// when a sweep pass runs. Counts lifecycle calls so callers can check how
/// a supervisor drove it.
pub struct ManualTimer {
    tx: Mutex<Option<watch::Sender<u64>>>,
    template: watch::Receiver<u64>,
    started: AtomicBool,
    start_calls: AtomicUsize,
    dispose_calls: AtomicUsize,
}

impl ManualTimer {
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(0);
        Self {
            tx: Mutex::new(Some(tx)),
            template: rx,
            started: AtomicBool::new(false),
            start_calls: AtomicUsize::new(0),
            dispose_calls: AtomicUsize::new(0),
        }
    }

    /// Deliver one tick to every subscriber.
    ///
    /// Returns `false` (and delivers nothing) before start or after dispose.
    pub fn fire(&self) -> bool {
        if !self.started.load(Ordering::Acquire) {
            return false;
        }
        match self.tx.lock().as_ref() {
            Some(tx) => {
                tx.send_modify(|n| *n = n.wrapping_add(1));
                true
            }
            None => false,
        }
    }

    /// Live subscriptions (0 once disposed).
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx
            .lock()
            .as_ref()
            .map_or(0, |tx| tx.receiver_count().saturating_sub(1))
    }

    #[must_use]
    pub fn start_calls(&self) -> usize {
        self.start_calls.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn dispose_calls(&self) -> usize {
        self.dispose_calls.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }
}

impl Default for ManualTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer for ManualTimer {
    fn subscribe(&self) -> Ticks {
        Ticks::new(self.template.clone())
    }

    fn start(&self) -> Result<(), TimerError> {
        self.start_calls.fetch_add(1, Ordering::AcqRel);
        if self.tx.lock().is_none() {
            return Err(TimerError::Disposed);
        }
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(TimerError::AlreadyStarted);
        }
        Ok(())
    }

    fn dispose(&self) {
        self.dispose_calls.fetch_add(1, Ordering::AcqRel);
        self.started.store(false, Ordering::Release);
        self.tx.lock().take();
    }

    fn is_disposed(&self) -> bool {
        self.tx.lock().is_none()
    }
}

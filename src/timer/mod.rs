// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Repeating tick sources that drive sweep passes.
//!
//! ```text
//! ┌──────────────┐  send_modify(+1)  ┌───────────────────┐
//! │ Timer task   │ ────────────────► │ watch::Sender<u64> │
//! └──────────────┘                   └─────────┬─────────┘
//!                                              │ (one Receiver per subscriber)
//!                                   ┌──────────┴──────────┐
//!                                   ▼                     ▼
//!                                 Ticks                 Ticks
//! ```
//!
//! Ticks are a counter on a `watch` channel, so a subscriber that is busy
//! when ticks fire sees them coalesced into one pending notification, and
//! can drop even that with [`Ticks::skip_pending`]. A slow subscriber never
//! builds a backlog and never slows the timer or other subscribers down.
//!
//! Disposing a timer drops the sender: [`Ticks::next`] then returns `false`.

mod interval;
mod manual;

pub use interval::IntervalTimer;
pub use manual::ManualTimer;

use thiserror::Error;
use tokio::sync::watch;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerError {
    #[error("timer already started")]
    AlreadyStarted,
    #[error("timer has been disposed")]
    Disposed,
    #[error("timer must be started from within a tokio runtime")]
    NoRuntime,
}

/// A repeating scheduler delivering payload-free ticks to its subscribers.
pub trait Timer: Send + Sync {
    /// Register a new listener. Subscribing after dispose yields a
    /// [`Ticks`] that never fires.
    fn subscribe(&self) -> Ticks;

    /// Begin ticking. Fails once disposed.
    fn start(&self) -> Result<(), TimerError>;

    /// Stop ticking and release the scheduling resource. Idempotent.
    fn dispose(&self);

    fn is_disposed(&self) -> bool;
}

/// One subscriber's view of a timer's ticks.
#[derive(Debug)]
pub struct Ticks {
    rx: watch::Receiver<u64>,
    seen: u64,
}

impl Ticks {
    pub(crate) fn new(mut rx: watch::Receiver<u64>) -> Self {
        let seen = *rx.borrow_and_update();
        Self { rx, seen }
    }

    /// Wait for the next tick. Returns `false` once the timer is gone.
    pub async fn next(&mut self) -> bool {
        if self.rx.changed().await.is_err() {
            return false;
        }
        self.seen = *self.rx.borrow_and_update();
        true
    }

    /// Discard ticks delivered since the last [`next`](Self::next).
    ///
    /// Returns how many ticks were dropped.
    pub fn skip_pending(&mut self) -> u64 {
        let current = *self.rx.borrow_and_update();
        let skipped = current.wrapping_sub(self.seen);
        self.seen = current;
        skipped
    }
}

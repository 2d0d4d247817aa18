// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

use super::{Ticks, Timer, TimerError};

enum TimerState {
    Idle(watch::Sender<u64>),
    Running(JoinHandle<()>),
    Disposed,
}

/// Timer backed by `tokio::time::interval`.
///
/// The first tick fires one full period after [`start`](Timer::start).
/// Ticks missed because the runtime was stalled are skipped, not burst.
pub struct IntervalTimer {
    period: Duration,
    template: watch::Receiver<u64>,
    state: Mutex<TimerState>,
}

impl IntervalTimer {
    #[must_use]
    pub fn new(period: Duration) -> Self {
        let (tx, rx) = watch::channel(0);
        Self {
            period,
            template: rx,
            state: Mutex::new(TimerState::Idle(tx)),
        }
    }

    #[must_use]
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Total ticks fired since start.
    #[must_use]
    pub fn ticks_fired(&self) -> u64 {
        *self.template.borrow()
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        matches!(*self.state.lock(), TimerState::Running(_))
    }
}

impl Timer for IntervalTimer {
    fn subscribe(&self) -> Ticks {
        Ticks::new(self.template.clone())
    }

    fn start(&self) -> Result<(), TimerError> {
        let mut state = self.state.lock();
        match std::mem::replace(&mut *state, TimerState::Disposed) {
            TimerState::Idle(tx) => {
                let Ok(runtime) = Handle::try_current() else {
                    *state = TimerState::Idle(tx);
                    return Err(TimerError::NoRuntime);
                };

                let period = self.period;
                let task = runtime.spawn(async move {
                    let mut interval = interval_at(Instant::now() + period, period);
                    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
                    loop {
                        interval.tick().await;
                        tx.send_modify(|n| *n = n.wrapping_add(1));
                    }
                });

                debug!(period = ?period, "Interval timer started");
                *state = TimerState::Running(task);
                Ok(())
            }
            running @ TimerState::Running(_) => {
                *state = running;
                Err(TimerError::AlreadyStarted)
            }
            TimerState::Disposed => Err(TimerError::Disposed),
        }
    }

    fn dispose(&self) {
        let previous = std::mem::replace(&mut *self.state.lock(), TimerState::Disposed);
        match previous {
            TimerState::Running(task) => {
                task.abort();
                debug!("Interval timer disposed");
            }
            // Dropping the idle sender closes the channel for subscribers
            TimerState::Idle(_) | TimerState::Disposed => {}
        }
    }

    fn is_disposed(&self) -> bool {
        matches!(*self.state.lock(), TimerState::Disposed)
    }
}

impl Drop for IntervalTimer {
    fn drop(&mut self) {
        self.dispose();
    }
}

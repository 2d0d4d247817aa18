// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Supervisor lifecycle: start, dispose, shutdown and the tick loop.

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::storage::traits::KeyStore;
use crate::timer::{Ticks, TimerError};

use super::{EvictionSupervisor, Lifecycle, SupervisorError, SupervisorState, SweepContext};

impl<S: KeyStore + 'static> EvictionSupervisor<S> {
    /// Subscribe to the timer and start it.
    ///
    /// Every later tick triggers one sweep pass. Ticks that fire while a
    /// pass is running are dropped, so passes never overlap.
    ///
    /// Fails with [`SupervisorError::AlreadyStarted`] when running and
    /// [`SupervisorError::Disposed`] once disposed. If the timer refuses to
    /// start, the supervisor stays `Created` and no subscription is kept.
    #[tracing::instrument(skip(self), fields(database = self.context.config.database))]
    pub fn start(&self) -> Result<(), SupervisorError> {
        let mut lifecycle = self.lifecycle.lock();
        match *lifecycle {
            Lifecycle::Created => {}
            Lifecycle::Running(_) => return Err(SupervisorError::AlreadyStarted),
            Lifecycle::Disposed(_) => return Err(SupervisorError::Disposed),
        }

        let runtime = Handle::try_current().map_err(|_| TimerError::NoRuntime)?;

        // Subscribe first so the first tick cannot slip past us
        let ticks = self.timer.subscribe();
        self.timer.start()?;

        let task = runtime.spawn(run_loop(
            Arc::clone(&self.context),
            ticks,
            self.shutdown.subscribe(),
        ));
        *lifecycle = Lifecycle::Running(task);
        drop(lifecycle);

        self.state.send_replace(SupervisorState::Running);
        crate::metrics::set_supervisor_state("Running");
        info!(
            sliding_expiration = ?self.context.config.sliding_expiration(),
            scan_interval = ?self.context.config.scan_interval(),
            "Eviction supervisor started"
        );
        Ok(())
    }

    /// Unsubscribe from the timer and dispose it. Idempotent.
    ///
    /// A pass already running finishes (and may still publish events);
    /// no new pass starts afterwards.
    pub fn dispose(&self) {
        let mut lifecycle = self.lifecycle.lock();
        match std::mem::replace(&mut *lifecycle, Lifecycle::Disposed(None)) {
            Lifecycle::Disposed(task) => {
                *lifecycle = Lifecycle::Disposed(task);
                return;
            }
            Lifecycle::Running(task) => *lifecycle = Lifecycle::Disposed(Some(task)),
            Lifecycle::Created => {}
        }
        drop(lifecycle);

        self.shutdown.send_replace(true);
        self.timer.dispose();

        self.state.send_replace(SupervisorState::Disposed);
        crate::metrics::set_supervisor_state("Disposed");
        info!(database = self.context.config.database, "Eviction supervisor disposed");
    }

    /// Dispose, then wait for an in-flight pass to finish.
    #[tracing::instrument(skip(self))]
    pub async fn shutdown(&self) {
        self.dispose();

        let task = match &mut *self.lifecycle.lock() {
            Lifecycle::Disposed(task) => task.take(),
            _ => None,
        };

        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, "Sweep loop ended abnormally");
            }
        }
        debug!("Eviction supervisor shut down");
    }
}

/// One pass per tick until disposed or the timer goes away.
async fn run_loop<S: KeyStore + 'static>(
    context: Arc<SweepContext<S>>,
    mut ticks: Ticks,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            biased;

            _ = shutdown.changed() => break,

            alive = ticks.next() => {
                if !alive {
                    debug!("Timer closed, stopping sweep loop");
                    break;
                }
            }
        }

        // A tick and dispose can land together; dispose wins
        if *shutdown.borrow() {
            break;
        }

        context.run_cleanup().await;

        let skipped = ticks.skip_pending();
        if skipped > 0 {
            debug!(skipped, "Dropped ticks that fired during the pass");
            crate::metrics::record_skipped_ticks(skipped);
        }
    }
    debug!("Sweep loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EvictionConfig;
    use crate::storage::memory::InMemoryStore;
    use crate::timer::{IntervalTimer, ManualTimer, Timer};
    use std::time::Duration;

    fn config() -> EvictionConfig {
        EvictionConfig::new(Duration::from_millis(1000), Duration::from_millis(100))
    }

    fn supervisor_with(timer: Arc<ManualTimer>) -> EvictionSupervisor<InMemoryStore<u32>> {
        EvictionSupervisor::builder(Arc::new(InMemoryStore::new()), config())
            .timer(timer)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_start_subscribes_and_starts_timer() {
        let timer = Arc::new(ManualTimer::new());
        let supervisor = supervisor_with(timer.clone());

        supervisor.start().unwrap();

        assert_eq!(supervisor.state(), SupervisorState::Running);
        assert_eq!(timer.start_calls(), 1);
        assert_eq!(timer.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn test_start_twice_fails_without_second_subscription() {
        let timer = Arc::new(ManualTimer::new());
        let supervisor = supervisor_with(timer.clone());

        supervisor.start().unwrap();
        assert_eq!(supervisor.start(), Err(SupervisorError::AlreadyStarted));

        assert_eq!(timer.start_calls(), 1);
        assert_eq!(timer.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn test_one_pass_per_tick() {
        let timer = Arc::new(ManualTimer::new());
        let supervisor = supervisor_with(timer.clone());
        let mut reports = supervisor.reports();
        supervisor.start().unwrap();

        assert!(timer.fire());
        reports.changed().await.unwrap();
        assert_eq!(reports.borrow_and_update().pass, 1);

        assert!(timer.fire());
        reports.changed().await.unwrap();
        assert_eq!(reports.borrow_and_update().pass, 2);
    }

    #[tokio::test]
    async fn test_dispose_without_start() {
        let timer = Arc::new(ManualTimer::new());
        let supervisor = supervisor_with(timer.clone());

        supervisor.dispose();

        assert_eq!(supervisor.state(), SupervisorState::Disposed);
        assert!(timer.is_disposed());
        assert_eq!(supervisor.start(), Err(SupervisorError::Disposed));
        assert_eq!(timer.start_calls(), 0);
    }

    #[tokio::test]
    async fn test_dispose_is_idempotent() {
        let timer = Arc::new(ManualTimer::new());
        let supervisor = supervisor_with(timer.clone());
        supervisor.start().unwrap();

        supervisor.dispose();
        supervisor.dispose();
        supervisor.shutdown().await;

        assert_eq!(timer.dispose_calls(), 1);
        assert_eq!(supervisor.state(), SupervisorState::Disposed);
    }

    #[tokio::test]
    async fn test_shutdown_stops_passes() {
        let timer = Arc::new(ManualTimer::new());
        let supervisor = supervisor_with(timer.clone());
        let reports = supervisor.reports();
        supervisor.start().unwrap();

        supervisor.shutdown().await;

        assert!(!timer.fire());
        assert_eq!(timer.subscriber_count(), 0);
        assert_eq!(reports.borrow().pass, 0);
    }

    #[tokio::test]
    async fn test_drop_disposes_timer() {
        let timer = Arc::new(ManualTimer::new());
        let supervisor = supervisor_with(timer.clone());
        supervisor.start().unwrap();

        drop(supervisor);

        assert!(timer.is_disposed());
        assert_eq!(timer.dispose_calls(), 1);
    }

    #[tokio::test]
    async fn test_timer_refusing_start_leaves_supervisor_created() {
        let timer = Arc::new(ManualTimer::new());
        timer.dispose();
        let supervisor = supervisor_with(timer.clone());

        let err = supervisor.start().unwrap_err();

        assert_eq!(err, SupervisorError::Timer(TimerError::Disposed));
        assert_eq!(supervisor.state(), SupervisorState::Created);
    }

    #[test]
    fn test_start_outside_runtime_fails() {
        let timer = Arc::new(ManualTimer::new());
        let supervisor = supervisor_with(timer.clone());

        assert_eq!(
            supervisor.start(),
            Err(SupervisorError::Timer(TimerError::NoRuntime))
        );
        assert_eq!(timer.start_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_scanning_before_start() {
        let timer = Arc::new(IntervalTimer::new(Duration::from_millis(100)));
        let store: Arc<InMemoryStore<u32>> = Arc::new(InMemoryStore::new());
        let supervisor = EvictionSupervisor::builder(store, config())
            .timer(timer.clone())
            .build()
            .unwrap();

        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(timer.ticks_fired(), 0);
        assert_eq!(supervisor.reports().borrow().pass, 0);
    }

    #[tokio::test]
    async fn test_state_receiver_sees_transitions() {
        let timer = Arc::new(ManualTimer::new());
        let supervisor = supervisor_with(timer);
        let mut states = supervisor.state_receiver();
        assert_eq!(*states.borrow_and_update(), SupervisorState::Created);

        supervisor.start().unwrap();
        assert_eq!(*states.borrow_and_update(), SupervisorState::Running);

        supervisor.dispose();
        assert_eq!(*states.borrow_and_update(), SupervisorState::Disposed);
    }
}

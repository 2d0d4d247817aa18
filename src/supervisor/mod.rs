// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Eviction supervisor.
//!
//! The [`EvictionSupervisor`] binds one [`KeyStore`], one [`EvictionConfig`]
//! and one [`Timer`]. On every tick it runs a sweep pass: enumerate the
//! configured database, keep the keys whose idle time reached the sliding
//! expiration, then read, delete and announce each one.
//!
//! # Lifecycle
//!
//! ```text
//! Created → Running → Disposed
//! ```
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use sliding_expiry::{
//!     EvictionConfig, EvictionSupervisor, InMemoryStore, ManualTimer, SupervisorState,
//! };
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let store: Arc<InMemoryStore<String>> = Arc::new(InMemoryStore::new());
//! let timer = Arc::new(ManualTimer::new());
//! let config = EvictionConfig::new(Duration::from_secs(30), Duration::from_secs(1));
//!
//! let supervisor = EvictionSupervisor::builder(store, config)
//!     .timer(timer.clone())
//!     .build()
//!     .unwrap();
//! assert_eq!(supervisor.state(), SupervisorState::Created);
//!
//! supervisor.start().unwrap();
//! assert_eq!(supervisor.state(), SupervisorState::Running);
//!
//! supervisor.shutdown().await;
//! assert_eq!(supervisor.state(), SupervisorState::Disposed);
//! # }
//! ```

mod lifecycle;
mod sweep;
mod types;

pub use types::{
    CandidateKey, StoreOp, SupervisorError, SupervisorState, SweepFailure, SweepReport,
};

use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::{ConfigError, EvictionConfig};
use crate::events::RemovalEventBus;
use crate::storage::traits::KeyStore;
use crate::timer::{IntervalTimer, Timer};

/// Everything a sweep pass needs, shared with the background loop.
pub(crate) struct SweepContext<S: KeyStore> {
    pub(crate) store: Arc<S>,
    pub(crate) config: Arc<EvictionConfig>,
    pub(crate) events: Arc<RemovalEventBus<S::Value>>,
    pub(crate) reports: watch::Sender<SweepReport>,
    pub(crate) passes: AtomicU64,
}

pub(super) enum Lifecycle {
    Created,
    Running(JoinHandle<()>),
    /// Holds the loop task until someone awaits it
    Disposed(Option<JoinHandle<()>>),
}

/// Sliding-expiration supervisor for one store namespace.
///
/// Dropping the supervisor disposes it. A pass already in progress still
/// runs to completion; use [`shutdown`](Self::shutdown) to wait for it.
pub struct EvictionSupervisor<S: KeyStore + 'static> {
    pub(super) context: Arc<SweepContext<S>>,
    pub(super) timer: Arc<dyn Timer>,
    pub(super) lifecycle: Mutex<Lifecycle>,
    pub(super) state: watch::Sender<SupervisorState>,
    pub(super) shutdown: watch::Sender<bool>,
}

impl<S: KeyStore + 'static> EvictionSupervisor<S> {
    /// Supervisor with a private event bus and an [`IntervalTimer`] ticking
    /// every `config.scan_interval()`.
    pub fn new(store: Arc<S>, config: EvictionConfig) -> Result<Self, ConfigError> {
        Self::builder(store, config).build()
    }

    pub fn builder(store: Arc<S>, config: EvictionConfig) -> SupervisorBuilder<S> {
        SupervisorBuilder {
            store,
            config,
            timer: None,
            events: None,
        }
    }

    #[must_use]
    pub fn state(&self) -> SupervisorState {
        *self.state.borrow()
    }

    /// Get a receiver for lifecycle transitions
    pub fn state_receiver(&self) -> watch::Receiver<SupervisorState> {
        self.state.subscribe()
    }

    /// Bus that receives one [`RemovalEvent`](crate::RemovalEvent) per eviction.
    pub fn events(&self) -> &Arc<RemovalEventBus<S::Value>> {
        &self.context.events
    }

    /// Latest completed pass. Holds a default report (`pass == 0`) until
    /// the first pass ends.
    pub fn reports(&self) -> watch::Receiver<SweepReport> {
        self.context.reports.subscribe()
    }

    #[must_use]
    pub fn config(&self) -> &EvictionConfig {
        &self.context.config
    }

    #[must_use]
    pub fn store(&self) -> &Arc<S> {
        &self.context.store
    }
}

impl<S: KeyStore + 'static> Drop for EvictionSupervisor<S> {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Builder for [`EvictionSupervisor`].
pub struct SupervisorBuilder<S: KeyStore + 'static> {
    store: Arc<S>,
    config: EvictionConfig,
    timer: Option<Arc<dyn Timer>>,
    events: Option<Arc<RemovalEventBus<S::Value>>>,
}

impl<S: KeyStore + 'static> SupervisorBuilder<S> {
    /// Use `timer` instead of an interval timer built from the config.
    ///
    /// The supervisor takes over its lifecycle: it starts the timer on
    /// [`start`](EvictionSupervisor::start) and disposes it on dispose.
    #[must_use]
    pub fn timer(mut self, timer: Arc<dyn Timer>) -> Self {
        self.timer = Some(timer);
        self
    }

    /// Publish into a shared bus, e.g. one bus for several supervisors.
    #[must_use]
    pub fn events(mut self, events: Arc<RemovalEventBus<S::Value>>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn build(self) -> Result<EvictionSupervisor<S>, ConfigError> {
        self.config.validate()?;

        let timer: Arc<dyn Timer> = match self.timer {
            Some(timer) => timer,
            None => Arc::new(IntervalTimer::new(self.config.scan_interval())),
        };
        let events = self.events.unwrap_or_default();
        let (reports, _) = watch::channel(SweepReport::default());
        let (state, _) = watch::channel(SupervisorState::Created);
        let (shutdown, _) = watch::channel(false);

        Ok(EvictionSupervisor {
            context: Arc::new(SweepContext {
                store: self.store,
                config: Arc::new(self.config),
                events,
                reports,
                passes: AtomicU64::new(0),
            }),
            timer,
            lifecycle: Mutex::new(Lifecycle::Created),
            state,
            shutdown,
        })
    }
}

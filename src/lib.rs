//! # Sliding Expiry
//!
//! Sliding-expiration eviction for key-value stores that only offer
//! absolute TTLs.
//!
//! An [`EvictionSupervisor`] periodically sweeps one logical database of a
//! store and deletes every key that nobody has read or written for longer
//! than the configured sliding expiration. Each deletion is announced once,
//! with the key and its last value, on a [`RemovalEventBus`].
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   tick   ┌─────────────────────────────────────────────┐
//! │ Timer        │ ───────► │ EvictionSupervisor                          │
//! │ (interval /  │          │  1. list_keys(database)                     │
//! │  manual)     │          │  2. idle_time(k) for each key               │
//! └──────────────┘          │  3. candidates: idle >= sliding expiration  │
//!                           │  4. get(k), then remove(k)                  │
//!                           │  5. publish iff remove(k) returned true     │
//!                           └───────────────┬──────────────┬──────────────┘
//!                                           │              │
//!                                           ▼              ▼
//!                              ┌──────────────────┐  ┌──────────────────┐
//!                              │ KeyStore         │  │ RemovalEventBus  │
//!                              │ (Redis / memory) │  │ (listeners)      │
//!                              └──────────────────┘  └──────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use sliding_expiry::{EvictionConfig, EvictionSupervisor, RedisStore, RemovalEvent};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = EvictionConfig {
//!         redis_url: Some("redis://localhost:6379".into()),
//!         redis_prefix: Some("sessions:".into()),
//!         sliding_expiration_ms: 20 * 60 * 1000,
//!         scan_interval_ms: 5_000,
//!         ..Default::default()
//!     };
//!
//!     let store = Arc::new(RedisStore::from_config(&config).await.expect("Redis unavailable"));
//!     let supervisor = EvictionSupervisor::new(store, config).expect("Invalid config");
//!
//!     supervisor.events().subscribe(|event: &RemovalEvent<Vec<u8>>| {
//!         println!("session {} expired", event.key);
//!     });
//!
//!     supervisor.start().expect("Failed to start");
//!
//!     // ... serve traffic ...
//!
//!     supervisor.shutdown().await;
//! }
//! ```
//!
//! ## Guarantees
//!
//! - A key is only evicted once its reported idle time reached the sliding
//!   expiration. Keys whose idle time is unknown are never evicted.
//! - At most one event per actual deletion, even when several supervisors
//!   sweep the same store: only the one whose delete hit publishes.
//! - Passes of one supervisor never overlap; ticks that fire during a pass
//!   are dropped.
//! - Store failures are logged and counted, never fatal. The next tick
//!   simply tries again.
//!
//! ## Modules
//!
//! - [`supervisor`]: the [`EvictionSupervisor`] and its sweep pass
//! - [`storage`]: the [`KeyStore`] contract with Redis and in-memory backends
//! - [`timer`]: tick sources ([`IntervalTimer`], [`ManualTimer`])
//! - [`events`]: removal notifications
//! - [`config`]: [`EvictionConfig`] and validation
//! - [`resilience`]: retry with backoff for store calls
//! - [`metrics`]: `metrics` crate instrumentation

pub mod config;
pub mod events;
pub mod metrics;
pub mod resilience;
pub mod storage;
pub mod supervisor;
pub mod timer;

pub use config::{ConfigError, EvictionConfig};
pub use events::{RemovalEvent, RemovalEventBus, RemovalListener, RemovalReason, SubscriptionId};
pub use resilience::retry::RetryConfig;
pub use storage::memory::InMemoryStore;
pub use storage::redis::RedisStore;
pub use storage::traits::{KeyStore, StorageError};
pub use supervisor::{
    CandidateKey, EvictionSupervisor, StoreOp, SupervisorBuilder, SupervisorError,
    SupervisorState, SweepFailure, SweepReport,
};
pub use timer::{IntervalTimer, ManualTimer, Ticks, Timer, TimerError};

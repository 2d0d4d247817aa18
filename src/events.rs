// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Removal notifications.
//!
//! # Example
//! ```
//! use sliding_expiry::{RemovalEvent, RemovalEventBus, RemovalReason};
//! use std::sync::{Arc, Mutex};
//!
//! let bus: RemovalEventBus<u32> = RemovalEventBus::new();
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let sink = Arc::clone(&seen);
//!
//! let id = bus.subscribe(move |event: &RemovalEvent<u32>| {
//!     sink.lock().unwrap().push((event.key.clone(), event.value));
//! });
//!
//! bus.publish(&RemovalEvent::expired("session:1", Some(7)));
//! assert_eq!(*seen.lock().unwrap(), vec![("session:1".to_string(), Some(7))]);
//!
//! assert!(bus.unsubscribe(id));
//! bus.publish(&RemovalEvent::expired("session:2", None));
//! assert_eq!(seen.lock().unwrap().len(), 1);
//! ```

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::error;

/// Why an entry left the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RemovalReason {
    /// Idle longer than the sliding expiration; the only reason a
    /// supervisor ever reports.
    Expired,
    /// Removed by someone other than the supervisor.
    ExternallyRemoved,
    /// Removed as part of clearing the whole namespace.
    Cleared,
}

impl std::fmt::Display for RemovalReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Expired => write!(f, "Expired"),
            Self::ExternallyRemoved => write!(f, "ExternallyRemoved"),
            Self::Cleared => write!(f, "Cleared"),
        }
    }
}

/// One removal, as seen by the component that performed it.
#[derive(Clone, Debug, PartialEq)]
pub struct RemovalEvent<V> {
    pub key: String,
    /// Value read just before deletion. May be stale relative to concurrent
    /// writers; `None` if the read found nothing but the delete still hit.
    pub value: Option<V>,
    pub reason: RemovalReason,
    pub timestamp: SystemTime,
}

impl<V> RemovalEvent<V> {
    #[must_use]
    pub fn new(key: impl Into<String>, value: Option<V>, reason: RemovalReason) -> Self {
        Self {
            key: key.into(),
            value,
            reason,
            timestamp: SystemTime::now(),
        }
    }

    #[must_use]
    pub fn expired(key: impl Into<String>, value: Option<V>) -> Self {
        Self::new(key, value, RemovalReason::Expired)
    }
}

/// Receives every event published on a [`RemovalEventBus`].
///
/// Called synchronously from the publishing task. Keep it short and never
/// block on the supervisor publishing into the bus. A panic is caught at
/// the bus and logged; it never reaches the sweep loop.
pub trait RemovalListener<V>: Send + Sync + 'static {
    fn on_removed(&self, event: &RemovalEvent<V>);
}

impl<V, F> RemovalListener<V> for F
where
    F: Fn(&RemovalEvent<V>) + Send + Sync + 'static,
{
    fn on_removed(&self, event: &RemovalEvent<V>) {
        self(event)
    }
}

/// Handle returned by [`RemovalEventBus::subscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// In-process publish/subscribe channel for [`RemovalEvent`]s.
///
/// Share one bus (behind an `Arc`) between several supervisors to get a
/// single process-wide notification stream.
pub struct RemovalEventBus<V> {
    listeners: RwLock<Vec<(SubscriptionId, Arc<dyn RemovalListener<V>>)>>,
    next_id: AtomicU64,
}

impl<V: Clone + Send + Sync + 'static> RemovalEventBus<V> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn subscribe<L: RemovalListener<V>>(&self, listener: L) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, Arc::new(listener)));
        id
    }

    /// Subscribe through an unbounded channel, for async consumers.
    ///
    /// The subscription lapses on the first publish after the receiver
    /// is dropped.
    pub fn subscribe_channel(self: &Arc<Self>) -> mpsc::UnboundedReceiver<RemovalEvent<V>> {
        let (tx, rx) = mpsc::unbounded_channel();
        let bus = Arc::downgrade(self);
        let id = Arc::new(AtomicU64::new(0));
        let own_id = Arc::clone(&id);

        let subscription = self.subscribe(move |event: &RemovalEvent<V>| {
            if tx.send(event.clone()).is_err() {
                if let Some(bus) = bus.upgrade() {
                    bus.unsubscribe(SubscriptionId(own_id.load(Ordering::Acquire)));
                }
            }
        });
        id.store(subscription.0, Ordering::Release);
        rx
    }

    /// Returns `false` if `id` was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    /// Deliver `event` to every current subscriber before returning.
    ///
    /// A listener that panics is logged and skipped; the remaining
    /// listeners still see the event and the caller carries on.
    pub fn publish(&self, event: &RemovalEvent<V>) {
        // Snapshot so listeners may (un)subscribe from inside the callback
        let listeners: Vec<_> = self
            .listeners
            .read()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in listeners {
            let delivered = panic::catch_unwind(AssertUnwindSafe(|| listener.on_removed(event)));
            if let Err(payload) = delivered {
                error!(
                    key = %event.key,
                    panic = panic_message(&*payload),
                    "Removal listener panicked"
                );
                crate::metrics::record_error("listener");
            }
        }
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.listeners.read().len()
    }
}

impl<V: Clone + Send + Sync + 'static> Default for RemovalEventBus<V> {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg
    } else {
        "<non-string panic>"
    }
}

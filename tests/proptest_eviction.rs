//! Property-based tests for the eviction decision.
//!
//! Uses proptest to generate random key populations, idle times and write
//! histories, then checks a single sweep pass evicts exactly the stale keys
//! and announces each of them exactly once.
//!
//! Run with: `cargo test --test proptest_eviction`

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use proptest::prelude::*;

use sliding_expiry::{
    EvictionConfig, EvictionSupervisor, InMemoryStore, KeyStore, ManualTimer, RemovalEvent,
    RemovalEventBus, StorageError, SweepReport,
};

// =============================================================================
// Fixtures
// =============================================================================

/// Store whose idle times are whatever the test says they are.
struct FixedIdleStore {
    entries: Mutex<HashMap<String, (u32, Option<Duration>)>>,
}

#[async_trait]
impl KeyStore for FixedIdleStore {
    type Value = u32;

    async fn list_keys(&self, _database: i64) -> Result<Vec<String>, StorageError> {
        Ok(self.entries.lock().keys().cloned().collect())
    }

    async fn idle_time(&self, key: &str) -> Result<Option<Duration>, StorageError> {
        Ok(self.entries.lock().get(key).and_then(|(_, idle)| *idle))
    }

    async fn get(&self, key: &str) -> Result<Option<u32>, StorageError> {
        Ok(self.entries.lock().get(key).map(|(value, _)| *value))
    }

    async fn remove(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.entries.lock().remove(key).is_some())
    }
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .start_paused(true)
        .build()
        .expect("failed to build runtime")
}

type Seen = Arc<Mutex<Vec<RemovalEvent<u32>>>>;

fn collect(bus: &RemovalEventBus<u32>) -> Seen {
    let seen: Seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    bus.subscribe(move |event: &RemovalEvent<u32>| sink.lock().push(event.clone()));
    seen
}

/// Start `supervisor` on `timer`, run exactly one pass and return its report.
async fn one_pass<S: KeyStore + 'static>(
    supervisor: &EvictionSupervisor<S>,
    timer: &ManualTimer,
) -> SweepReport {
    let mut reports = supervisor.reports();
    supervisor.start().unwrap();
    assert!(timer.fire());
    reports.changed().await.unwrap();
    let report = reports.borrow_and_update().clone();
    report
}

// =============================================================================
// Strategies
// =============================================================================

/// Idle time in ms, `None` meaning the store cannot tell.
fn idle_strategy() -> impl Strategy<Value = Option<u64>> {
    prop_oneof![
        1 => Just(None),
        4 => (0u64..4_000).prop_map(Some),
    ]
}

fn population_strategy() -> impl Strategy<Value = BTreeMap<String, (u32, Option<u64>)>> {
    prop::collection::btree_map("[a-z]{1,6}(:[0-9]{1,3})?", (any::<u32>(), idle_strategy()), 0..40)
}

/// Writes as (key index, ms to wait before writing).
fn history_strategy() -> impl Strategy<Value = Vec<(usize, u64)>> {
    prop::collection::vec((0usize..8, 0u64..600), 0..30)
}

// =============================================================================
// Eviction Decision
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_pass_evicts_exactly_stale_keys(
        population in population_strategy(),
        ttl_ms in 1u64..4_000,
    ) {
        let expected: BTreeSet<String> = population
            .iter()
            .filter(|(_, (_, idle))| matches!(idle, Some(ms) if *ms >= ttl_ms))
            .map(|(key, _)| key.clone())
            .collect();

        let store = Arc::new(FixedIdleStore {
            entries: Mutex::new(
                population
                    .iter()
                    .map(|(k, (v, idle))| (k.clone(), (*v, idle.map(Duration::from_millis))))
                    .collect(),
            ),
        });

        let (report, events) = runtime().block_on(async {
            let timer = Arc::new(ManualTimer::new());
            let config = EvictionConfig::new(Duration::from_millis(ttl_ms), Duration::from_millis(100));
            let supervisor = EvictionSupervisor::builder(Arc::clone(&store), config)
                .timer(timer.clone())
                .build()
                .unwrap();
            let seen = collect(supervisor.events());
            let report = one_pass(&supervisor, &timer).await;
            supervisor.shutdown().await;
            let events = seen.lock().clone();
            (report, events)
        });

        let announced: BTreeSet<String> = events.iter().map(|e| e.key.clone()).collect();
        prop_assert_eq!(&announced, &expected);
        prop_assert_eq!(events.len(), expected.len());
        prop_assert_eq!(report.evicted, expected.len());
        prop_assert_eq!(report.scanned, population.len());

        for event in &events {
            prop_assert_eq!(event.value, Some(population[&event.key].0));
        }

        let remaining = store.entries.lock();
        for key in population.keys() {
            prop_assert_eq!(remaining.contains_key(key), !expected.contains(key));
        }
    }

    #[test]
    fn prop_latest_write_sets_the_deadline(
        history in history_strategy(),
        tail_ms in 0u64..2_000,
    ) {
        const TTL_MS: u64 = 1_000;

        let (evicted, stale, remaining, expected_remaining) = runtime().block_on(async {
            let store: Arc<InMemoryStore<u32>> = Arc::new(InMemoryStore::new());
            let mut last_write: HashMap<String, u64> = HashMap::new();
            let mut now = 0u64;

            for (i, (key, wait)) in history.iter().enumerate() {
                tokio::time::advance(Duration::from_millis(*wait)).await;
                now += wait;
                let key = format!("key-{}", key);
                store.put(key.clone(), i as u32);
                last_write.insert(key, now);
            }
            tokio::time::advance(Duration::from_millis(tail_ms)).await;
            now += tail_ms;

            let timer = Arc::new(ManualTimer::new());
            let config = EvictionConfig::new(Duration::from_millis(TTL_MS), Duration::from_millis(100));
            let supervisor = EvictionSupervisor::builder(Arc::clone(&store), config)
                .timer(timer.clone())
                .build()
                .unwrap();
            let seen = collect(supervisor.events());
            one_pass(&supervisor, &timer).await;
            supervisor.shutdown().await;

            let evicted: BTreeSet<String> = seen.lock().iter().map(|e| e.key.clone()).collect();
            let expected_remaining: BTreeSet<String> = last_write
                .iter()
                .filter(|(_, written)| now - **written < TTL_MS)
                .map(|(key, _)| key.clone())
                .collect();
            let stale: BTreeSet<String> = last_write
                .keys()
                .filter(|key| !expected_remaining.contains(*key))
                .cloned()
                .collect();
            let remaining: BTreeSet<String> = store.list_keys(0).await.unwrap().into_iter().collect();
            (evicted, stale, remaining, expected_remaining)
        });

        prop_assert_eq!(evicted, stale);
        prop_assert_eq!(remaining, expected_remaining);
    }

    #[test]
    fn prop_racing_supervisors_announce_once(
        keys in prop::collection::btree_set("[a-z]{1,8}", 0..30),
        supervisors in 2usize..5,
    ) {
        let events = runtime().block_on(async {
            let store: Arc<InMemoryStore<u32>> = Arc::new(InMemoryStore::new());
            for key in &keys {
                store.put(key.clone(), 1);
            }
            tokio::time::advance(Duration::from_millis(1_500)).await;

            let bus = Arc::new(RemovalEventBus::new());
            let seen = collect(&bus);
            let config = EvictionConfig::new(Duration::from_millis(1_000), Duration::from_millis(100));

            let mut running = Vec::new();
            for _ in 0..supervisors {
                let timer = Arc::new(ManualTimer::new());
                let supervisor = EvictionSupervisor::builder(Arc::clone(&store), config.clone())
                    .timer(timer.clone())
                    .events(Arc::clone(&bus))
                    .build()
                    .unwrap();
                let reports = supervisor.reports();
                supervisor.start().unwrap();
                running.push((supervisor, timer, reports));
            }

            // Fire every timer before any pass runs
            for (_, timer, _) in &running {
                assert!(timer.fire());
            }
            for (_, _, reports) in &mut running {
                reports.changed().await.unwrap();
            }

            let events = seen.lock().clone();
            events
        });

        let announced: Vec<String> = events.iter().map(|e| e.key.clone()).collect();
        let unique: BTreeSet<String> = announced.iter().cloned().collect();
        prop_assert_eq!(announced.len(), keys.len());
        prop_assert_eq!(unique, keys);
    }
}

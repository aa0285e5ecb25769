//! Shared satellite store.
//!
//! Multiplexes any number of observers onto a single upstream `satellites`
//! subscription and keeps the latest satellite snapshot readable without
//! waiting for an event.
//!
//! - The upstream listener is added when the first observer subscribes and
//!   removed when the last one leaves.
//! - The snapshot is replaced wholesale on every batch and survives teardown.
//! - Observers are notified after the snapshot has been replaced, from a copy
//!   of the observer set taken when the batch arrived.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};

use gnss_common::events::EVENT_SATELLITES;
use gnss_common::{GnssEvent, SatelliteRecord};

use crate::lock;
use crate::source::{EventSource, Listener, Subscription};

/// Immutable list of the satellites seen in the most recent update
pub type Snapshot = Arc<[SatelliteRecord]>;

type ChangeCallback = Arc<dyn Fn() + Send + Sync>;

struct StoreInner {
    source: Box<dyn EventSource>,
    snapshot: RwLock<Snapshot>,
    observers: Mutex<HashMap<u64, ChangeCallback>>,
    /// Also serializes activation and teardown
    upstream: Mutex<Option<Box<dyn Subscription>>>,
    /// Cleared under the snapshot write lock before teardown
    accepting: AtomicBool,
    next_id: AtomicU64,
}

/// Handle to a store; clones share the same observers and snapshot
#[derive(Clone)]
pub struct SatelliteStore {
    inner: Arc<StoreInner>,
}

impl SatelliteStore {
    pub fn new(source: impl EventSource + 'static) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                source: Box::new(source),
                snapshot: RwLock::new(Arc::from(Vec::new())),
                observers: Mutex::new(HashMap::new()),
                upstream: Mutex::new(None),
                accepting: AtomicBool::new(false),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Register `on_change` to run after every snapshot update.
    ///
    /// The first observer activates the upstream subscription. Dropping or
    /// calling the returned handle removes the observer again.
    pub fn subscribe(&self, on_change: impl Fn() + Send + Sync + 'static) -> Unsubscribe {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);

        let mut upstream = lock(&self.inner.upstream);
        lock(&self.inner.observers).insert(id, Arc::new(on_change));

        if upstream.is_none() {
            tracing::debug!("First observer registered, activating upstream satellite subscription");
            let listener = Self::upstream_listener(Arc::downgrade(&self.inner));
            self.inner.accepting.store(true, Ordering::SeqCst);
            *upstream = Some(self.inner.source.add_listener(EVENT_SATELLITES, listener));
        }

        Unsubscribe {
            store: Arc::downgrade(&self.inner),
            id,
            done: AtomicBool::new(false),
        }
    }

    /// Current snapshot; empty until the first update arrives
    pub fn get_snapshot(&self) -> Snapshot {
        self.inner.get_snapshot()
    }

    /// Subscribe with a render function that receives the fresh snapshot on every change
    pub fn watch(&self, render: impl Fn(&Snapshot) + Send + Sync + 'static) -> Unsubscribe {
        let store = Arc::downgrade(&self.inner);
        self.subscribe(move || {
            if let Some(store) = store.upgrade() {
                render(&store.get_snapshot());
            }
        })
    }

    pub fn is_active(&self) -> bool {
        lock(&self.inner.upstream).is_some()
    }

    pub fn observer_count(&self) -> usize {
        lock(&self.inner.observers).len()
    }

    fn upstream_listener(store: Weak<StoreInner>) -> Listener {
        Arc::new(move |event: &GnssEvent| {
            let GnssEvent::Satellites(batch) = event else {
                return;
            };
            if let Some(store) = store.upgrade() {
                store.publish(Arc::from(batch.satellites.as_slice()));
            }
        })
    }
}

/// Render-time read of the store, the counterpart of [`SatelliteStore::watch`]
pub fn use_satellites(store: &SatelliteStore) -> Snapshot {
    store.get_snapshot()
}

impl StoreInner {
    fn get_snapshot(&self) -> Snapshot {
        self.snapshot
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Batches still in flight when the upstream subscription is torn down
    /// are dropped, so the retained snapshot stays frozen.
    fn publish(&self, snapshot: Snapshot) {
        {
            let mut current = self
                .snapshot
                .write()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            if !self.accepting.load(Ordering::SeqCst) {
                tracing::trace!("Dropping satellite batch delivered after teardown");
                return;
            }
            tracing::trace!("Satellite snapshot replaced ({} satellites)", snapshot.len());
            *current = snapshot;
        }

        let observers: Vec<ChangeCallback> = lock(&self.observers).values().cloned().collect();
        for on_change in observers {
            on_change();
        }
    }

    fn remove_observer(&self, id: u64) {
        let mut upstream = lock(&self.upstream);
        let now_empty = {
            let mut observers = lock(&self.observers);
            observers.remove(&id).is_some() && observers.is_empty()
        };

        if now_empty {
            self.stop_accepting();
            if let Some(mut subscription) = upstream.take() {
                tracing::debug!("Last observer removed, tearing down upstream satellite subscription");
                subscription.remove();
            }
        }
    }

    fn stop_accepting(&self) {
        let _snapshot = self
            .snapshot
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        self.accepting.store(false, Ordering::SeqCst);
    }
}

impl Drop for StoreInner {
    fn drop(&mut self) {
        let upstream = self
            .upstream
            .get_mut()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(mut subscription) = upstream.take() {
            subscription.remove();
        }
    }
}

/// Removes an observer from its store. Idempotent; also runs on drop.
#[must_use = "dropping the handle unsubscribes immediately"]
pub struct Unsubscribe {
    store: Weak<StoreInner>,
    id: u64,
    done: AtomicBool,
}

impl Unsubscribe {
    pub fn unsubscribe(&self) {
        if self.done.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(store) = self.store.upgrade() {
            store.remove_observer(self.id);
        }
    }
}

impl Drop for Unsubscribe {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

//! In-process event emitter keyed by event name.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use gnss_common::GnssEvent;

use super::{EventSource, Listener, Subscription};
use crate::error::GnssError;
use crate::lock;

/// Notified when the emitter gains its first listener or loses its last one
pub trait ObservingHook: Send + Sync {
    fn start_observing(&self);
    fn stop_observing(&self);
}

struct Registration {
    id: u64,
    event_name: String,
    listener: Listener,
}

struct EmitterInner {
    next_id: AtomicU64,
    listeners: Mutex<Vec<Registration>>,
    /// Held across every 0->1 / 1->0 transition so hooks fire in order
    observing: Mutex<Option<Weak<dyn ObservingHook>>>,
}

/// Shared emitter; clones deliver to the same listener set
#[derive(Clone)]
pub struct EventEmitter {
    inner: Arc<EmitterInner>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(EmitterInner {
                next_id: AtomicU64::new(1),
                listeners: Mutex::new(Vec::new()),
                observing: Mutex::new(None),
            }),
        }
    }

    pub fn set_observing_hook(&self, hook: Weak<dyn ObservingHook>) {
        *lock(&self.inner.observing) = Some(hook);
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.inner.listeners).len()
    }

    /// Deliver `event` to every listener registered for its name.
    ///
    /// Listeners are copied out before any of them runs, so a listener may
    /// add or remove subscriptions while being called. Returns the number of
    /// listeners invoked.
    pub fn emit(&self, event: &GnssEvent) -> usize {
        let targets: Vec<Listener> = lock(&self.inner.listeners)
            .iter()
            .filter(|registration| registration.event_name == event.name())
            .map(|registration| registration.listener.clone())
            .collect();

        tracing::trace!("Emitting '{}' to {} listener(s)", event.name(), targets.len());

        for listener in &targets {
            listener(event);
        }
        targets.len()
    }

    /// Decode a JSON payload coming from the runtime bridge and emit it
    pub fn emit_json(&self, event_name: &str, payload: serde_json::Value) -> Result<usize, GnssError> {
        match GnssEvent::from_payload(event_name, payload)? {
            Some(event) => Ok(self.emit(&event)),
            None => {
                tracing::debug!("Ignoring unknown event '{}'", event_name);
                Ok(0)
            }
        }
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSource for EventEmitter {
    fn add_listener(&self, event_name: &str, listener: Listener) -> Box<dyn Subscription> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);

        let hook = lock(&self.inner.observing);
        let was_empty = {
            let mut listeners = lock(&self.inner.listeners);
            let was_empty = listeners.is_empty();
            listeners.push(Registration {
                id,
                event_name: event_name.to_string(),
                listener,
            });
            was_empty
        };

        if was_empty {
            if let Some(hook) = hook.as_ref().and_then(Weak::upgrade) {
                hook.start_observing();
            }
        }

        Box::new(EmitterSubscription {
            emitter: Some(Arc::downgrade(&self.inner)),
            id,
        })
    }
}

struct EmitterSubscription {
    emitter: Option<Weak<EmitterInner>>,
    id: u64,
}

impl Subscription for EmitterSubscription {
    fn remove(&mut self) {
        let Some(inner) = self.emitter.take().and_then(|weak| weak.upgrade()) else {
            return;
        };

        let hook = lock(&inner.observing);
        let now_empty = {
            let mut listeners = lock(&inner.listeners);
            let before = listeners.len();
            listeners.retain(|registration| registration.id != self.id);
            before != listeners.len() && listeners.is_empty()
        };

        if now_empty {
            if let Some(hook) = hook.as_ref().and_then(Weak::upgrade) {
                hook.stop_observing();
            }
        }
    }
}

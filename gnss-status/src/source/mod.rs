//! Push-style event sources.
//!
//! An [`EventSource`] hands out a [`Subscription`] per registered listener;
//! removing the subscription stops delivery to that listener.

mod emitter;

pub use emitter::{EventEmitter, ObservingHook};

use std::sync::Arc;

use gnss_common::GnssEvent;

/// Handler invoked for every delivered event
pub type Listener = Arc<dyn Fn(&GnssEvent) + Send + Sync>;

pub trait Subscription: Send {
    /// Stop delivery to the listener. Calling this again is a no-op.
    fn remove(&mut self);
}

pub trait EventSource: Send + Sync {
    fn add_listener(&self, event_name: &str, listener: Listener) -> Box<dyn Subscription>;
}

impl<T: EventSource + ?Sized> EventSource for Arc<T> {
    fn add_listener(&self, event_name: &str, listener: Listener) -> Box<dyn Subscription> {
        (**self).add_listener(event_name, listener)
    }
}


pub mod config;
pub mod error;
pub mod logging;
pub mod monitor;
pub mod platform;
pub mod sky;
pub mod source;
pub mod store;

pub use error::GnssError;
pub use store::{SatelliteStore, Snapshot, Unsubscribe, use_satellites};

/// Lock a mutex, ignoring poisoning
pub(crate) fn lock<T>(mutex: &std::sync::Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

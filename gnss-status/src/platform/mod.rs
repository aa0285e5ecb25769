//! Platform glue between the OS location service and the event emitter.
//!
//! ## Main Components
//! - `GnssModule`: registers a status callback while anyone is listening,
//!   gated on foreground location permission
//! - `LocationService` / `PermissionProvider`: the platform collaborators
//! - `SimulatedLocationService`: a deterministic sky used by the monitor and tests

mod module;
mod simulated;

pub use module::GnssModule;
pub use simulated::{SimulatedLocationService, SimulationConfig, StaticPermissions, default_sky};

use std::sync::Arc;

use crate::error::GnssError;

/// One raw entry of a status report, constellation still as the platform tag
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatusEntry {
    pub svid: i32,
    pub constellation_type: i32,
    pub elevation_degrees: f32,
    pub azimuth_degrees: f32,
    pub used_in_fix: bool,
}

/// Satellite status report as handed to a [`GnssStatusCallback`].
///
/// Accessors are indexed like the platform API; indices must be below
/// [`GnssStatus::satellite_count`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GnssStatus {
    entries: Vec<StatusEntry>,
}

impl GnssStatus {
    pub fn new(entries: Vec<StatusEntry>) -> Self {
        Self { entries }
    }

    pub fn satellite_count(&self) -> usize {
        self.entries.len()
    }

    pub fn svid(&self, index: usize) -> i32 {
        self.entries[index].svid
    }

    pub fn constellation_type(&self, index: usize) -> i32 {
        self.entries[index].constellation_type
    }

    pub fn elevation_degrees(&self, index: usize) -> f32 {
        self.entries[index].elevation_degrees
    }

    pub fn azimuth_degrees(&self, index: usize) -> f32 {
        self.entries[index].azimuth_degrees
    }

    pub fn used_in_fix(&self, index: usize) -> bool {
        self.entries[index].used_in_fix
    }
}

/// Receives GNSS engine notifications from a [`LocationService`]
pub trait GnssStatusCallback: Send + Sync {
    fn on_started(&self) {}
    fn on_satellite_status_changed(&self, _status: &GnssStatus) {}
    fn on_stopped(&self) {}
    fn on_first_fix(&self, _ttff_millis: i32) {}
}

pub trait LocationService: Send + Sync {
    fn register_gnss_status_callback(&self, callback: Arc<dyn GnssStatusCallback>) -> Result<(), GnssError>;

    /// Unknown callbacks are ignored
    fn unregister_gnss_status_callback(&self, callback: &Arc<dyn GnssStatusCallback>);
}

impl<T: LocationService + ?Sized> LocationService for Arc<T> {
    fn register_gnss_status_callback(&self, callback: Arc<dyn GnssStatusCallback>) -> Result<(), GnssError> {
        (**self).register_gnss_status_callback(callback)
    }

    fn unregister_gnss_status_callback(&self, callback: &Arc<dyn GnssStatusCallback>) {
        (**self).unregister_gnss_status_callback(callback)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    FineLocation,
    CoarseLocation,
}

pub trait PermissionProvider: Send + Sync {
    /// `Err(GnssError::AppContextLost)` when the permission manager is gone
    fn has_granted(&self, permission: Permission) -> Result<bool, GnssError>;
}

impl<T: PermissionProvider + ?Sized> PermissionProvider for Arc<T> {
    fn has_granted(&self, permission: Permission) -> Result<bool, GnssError> {
        (**self).has_granted(permission)
    }
}

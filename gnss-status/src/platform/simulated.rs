//! Simulated location service
//!
//! Plays back a fixed sky slowly rotating in azimuth. Satellites above the
//! elevation mask join the fix once the configured number of updates has
//! passed, at which point the first-fix notification is sent.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;

use super::{GnssStatus, GnssStatusCallback, LocationService, Permission, PermissionProvider, StatusEntry};
use crate::error::GnssError;
use crate::lock;

/// Parameters of the simulated receiver
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub update_interval: Duration,
    pub first_fix_after_updates: u32,
    pub elevation_mask_degrees: f32,
    /// Azimuth change per update
    pub azimuth_drift_degrees: f32,
    pub sky: Vec<StatusEntry>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            update_interval: Duration::from_secs(1),
            first_fix_after_updates: 3,
            elevation_mask_degrees: 10.0,
            azimuth_drift_degrees: 0.25,
            sky: default_sky(),
        }
    }
}

/// A plausible mixed-constellation sky
pub fn default_sky() -> Vec<StatusEntry> {
    // (svid, constellation tag, elevation, azimuth)
    const SKY: [(i32, i32, f32, f32); 12] = [
        (2, 1, 67.0, 41.0),
        (5, 1, 45.0, 90.0),
        (13, 1, 22.0, 301.0),
        (29, 1, 6.0, 172.0),
        (10, 3, 54.0, 210.0),
        (21, 3, 31.0, 128.0),
        (4, 6, 72.0, 355.0),
        (11, 6, 38.0, 250.0),
        (36, 6, 15.0, 64.0),
        (19, 5, 49.0, 158.0),
        (35, 5, 8.0, 12.0),
        (131, 2, 33.0, 196.0),
    ];

    SKY.iter()
        .map(|&(svid, constellation_type, elevation_degrees, azimuth_degrees)| StatusEntry {
            svid,
            constellation_type,
            elevation_degrees,
            azimuth_degrees,
            used_in_fix: false,
        })
        .collect()
}

/// Permission state that can be flipped at runtime
#[derive(Debug, Default)]
pub struct StaticPermissions {
    fine: AtomicBool,
    coarse: AtomicBool,
}

impl StaticPermissions {
    pub fn granted() -> Self {
        Self {
            fine: AtomicBool::new(true),
            coarse: AtomicBool::new(true),
        }
    }

    pub fn denied() -> Self {
        Self::default()
    }

    pub fn grant(&self, permission: Permission) {
        self.flag(permission).store(true, Ordering::SeqCst);
    }

    pub fn revoke(&self, permission: Permission) {
        self.flag(permission).store(false, Ordering::SeqCst);
    }

    fn flag(&self, permission: Permission) -> &AtomicBool {
        match permission {
            Permission::FineLocation => &self.fine,
            Permission::CoarseLocation => &self.coarse,
        }
    }
}

impl PermissionProvider for StaticPermissions {
    fn has_granted(&self, permission: Permission) -> Result<bool, GnssError> {
        Ok(self.flag(permission).load(Ordering::SeqCst))
    }
}

struct Session {
    callback: Arc<dyn GnssStatusCallback>,
    task: JoinHandle<()>,
}

/// Location service backed by a tokio task per registered callback
pub struct SimulatedLocationService {
    config: SimulationConfig,
    permissions: Arc<StaticPermissions>,
    sessions: Mutex<Vec<Session>>,
}

impl SimulatedLocationService {
    pub fn new(config: SimulationConfig, permissions: Arc<StaticPermissions>) -> Self {
        Self {
            config,
            permissions,
            sessions: Mutex::new(Vec::new()),
        }
    }

    pub fn active_sessions(&self) -> usize {
        lock(&self.sessions).len()
    }

    async fn run_session(config: SimulationConfig, callback: Arc<dyn GnssStatusCallback>) {
        callback.on_started();

        let started = tokio::time::Instant::now();
        let mut ticker = tokio::time::interval(config.update_interval);
        let mut sky = config.sky;
        let mut updates: u32 = 0;
        let mut has_fix = false;

        loop {
            ticker.tick().await;
            updates = updates.saturating_add(1);

            if !has_fix && updates >= config.first_fix_after_updates {
                has_fix = true;
                let ttff_millis = i32::try_from(started.elapsed().as_millis()).unwrap_or(i32::MAX);
                tracing::debug!("Simulated receiver acquired fix after {} ms", ttff_millis);
                callback.on_first_fix(ttff_millis);
            }

            for entry in sky.iter_mut() {
                entry.azimuth_degrees = (entry.azimuth_degrees + config.azimuth_drift_degrees).rem_euclid(360.0);
                entry.used_in_fix = has_fix && entry.elevation_degrees >= config.elevation_mask_degrees;
            }

            callback.on_satellite_status_changed(&GnssStatus::new(sky.clone()));
        }
    }
}

impl LocationService for SimulatedLocationService {
    fn register_gnss_status_callback(&self, callback: Arc<dyn GnssStatusCallback>) -> Result<(), GnssError> {
        let fine = self.permissions.has_granted(Permission::FineLocation)?;
        let coarse = self.permissions.has_granted(Permission::CoarseLocation)?;
        if !fine && !coarse {
            return Err(GnssError::LocationUnauthorized);
        }

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| GnssError::ServiceUnavailable(e.to_string()))?;
        let task = runtime.spawn(Self::run_session(self.config.clone(), callback.clone()));

        lock(&self.sessions).push(Session { callback, task });
        tracing::debug!("Simulated GNSS session started");
        Ok(())
    }

    fn unregister_gnss_status_callback(&self, callback: &Arc<dyn GnssStatusCallback>) {
        let removed = {
            let mut sessions = lock(&self.sessions);
            let index = sessions
                .iter()
                .position(|session| Arc::ptr_eq(&session.callback, callback));
            index.map(|index| sessions.remove(index))
        };

        if let Some(session) = removed {
            session.task.abort();
            session.callback.on_stopped();
            tracing::debug!("Simulated GNSS session stopped");
        }
    }
}

impl Drop for SimulatedLocationService {
    fn drop(&mut self) {
        for session in lock(&self.sessions).drain(..) {
            session.task.abort();
        }
    }
}

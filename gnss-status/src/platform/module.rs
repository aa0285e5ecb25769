//! GNSS module - forwards platform status callbacks as named events
use std::sync::{Arc, Mutex, Weak};

use gnss_common::{FirstFixPayload, GnssEvent, SatelliteRecord, SatellitesPayload};

use super::{GnssStatus, GnssStatusCallback, LocationService, Permission, PermissionProvider};
use crate::error::GnssError;
use crate::lock;
use crate::source::{EventEmitter, EventSource, Listener, ObservingHook, Subscription};

/// Bridges a [`LocationService`] to event listeners.
///
/// The status callback is registered while the module has at least one
/// listener and foreground location permission. Without permission the
/// start is deferred until [`GnssModule::on_activity_enters_foreground`].
pub struct GnssModule<L, P> {
    emitter: EventEmitter,
    location: L,
    permissions: P,
    callback: Mutex<Option<Arc<dyn GnssStatusCallback>>>,
}

impl<L, P> GnssModule<L, P>
where
    L: LocationService + 'static,
    P: PermissionProvider + 'static,
{
    pub fn new(location: L, permissions: P) -> Arc<Self> {
        Arc::new_cyclic(|module: &Weak<Self>| {
            let emitter = EventEmitter::new();
            let hook: Weak<dyn ObservingHook> = module.clone();
            emitter.set_observing_hook(hook);

            Self {
                emitter,
                location,
                permissions,
                callback: Mutex::new(None),
            }
        })
    }

    pub fn emitter(&self) -> &EventEmitter {
        &self.emitter
    }

    /// Whether a status callback is currently registered
    pub fn is_watching(&self) -> bool {
        lock(&self.callback).is_some()
    }

    /// Register the status callback. No-op when already registered or when
    /// foreground location permission is missing.
    pub fn start_watching_satellites(&self) -> Result<(), GnssError> {
        self.start_watching(false)
    }

    /// With `only_if_observed`, skips the start unless the emitter has
    /// listeners. Checked under the callback lock, which the last-listener
    /// teardown also takes.
    fn start_watching(&self, only_if_observed: bool) -> Result<(), GnssError> {
        let mut callback = lock(&self.callback);
        if callback.is_some() {
            return Ok(());
        }

        if only_if_observed && self.emitter.listener_count() == 0 {
            tracing::debug!("Foreground re-entry with no listeners, nothing to start");
            return Ok(());
        }

        if self.is_missing_foreground_permissions()? {
            tracing::info!("Location permission not granted, satellite watch deferred");
            return Ok(());
        }

        let forwarder: Arc<dyn GnssStatusCallback> = Arc::new(StatusForwarder {
            emitter: self.emitter.clone(),
        });
        self.location.register_gnss_status_callback(forwarder.clone())?;
        *callback = Some(forwarder);

        tracing::info!("GNSS status callback registered");
        Ok(())
    }

    pub fn stop_watching_satellites(&self) {
        let registered = lock(&self.callback).take();
        if let Some(callback) = registered {
            self.location.unregister_gnss_status_callback(&callback);
            tracing::info!("GNSS status callback unregistered");
        }
    }

    /// First listener added
    pub fn on_start_observing(&self) {
        if let Err(e) = self.start_watching_satellites() {
            tracing::warn!("Failed to start watching satellites: {}", e);
        }
    }

    /// Last listener removed
    pub fn on_stop_observing(&self) {
        self.stop_watching_satellites();
    }

    /// The app came back to the foreground, possibly after the user granted
    /// location permission; retry the start if anyone is listening.
    pub fn on_activity_enters_foreground(&self) {
        if let Err(e) = self.start_watching(true) {
            tracing::warn!("Failed to start watching satellites after foreground re-entry: {}", e);
        }
    }

    fn is_missing_foreground_permissions(&self) -> Result<bool, GnssError> {
        let fine = self.permissions.has_granted(Permission::FineLocation)?;
        let coarse = self.permissions.has_granted(Permission::CoarseLocation)?;
        Ok(!fine && !coarse)
    }
}

impl<L, P> ObservingHook for GnssModule<L, P>
where
    L: LocationService + 'static,
    P: PermissionProvider + 'static,
{
    fn start_observing(&self) {
        self.on_start_observing();
    }

    fn stop_observing(&self) {
        self.on_stop_observing();
    }
}

impl<L, P> EventSource for GnssModule<L, P>
where
    L: LocationService + 'static,
    P: PermissionProvider + 'static,
{
    fn add_listener(&self, event_name: &str, listener: Listener) -> Box<dyn Subscription> {
        self.emitter.add_listener(event_name, listener)
    }
}

/// Status callback handed to the location service
struct StatusForwarder {
    emitter: EventEmitter,
}

impl StatusForwarder {
    fn to_records(status: &GnssStatus) -> Vec<SatelliteRecord> {
        (0..status.satellite_count())
            .map(|i| SatelliteRecord {
                id: status.svid(i),
                constellation: status.constellation_type(i).into(),
                elevation_degrees: status.elevation_degrees(i),
                azimuth_degrees: status.azimuth_degrees(i),
                used_in_fix: status.used_in_fix(i),
            })
            .collect()
    }
}

impl GnssStatusCallback for StatusForwarder {
    fn on_started(&self) {
        self.emitter.emit(&GnssEvent::Started);
    }

    fn on_satellite_status_changed(&self, status: &GnssStatus) {
        let satellites = Self::to_records(status);
        self.emitter.emit(&GnssEvent::Satellites(SatellitesPayload { satellites }));
    }

    fn on_stopped(&self) {
        self.emitter.emit(&GnssEvent::Stopped);
    }

    fn on_first_fix(&self, ttff_millis: i32) {
        self.emitter.emit(&GnssEvent::FirstFix(FirstFixPayload { ttff_millis }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{StaticPermissions, StatusEntry};
    use crate::store::SatelliteStore;
    use gnss_common::Constellation;
    use gnss_common::events::{EVENT_FIRST_FIX, EVENT_STARTED, EVENT_STOPPED};
    use std::sync::Barrier;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Location service driven by hand from the test body
    #[derive(Default)]
    struct ManualLocationService {
        callbacks: Mutex<Vec<Arc<dyn GnssStatusCallback>>>,
        registrations: AtomicUsize,
        refuse: std::sync::atomic::AtomicBool,
    }

    impl ManualLocationService {
        fn registered(&self) -> usize {
            self.callbacks.lock().unwrap().len()
        }

        fn each(&self, f: impl Fn(&dyn GnssStatusCallback)) {
            let callbacks = self.callbacks.lock().unwrap().clone();
            for callback in callbacks {
                f(callback.as_ref());
            }
        }
    }

    impl LocationService for ManualLocationService {
        fn register_gnss_status_callback(&self, callback: Arc<dyn GnssStatusCallback>) -> Result<(), GnssError> {
            if self.refuse.load(Ordering::SeqCst) {
                return Err(GnssError::LocationUnauthorized);
            }
            self.registrations.fetch_add(1, Ordering::SeqCst);
            self.callbacks.lock().unwrap().push(callback);
            Ok(())
        }

        fn unregister_gnss_status_callback(&self, callback: &Arc<dyn GnssStatusCallback>) {
            self.callbacks
                .lock()
                .unwrap()
                .retain(|registered| !Arc::ptr_eq(registered, callback));
        }
    }

    struct LostContext;

    impl PermissionProvider for LostContext {
        fn has_granted(&self, _permission: Permission) -> Result<bool, GnssError> {
            Err(GnssError::AppContextLost)
        }
    }

    fn status(entries: &[(i32, i32, bool)]) -> GnssStatus {
        GnssStatus::new(
            entries
                .iter()
                .map(|&(svid, constellation_type, used_in_fix)| StatusEntry {
                    svid,
                    constellation_type,
                    elevation_degrees: 30.0,
                    azimuth_degrees: 120.0,
                    used_in_fix,
                })
                .collect(),
        )
    }

    type TestModule = GnssModule<Arc<ManualLocationService>, Arc<StaticPermissions>>;

    fn record_events(module: &Arc<TestModule>, name: &str) -> (Arc<Mutex<Vec<GnssEvent>>>, Box<dyn Subscription>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let listener: Listener = {
            let events = events.clone();
            Arc::new(move |event: &GnssEvent| events.lock().unwrap().push(event.clone()))
        };
        let subscription = module.add_listener(name, listener);
        (events, subscription)
    }

    #[test]
    fn test_store_drives_callback_registration() {
        let location = Arc::new(ManualLocationService::default());
        let permissions = Arc::new(StaticPermissions::granted());
        let module = GnssModule::new(location.clone(), permissions);
        let store = SatelliteStore::new(module.clone());

        assert!(!module.is_watching());
        let handle = store.subscribe(|| {});
        assert!(module.is_watching());
        assert_eq!(location.registered(), 1);

        location.each(|callback| callback.on_satellite_status_changed(&status(&[(5, 1, true), (12, 6, false)])));
        let snapshot = store.get_snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].id, 5);
        assert_eq!(snapshot[0].constellation, Constellation::Gps);
        assert!(snapshot[0].used_in_fix);
        assert_eq!(snapshot[1].constellation, Constellation::Galileo);

        handle.unsubscribe();
        assert!(!module.is_watching());
        assert_eq!(location.registered(), 0);
        assert_eq!(snapshot.len(), store.get_snapshot().len());
    }

    #[test]
    fn test_missing_permission_defers_until_foreground() {
        let location = Arc::new(ManualLocationService::default());
        let permissions = Arc::new(StaticPermissions::denied());
        let module = GnssModule::new(location.clone(), permissions.clone());
        let store = SatelliteStore::new(module.clone());

        let calls = Arc::new(AtomicUsize::new(0));
        let _handle = {
            let calls = calls.clone();
            store.subscribe(move || {
                calls.fetch_add(1, Ordering::SeqCst);
            })
        };
        assert!(store.is_active());
        assert!(!module.is_watching());

        // Still denied, retry is a no-op
        module.on_activity_enters_foreground();
        assert_eq!(location.registered(), 0);

        permissions.grant(Permission::CoarseLocation);
        module.on_activity_enters_foreground();
        module.on_activity_enters_foreground();
        assert_eq!(location.registrations.load(Ordering::SeqCst), 1);

        location.each(|callback| callback.on_satellite_status_changed(&status(&[(3, 3, false)])));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.get_snapshot()[0].constellation, Constellation::Glonass);
    }

    #[test]
    fn test_foreground_without_listeners_does_not_start() {
        let location = Arc::new(ManualLocationService::default());
        let module = GnssModule::new(location.clone(), Arc::new(StaticPermissions::granted()));

        module.on_activity_enters_foreground();

        assert!(!module.is_watching());
        assert_eq!(location.registered(), 0);
    }

    #[test]
    fn test_foreground_retry_racing_last_removal_leaves_nothing_running() {
        for _ in 0..200 {
            let location = Arc::new(ManualLocationService::default());
            let permissions = Arc::new(StaticPermissions::denied());
            let module = GnssModule::new(location.clone(), permissions.clone());
            let (_, mut subscription) = record_events(&module, EVENT_STARTED);
            assert!(!module.is_watching());
            permissions.grant(Permission::FineLocation);

            let barrier = Arc::new(Barrier::new(2));
            let retry = {
                let module = module.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    module.on_activity_enters_foreground();
                })
            };
            barrier.wait();
            subscription.remove();
            retry.join().unwrap();

            assert!(!module.is_watching());
            assert_eq!(location.registered(), 0);
        }
    }

    #[test]
    fn test_lost_context_is_reported() {
        let location = Arc::new(ManualLocationService::default());
        let module = GnssModule::new(location.clone(), LostContext);

        assert!(matches!(module.start_watching_satellites(), Err(GnssError::AppContextLost)));

        // Through the store the failure only means no updates
        let store = SatelliteStore::new(module.clone());
        let _handle = store.subscribe(|| {});
        assert!(store.is_active());
        assert!(!module.is_watching());
        assert!(store.get_snapshot().is_empty());
    }

    #[test]
    fn test_refused_registration_can_be_retried() {
        let location = Arc::new(ManualLocationService::default());
        location.refuse.store(true, Ordering::SeqCst);
        let module = GnssModule::new(location.clone(), Arc::new(StaticPermissions::granted()));

        assert!(matches!(module.start_watching_satellites(), Err(GnssError::LocationUnauthorized)));
        assert!(!module.is_watching());

        location.refuse.store(false, Ordering::SeqCst);
        module.start_watching_satellites().unwrap();
        module.start_watching_satellites().unwrap();
        assert!(module.is_watching());
        assert_eq!(location.registrations.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_lifecycle_events_are_forwarded() {
        let location = Arc::new(ManualLocationService::default());
        let module = GnssModule::new(location.clone(), Arc::new(StaticPermissions::granted()));

        let (started, _s1) = record_events(&module, EVENT_STARTED);
        let (first_fix, _s2) = record_events(&module, EVENT_FIRST_FIX);
        let (stopped, _s3) = record_events(&module, EVENT_STOPPED);
        assert!(module.is_watching());

        location.each(|callback| {
            callback.on_started();
            callback.on_first_fix(2750);
            callback.on_stopped();
        });

        assert_eq!(started.lock().unwrap().as_slice(), &[GnssEvent::Started]);
        assert_eq!(
            first_fix.lock().unwrap().as_slice(),
            &[GnssEvent::FirstFix(FirstFixPayload { ttff_millis: 2750 })]
        );
        assert_eq!(stopped.lock().unwrap().as_slice(), &[GnssEvent::Stopped]);
    }

    #[test]
    fn test_status_conversion_keeps_order_and_unknown_tags() {
        let records = StatusForwarder::to_records(&status(&[(9, 42, false), (1, 5, true)]));

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, 9);
        assert_eq!(records[0].constellation, Constellation::Other(42));
        assert_eq!(records[1].constellation, Constellation::Beidou);
        assert!(records[1].used_in_fix);
    }
}

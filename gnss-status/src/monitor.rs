//! Satellite monitor - wires the simulated receiver, the GNSS module and the store
//!
//! Logs a Fix/Sats line on every snapshot change and the receiver lifecycle
//! events, optionally granting location permission late to exercise the
//! foreground re-entry path.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use gnss_common::events::{EVENT_FIRST_FIX, EVENT_STARTED, EVENT_STOPPED};
use gnss_common::GnssEvent;

use crate::config::MonitorConfig;
use crate::lock;
use crate::platform::{GnssModule, Permission, SimulatedLocationService, StaticPermissions};
use crate::sky::SkySummary;
use crate::source::{EventSource, Listener, Subscription};
use crate::store::{SatelliteStore, Unsubscribe};

type Module = GnssModule<Arc<SimulatedLocationService>, Arc<StaticPermissions>>;

/// What happened during one monitor run
#[derive(Debug, Clone)]
pub struct MonitorStats {
    pub started_at: DateTime<Utc>,
    pub updates: u64,
    pub first_fix_at: Option<DateTime<Utc>>,
    pub ttff_millis: Option<i32>,
    pub last_summary: SkySummary,
}

impl MonitorStats {
    fn new() -> Self {
        Self {
            started_at: Utc::now(),
            updates: 0,
            first_fix_at: None,
            ttff_millis: None,
            last_summary: SkySummary::default(),
        }
    }
}

pub struct SatelliteMonitor {
    config: MonitorConfig,
    permissions: Arc<StaticPermissions>,
    location: Arc<SimulatedLocationService>,
    module: Arc<Module>,
    store: SatelliteStore,
    stats: Arc<Mutex<MonitorStats>>,
    lifecycle: Vec<Box<dyn Subscription>>,
    watch: Option<Unsubscribe>,
}

impl SatelliteMonitor {
    pub fn new(config: MonitorConfig) -> Self {
        let permissions = Arc::new(if config.location_permission_granted {
            StaticPermissions::granted()
        } else {
            StaticPermissions::denied()
        });
        let location = Arc::new(SimulatedLocationService::new(config.simulation(), permissions.clone()));
        let module = GnssModule::new(location.clone(), permissions.clone());
        let store = SatelliteStore::new(module.clone());

        Self {
            config,
            permissions,
            location,
            module,
            store,
            stats: Arc::new(Mutex::new(MonitorStats::new())),
            lifecycle: Vec::new(),
            watch: None,
        }
    }

    pub fn store(&self) -> &SatelliteStore {
        &self.store
    }

    pub fn stats(&self) -> MonitorStats {
        lock(&self.stats).clone()
    }

    /// Subscribe to lifecycle events and the satellite store. Needs a tokio runtime.
    pub fn start(&mut self) {
        tracing::info!("Starting satellite monitor...");

        for event_name in [EVENT_STARTED, EVENT_FIRST_FIX, EVENT_STOPPED] {
            let subscription = self.module.add_listener(event_name, self.lifecycle_listener());
            self.lifecycle.push(subscription);
        }

        let stats = self.stats.clone();
        self.watch = Some(self.store.watch(move |snapshot| {
            let summary = SkySummary::from_snapshot(snapshot);
            tracing::info!("{} [{}]", summary, summary.breakdown());

            let mut stats = lock(&stats);
            stats.updates += 1;
            stats.last_summary = summary;
        }));

        if !self.module.is_watching() {
            tracing::warn!("Location permission missing, waiting for it to be granted");
        }

        if let Some(delay) = self.config.grant_permission_after_secs {
            self.schedule_permission_grant(Duration::from_secs(delay));
        }
    }

    /// Drop every subscription; the store keeps its last snapshot
    pub fn stop(&mut self) {
        if let Some(watch) = self.watch.take() {
            watch.unsubscribe();
        }
        for mut subscription in self.lifecycle.drain(..) {
            subscription.remove();
        }
        tracing::info!(
            "Satellite monitor stopped (store active: {}, sessions: {})",
            self.store.is_active(),
            self.location.active_sessions()
        );
    }

    /// Run until Ctrl-C or the configured duration elapses
    pub async fn run(mut self) -> anyhow::Result<MonitorStats> {
        self.start();

        match self.config.run_for_secs {
            Some(secs) => {
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_secs(secs)) => {
                        tracing::info!("Run duration of {}s elapsed", secs);
                    }
                    result = tokio::signal::ctrl_c() => {
                        result?;
                        tracing::info!("Shutdown signal received.");
                    }
                }
            }
            None => {
                tokio::signal::ctrl_c().await?;
                tracing::info!("Shutdown signal received.");
            }
        }

        self.stop();

        let stats = self.stats();
        let final_snapshot = self.store.get_snapshot();
        tracing::info!(
            "Session summary: {} updates since {}, last sky {} ({} satellites retained)",
            stats.updates,
            stats.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
            stats.last_summary,
            final_snapshot.len()
        );
        match (stats.first_fix_at, stats.ttff_millis) {
            (Some(at), Some(ttff)) => tracing::info!("First fix at {} (TTFF {} ms)", at.format("%H:%M:%S"), ttff),
            _ => tracing::warn!("No fix acquired during this session"),
        }

        Ok(stats)
    }

    fn lifecycle_listener(&self) -> Listener {
        let stats = self.stats.clone();
        Arc::new(move |event: &GnssEvent| match event {
            GnssEvent::Started => tracing::info!("GNSS engine started"),
            GnssEvent::Stopped => tracing::info!("GNSS engine stopped"),
            GnssEvent::FirstFix(payload) => {
                tracing::info!("✓ First fix acquired (TTFF {} ms)", payload.ttff_millis);
                let mut stats = lock(&stats);
                stats.first_fix_at = Some(Utc::now());
                stats.ttff_millis = Some(payload.ttff_millis);
            }
            GnssEvent::Satellites(_) => {}
        })
    }

    /// Simulates the user granting permission from the system dialog and the
    /// app returning to the foreground afterwards
    fn schedule_permission_grant(&self, delay: Duration) {
        let permissions = self.permissions.clone();
        let module = self.module.clone();

        tracing::info!("Location permission will be granted in {:?}", delay);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            permissions.grant(Permission::FineLocation);
            tracing::info!("Location permission granted, app re-entering foreground");
            module.on_activity_enters_foreground();
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_config() -> MonitorConfig {
        MonitorConfig {
            update_interval_ms: 5,
            first_fix_after_updates: 2,
            ..MonitorConfig::default()
        }
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[tokio::test]
    async fn test_monitor_collects_updates_and_first_fix() {
        let mut monitor = SatelliteMonitor::new(fast_config());
        monitor.start();
        assert!(monitor.store().is_active());

        wait_until(|| monitor.stats().ttff_millis.is_some() && monitor.stats().updates >= 3).await;

        let stats = monitor.stats();
        assert!(stats.first_fix_at.is_some());
        assert!(stats.last_summary.in_view > 0);

        monitor.stop();
        assert!(!monitor.store().is_active());
        assert_eq!(monitor.location.active_sessions(), 0);
        assert!(!monitor.store().get_snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_late_permission_grant_starts_updates() {
        let config = MonitorConfig {
            location_permission_granted: false,
            grant_permission_after_secs: Some(0),
            ..fast_config()
        };
        let mut monitor = SatelliteMonitor::new(config);
        monitor.start();

        wait_until(|| monitor.stats().updates >= 1).await;

        assert!(monitor.module.is_watching());
        monitor.stop();
        assert!(!monitor.module.is_watching());
    }

    #[tokio::test]
    async fn test_run_for_configured_duration() {
        let config = MonitorConfig {
            run_for_secs: Some(0),
            ..fast_config()
        };

        let stats = SatelliteMonitor::new(config).run().await.unwrap();

        assert!(stats.started_at <= Utc::now());
    }
}

use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::platform::SimulationConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_update_interval_ms")]
    pub update_interval_ms: u64,

    #[serde(default = "default_first_fix_after_updates")]
    pub first_fix_after_updates: u32,

    #[serde(default = "default_elevation_mask_degrees")]
    pub elevation_mask_degrees: f32,

    #[serde(default = "default_permission_granted")]
    pub location_permission_granted: bool,

    /// Grant permission and re-enter the foreground after this many seconds
    #[serde(default)]
    pub grant_permission_after_secs: Option<u64>,

    /// Stop after this many seconds instead of waiting for Ctrl-C
    #[serde(default)]
    pub run_for_secs: Option<u64>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_update_interval_ms() -> u64 {
    1000
}

fn default_first_fix_after_updates() -> u32 {
    3
}

fn default_elevation_mask_degrees() -> f32 {
    10.0
}

fn default_permission_granted() -> bool {
    true
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_dir: default_log_dir(),
            update_interval_ms: default_update_interval_ms(),
            first_fix_after_updates: default_first_fix_after_updates(),
            elevation_mask_degrees: default_elevation_mask_degrees(),
            location_permission_granted: default_permission_granted(),
            grant_permission_after_secs: None,
            run_for_secs: None,
        }
    }
}

impl MonitorConfig {
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: MonitorConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    pub fn simulation(&self) -> SimulationConfig {
        SimulationConfig {
            update_interval: Duration::from_millis(self.update_interval_ms.max(1)),
            first_fix_after_updates: self.first_fix_after_updates,
            elevation_mask_degrees: self.elevation_mask_degrees,
            ..SimulationConfig::default()
        }
    }
}

pub static CONFIG: OnceLock<MonitorConfig> = OnceLock::new();

/// A missing file means defaults; a malformed one is an error.
pub fn load_config(path: impl AsRef<Path>) -> anyhow::Result<MonitorConfig> {
    let path = path.as_ref();
    if path.exists() {
        MonitorConfig::from_file(path)
    } else {
        tracing::debug!("No config file at {}, using defaults", path.display());
        Ok(MonitorConfig::default())
    }
}

/// Load `path` into [`CONFIG`]. Fails if a configuration was already loaded.
pub fn read_config(path: impl AsRef<Path>) -> anyhow::Result<&'static MonitorConfig> {
    install_config(&CONFIG, load_config(path)?)
}

fn install_config(cell: &OnceLock<MonitorConfig>, config: MonitorConfig) -> anyhow::Result<&MonitorConfig> {
    if cell.set(config).is_err() {
        anyhow::bail!("Configuration already loaded");
    }
    cell.get().context("Configuration missing after load")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_partial_config_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "log_level = \"debug\"\nrun_for_secs = 30\n").unwrap();

        let config = MonitorConfig::from_file(&path).unwrap();

        assert_eq!(config.log_level, "debug");
        assert_eq!(config.run_for_secs, Some(30));
        assert_eq!(config.update_interval_ms, 1000);
        assert!(config.location_permission_granted);
        assert_eq!(config.grant_permission_after_secs, None);
    }

    #[test]
    fn test_malformed_config_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "update_interval_ms = \"fast\"\n").unwrap();

        assert!(MonitorConfig::from_file(&path).is_err());
    }

    #[test]
    fn test_simulation_settings() {
        let config = MonitorConfig {
            update_interval_ms: 0,
            first_fix_after_updates: 7,
            elevation_mask_degrees: 15.0,
            ..MonitorConfig::default()
        };

        let simulation = config.simulation();

        assert_eq!(simulation.update_interval, Duration::from_millis(1));
        assert_eq!(simulation.first_fix_after_updates, 7);
        assert_eq!(simulation.elevation_mask_degrees, 15.0);
        assert!(!simulation.sky.is_empty());
    }

    #[test]
    fn test_second_load_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "log_level = \"warn\"\n").unwrap();
        let cell = OnceLock::new();

        let first = install_config(&cell, load_config(&path).unwrap()).unwrap();
        assert_eq!(first.log_level, "warn");

        let defaults = load_config(temp_dir.path().join("missing.toml")).unwrap();
        assert!(install_config(&cell, defaults).is_err());
        assert_eq!(cell.get().unwrap().log_level, "warn");
    }

    #[test]
    fn test_read_config_without_file() {
        let temp_dir = TempDir::new().unwrap();
        let config = read_config(temp_dir.path().join("missing.toml")).unwrap();

        assert!(CONFIG.get().is_some());
        assert!(!config.log_level.is_empty());
    }
}

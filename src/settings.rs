use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, sync::RwLock, time::Duration};

use crate::geo::GeoOptions;
use crate::models::GeoPoint;

/// Default map centroid when no vendor has coordinates yet. City-scoped
/// deployments override this.
pub const DEFAULT_FALLBACK_CENTER: GeoPoint = GeoPoint {
    latitude: -6.1754,
    longitude: 106.8272,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TrackingSettings {
    /// Minimum interval between persisted location writes.
    pub throttle_floor_secs: u64,
    pub geo_timeout_secs: u64,
    pub max_fix_age_secs: u64,
    pub prefer_low_power: bool,
    /// Grace period between logout and the deferred status=closed write.
    pub deactivation_delay_secs: u64,
    pub map_refresh_secs: u64,
    /// When enabled, stopping tracking also writes status=closed. Off by
    /// default: going offline and closing up are separate actions.
    pub close_on_stop: bool,
    pub fallback_center: GeoPoint,
}

impl Default for TrackingSettings {
    fn default() -> Self {
        Self {
            throttle_floor_secs: 10,
            geo_timeout_secs: 15,
            max_fix_age_secs: 300,
            prefer_low_power: true,
            deactivation_delay_secs: 120,
            map_refresh_secs: 30,
            close_on_stop: false,
            fallback_center: DEFAULT_FALLBACK_CENTER,
        }
    }
}

impl TrackingSettings {
    pub fn throttle_floor(&self) -> Duration {
        Duration::from_secs(self.throttle_floor_secs)
    }

    pub fn deactivation_delay(&self) -> Duration {
        Duration::from_secs(self.deactivation_delay_secs)
    }

    pub fn map_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.map_refresh_secs)
    }

    pub fn geo_options(&self) -> GeoOptions {
        GeoOptions {
            prefer_low_power: self.prefer_low_power,
            timeout: Duration::from_secs(self.geo_timeout_secs),
            max_fix_age: Duration::from_secs(self.max_fix_age_secs),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
struct UserSettings {
    tracking: TrackingSettings,
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_default()
        } else {
            UserSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn tracking(&self) -> TrackingSettings {
        self.data.read().unwrap().tracking.clone()
    }

    pub fn update_tracking(&self, settings: TrackingSettings) -> Result<()> {
        {
            let mut guard = self.data.write().unwrap();
            guard.tracking = settings;
            self.persist(&guard)?;
        }
        Ok(())
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}

impl SettingsStore {
    #[allow(dead_code)]
    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)?;
        let data: UserSettings = serde_json::from_str(&contents)?;
        let mut guard = self.data.write().unwrap();
        *guard = data;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_production_policy() {
        let settings = TrackingSettings::default();
        assert_eq!(settings.throttle_floor(), Duration::from_secs(10));
        assert_eq!(settings.deactivation_delay(), Duration::from_secs(120));
        assert_eq!(settings.geo_options().timeout, Duration::from_secs(15));
        assert_eq!(settings.geo_options().max_fix_age, Duration::from_secs(300));
        assert!(settings.prefer_low_power);
        assert!(!settings.close_on_stop);
    }

    #[test]
    fn partial_json_fills_in_defaults() {
        let parsed: TrackingSettings =
            serde_json::from_str(r#"{ "throttleFloorSecs": 20 }"#).unwrap();
        assert_eq!(parsed.throttle_floor(), Duration::from_secs(20));
        assert_eq!(parsed.deactivation_delay(), Duration::from_secs(120));
    }

    #[test]
    fn store_round_trips_updates() {
        let dir = std::env::temp_dir().join(format!("vendly-settings-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("settings.json");

        let store = SettingsStore::new(path.clone()).unwrap();
        let mut tracking = store.tracking();
        tracking.close_on_stop = true;
        store.update_tracking(tracking).unwrap();

        let reopened = SettingsStore::new(path).unwrap();
        assert!(reopened.tracking().close_on_stop);

        std::fs::remove_dir_all(dir).ok();
    }
}

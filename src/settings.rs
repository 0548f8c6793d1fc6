use anyhow::{Context, Result, anyhow};
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::{MIN_REFRESH_INTERVAL, TrackerDomain};

/// User settings, stored as TOML.
///
/// Unset optional values fall back to the defaults of the configured domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_domain")]
    pub domain: TrackerDomain,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_interval_secs: Option<u64>,
    #[serde(default)]
    pub night_pause: bool,
    #[serde(default = "default_night_start")]
    pub night_start: String,
    #[serde(default = "default_night_end")]
    pub night_end: String,
    /// In the domain's altitude unit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_altitude: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetch_radius_ratio: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    /// Name of the saved location to watch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_location: Option<String>,
}

fn default_domain() -> TrackerDomain {
    TrackerDomain::Aircraft
}

fn default_night_start() -> String {
    "22:00".to_string()
}

fn default_night_end() -> String {
    "07:00".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self::for_domain(default_domain())
    }
}

impl Settings {
    pub fn for_domain(domain: TrackerDomain) -> Self {
        Self {
            domain,
            refresh_interval_secs: None,
            night_pause: false,
            night_start: default_night_start(),
            night_end: default_night_end(),
            max_altitude: None,
            fetch_radius_ratio: None,
            data_dir: None,
            active_location: None,
        }
    }

    /// Load settings from a TOML file; a missing file yields defaults
    pub fn load(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e).with_context(|| format!("Failed to read {:?}", path)),
        };
        let settings: Settings =
            toml::from_str(&contents).with_context(|| format!("Failed to parse {:?}", path))?;
        Ok(settings)
    }

    /// Save settings to a TOML file (atomic: write to .tmp then rename)
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {:?}", parent))?;
        }
        let contents =
            toml::to_string_pretty(self).context("Failed to serialize settings to TOML")?;
        let tmp_path = path.with_extension("toml.tmp");
        std::fs::write(&tmp_path, &contents)
            .with_context(|| format!("Failed to write {:?}", tmp_path))?;
        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("Failed to rename {:?} to {:?}", tmp_path, path))?;
        Ok(())
    }

    /// Poll cadence, never below the 10 second floor
    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval_secs
            .map(Duration::from_secs)
            .unwrap_or_else(|| self.domain.default_refresh_interval())
            .max(MIN_REFRESH_INTERVAL)
    }

    pub fn max_altitude(&self) -> i32 {
        self.max_altitude
            .unwrap_or_else(|| self.domain.default_max_altitude())
    }

    /// Ratio of fetch radius to detection radius; values below 1 are ignored
    pub fn fetch_radius_ratio(&self) -> f64 {
        self.fetch_radius_ratio
            .filter(|r| r.is_finite() && *r >= 1.0)
            .unwrap_or_else(|| self.domain.default_fetch_ratio())
    }

    pub fn fetch_radius(&self, detection_radius: f64) -> f64 {
        detection_radius * self.fetch_radius_ratio()
    }

    /// The configured quiet hours, if night pause is on
    pub fn night_window(&self) -> Result<Option<NightWindow>> {
        if !self.night_pause {
            return Ok(None);
        }
        Ok(Some(NightWindow {
            start: parse_clock(&self.night_start)?,
            end: parse_clock(&self.night_end)?,
        }))
    }

    /// Data directory: `OVERHEAD_DATA_DIR`, then the `data_dir` setting, then `./data`
    pub fn data_dir(&self) -> PathBuf {
        if let Ok(dir) = std::env::var("OVERHEAD_DATA_DIR") {
            return PathBuf::from(dir);
        }
        self.data_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("./data"))
    }

    pub fn storage_paths(&self) -> StoragePaths {
        StoragePaths::new(&self.data_dir(), self.domain)
    }
}

fn parse_clock(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .map_err(|e| anyhow!("Invalid time '{}', expected HH:MM: {}", value, e))
}

/// Daily quiet hours in local time. `start > end` wraps past midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NightWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl NightWindow {
    pub fn contains(&self, time: NaiveTime) -> bool {
        if self.start <= self.end {
            time >= self.start && time < self.end
        } else {
            time >= self.start || time < self.end
        }
    }
}

/// Where each domain keeps its files inside the data directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoragePaths {
    pub locations: PathBuf,
    pub history: PathBuf,
    pub session: PathBuf,
}

impl StoragePaths {
    pub fn new(data_dir: &Path, domain: TrackerDomain) -> Self {
        let dir = data_dir.join(domain.to_string());
        Self {
            locations: dir.join("locations.json"),
            history: dir.join("history.json"),
            session: dir.join("session.json"),
        }
    }
}

/// Resolve the settings file path.
///
/// Priority:
/// 1. `OVERHEAD_CONFIG` env var
/// 2. `./overhead.toml`
pub fn settings_path() -> PathBuf {
    match std::env::var("OVERHEAD_CONFIG") {
        Ok(path) => PathBuf::from(path),
        Err(_) => PathBuf::from("./overhead.toml"),
    }
}

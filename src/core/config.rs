use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{MonitorError, Result};

/// Monitor configuration, loaded once and replaced wholesale on reload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Measure and report ticks per second
    pub show_tps: bool,
    pub show_memory: bool,
    pub show_disk: bool,
    /// Report time since the monitor was last (re)started
    pub show_last_restart: bool,
    /// Send the status lines to an observer when it logs in
    pub status_message_upon_login: bool,
    /// Count distinct observers that logged in during this run
    pub show_unique_logins: bool,
    pub check_for_updates_on_start: bool,
    /// Endpoint whose first line is the latest released version
    pub update_url: Option<String>,
    /// Nominal heartbeat interval
    pub tick_interval_ms: u64,
    pub rate_window_secs: u64,
    /// How often memory, disk and thresholds are evaluated
    pub sample_interval_secs: u64,
    /// Scheduled summary cadence; 0 disables scheduled broadcasts
    pub report_interval_secs: u64,
    pub disk_path: PathBuf,
    /// Broadcast a warning when the measured rate drops below this value
    pub tps_warning_below: Option<f64>,
    pub memory_warning_percent: Option<f64>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            show_tps: true,
            show_memory: true,
            show_disk: true,
            show_last_restart: true,
            status_message_upon_login: true,
            show_unique_logins: false,
            check_for_updates_on_start: false,
            update_url: None,
            tick_interval_ms: 50,
            rate_window_secs: 5,
            sample_interval_secs: 10,
            report_interval_secs: 300,
            disk_path: PathBuf::from("."),
            tps_warning_below: None,
            memory_warning_percent: None,
        }
    }
}

/// The subset of the configuration the rate meter needs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateSettings {
    pub tick_interval: Duration,
    pub window: Duration,
}

impl RateSettings {
    /// Rate the host is expected to tick at, reported until the first window closes.
    pub fn nominal_rate(&self) -> f64 {
        1.0 / self.tick_interval.as_secs_f64()
    }
}

impl MonitorConfig {
    /// Load the configuration from `path`, or from the default location.
    ///
    /// A missing or empty file yields the defaults. A file that exists but does
    /// not parse or validate is an error rather than a silent fallback.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_path()?,
        };

        if !config_path.exists() {
            log::debug!("No config at {}, using defaults", config_path.display());
            return Ok(Self::default());
        }

        let data = fs::read_to_string(&config_path)?;
        if data.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: MonitorConfig = serde_json::from_str(&data).map_err(|e| {
            MonitorError::config(format!(
                "Failed to parse {}: {}",
                config_path.display(),
                e
            ))
        })?;
        config.validate()?;

        Ok(config)
    }

    pub fn save(&self, path: Option<&Path>) -> Result<PathBuf> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_path()?,
        };

        if let Some(parent) = config_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let data = serde_json::to_string_pretty(self)?;
        fs::write(&config_path, data)?;

        Ok(config_path)
    }

    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| MonitorError::config("Could not determine config directory"))?;

        Ok(config_dir.join("perfmon").join("config.json"))
    }

    /// Reject settings that an enabled feature cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.tick_interval_ms == 0 {
            return Err(MonitorError::config("tick_interval_ms must be greater than 0"));
        }

        if self.sample_interval_secs == 0 {
            return Err(MonitorError::config(
                "sample_interval_secs must be greater than 0",
            ));
        }

        if self.show_tps {
            if self.rate_window_secs == 0 {
                return Err(MonitorError::config(
                    "rate_window_secs must be greater than 0 when show_tps is enabled",
                ));
            }
            if self.rate_window().as_millis() < u128::from(self.tick_interval_ms) {
                return Err(MonitorError::config(
                    "rate_window_secs must span at least one tick interval",
                ));
            }
        }

        if self.show_disk && self.disk_path.as_os_str().is_empty() {
            return Err(MonitorError::config(
                "disk_path must be set when show_disk is enabled",
            ));
        }

        if self.check_for_updates_on_start {
            match self.update_url.as_deref() {
                Some(url) if url.starts_with("http://") || url.starts_with("https://") => {}
                Some(url) => {
                    return Err(MonitorError::config(format!(
                        "update_url must be an http(s) URL, got '{}'",
                        url
                    )))
                }
                None => {
                    return Err(MonitorError::config(
                        "update_url must be set when check_for_updates_on_start is enabled",
                    ))
                }
            }
        }

        if let Some(threshold) = self.tps_warning_below {
            if !threshold.is_finite() || threshold <= 0.0 {
                return Err(MonitorError::config(
                    "tps_warning_below must be a positive number",
                ));
            }
        }

        if let Some(percent) = self.memory_warning_percent {
            if !(percent > 0.0 && percent <= 100.0) {
                return Err(MonitorError::config(
                    "memory_warning_percent must be within (0, 100]",
                ));
            }
        }

        Ok(())
    }

    /// Whether any metric is enabled, i.e. whether the monitor has work to do.
    pub fn any_metric_enabled(&self) -> bool {
        self.show_tps || self.show_memory || self.show_disk || self.show_last_restart
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn rate_window(&self) -> Duration {
        Duration::from_secs(self.rate_window_secs)
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_secs(self.sample_interval_secs)
    }

    pub fn report_interval(&self) -> Option<Duration> {
        match self.report_interval_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn rate_settings(&self) -> RateSettings {
        RateSettings {
            tick_interval: self.tick_interval(),
            window: self.rate_window(),
        }
    }
}

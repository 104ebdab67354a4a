//! Summaries and threshold alerts.
//!
//! A summary is built from whichever samplers are enabled. A sampler that
//! fails is left out of the summary and listed in `unavailable` instead of
//! failing the whole report.

use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;

use crate::core::config::MonitorConfig;
use crate::error::MonitorError;
use crate::ui::{format_duration, format_percent, format_rate, format_size};

use super::rate_meter::{RatePhase, RateReader, RateSnapshot};
use super::resources::{DiskUsage, MemoryUsage, ResourceSampler};
use super::uptime::UptimeTracker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Tps,
    Memory,
    Disk,
    Uptime,
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Metric::Tps => "TPS",
            Metric::Memory => "Memory",
            Metric::Disk => "Disk",
            Metric::Uptime => "Uptime",
        };
        f.write_str(name)
    }
}

/// One evaluation of the enabled metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub taken_at: DateTime<Utc>,
    pub rate: Option<RateSnapshot>,
    pub memory: Option<MemoryUsage>,
    pub disk: Option<DiskUsage>,
    pub uptime: Option<Duration>,
    /// Enabled metrics whose sampler failed this time
    pub unavailable: Vec<Metric>,
}

impl Summary {
    pub fn includes(&self, metric: Metric) -> bool {
        match metric {
            Metric::Tps => self.rate.is_some(),
            Metric::Memory => self.memory.is_some(),
            Metric::Disk => self.disk.is_some(),
            Metric::Uptime => self.uptime.is_some(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rate.is_none() && self.memory.is_none() && self.disk.is_none() && self.uptime.is_none()
    }

    pub fn lines(&self) -> Vec<String> {
        let mut lines = Vec::new();

        if let Some(rate) = self.rate {
            let suffix = match rate.phase {
                RatePhase::Measured => "",
                RatePhase::Warmup => " (warming up)",
                RatePhase::Paused => " (paused)",
            };
            lines.push(format!("{}: {}{}", Metric::Tps, format_rate(rate.rate), suffix));
        }

        if let Some(memory) = self.memory {
            lines.push(format!(
                "{}: {} used of {} ({})",
                Metric::Memory,
                format_size(memory.used_bytes),
                format_size(memory.max_bytes),
                format_percent(memory.usage_percent())
            ));
        }

        if let Some(ref disk) = self.disk {
            lines.push(format!(
                "{} ({}): {} free of {}",
                Metric::Disk,
                disk.path.display(),
                format_size(disk.free_bytes),
                format_size(disk.total_bytes)
            ));
        }

        if let Some(uptime) = self.uptime {
            lines.push(format!("{}: {}", Metric::Uptime, format_duration(uptime)));
        }

        lines
    }

    /// Single-line form used for broadcasts.
    pub fn to_message(&self) -> String {
        self.lines().join(" | ")
    }
}

/// Evaluate every metric enabled in `config`.
pub fn build_summary(
    config: &MonitorConfig,
    rate: &RateReader,
    sampler: &ResourceSampler,
    uptime: &UptimeTracker,
) -> Summary {
    let mut summary = Summary {
        taken_at: Utc::now(),
        rate: None,
        memory: None,
        disk: None,
        uptime: None,
        unavailable: Vec::new(),
    };

    if config.show_tps {
        summary.rate = Some(rate.snapshot());
    }

    if config.show_memory {
        match sampler.sample_memory() {
            Ok(sample) => summary.memory = sample.memory,
            Err(e) => {
                log_sample_failure(Metric::Memory, &e);
                summary.unavailable.push(Metric::Memory);
            }
        }
    }

    if config.show_disk {
        match sampler.sample_disk(&config.disk_path) {
            Ok(sample) => summary.disk = sample.disk,
            Err(e) => {
                log_sample_failure(Metric::Disk, &e);
                summary.unavailable.push(Metric::Disk);
            }
        }
    }

    if config.show_last_restart && uptime.is_started() {
        summary.uptime = Some(uptime.elapsed());
    }

    summary
}

fn log_sample_failure(metric: Metric, error: &MonitorError) {
    if error.is_transient() {
        log::warn!("{} sample unavailable: {}", metric, error);
    } else {
        log::error!("{} sampler failed: {}", metric, error);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    Crossed,
    Recovered,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub kind: AlertKind,
    pub metric: Metric,
    pub value: f64,
    pub threshold: f64,
    pub message: String,
}

/// Edge-triggered threshold state: one alert per crossing, one per recovery.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThresholdState {
    rate_low: bool,
    memory_high: bool,
}

impl ThresholdState {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Check a freshly measured rate against `threshold`.
    pub fn evaluate_rate(&mut self, rate: f64, threshold: Option<f64>) -> Option<Alert> {
        let threshold = match threshold {
            Some(t) => t,
            None => {
                self.rate_low = false;
                return None;
            }
        };

        let low = rate < threshold;
        if low == self.rate_low {
            return None;
        }
        self.rate_low = low;

        let (kind, message) = if low {
            (
                AlertKind::Crossed,
                format!(
                    "Tick rate dropped to {}/s (warning below {}/s)",
                    format_rate(rate),
                    format_rate(threshold)
                ),
            )
        } else {
            (
                AlertKind::Recovered,
                format!("Tick rate recovered to {}/s", format_rate(rate)),
            )
        };

        Some(Alert {
            kind,
            metric: Metric::Tps,
            value: rate,
            threshold,
            message,
        })
    }

    pub fn evaluate_memory(
        &mut self,
        memory: &MemoryUsage,
        threshold_percent: Option<f64>,
    ) -> Option<Alert> {
        let threshold = match threshold_percent {
            Some(t) => t,
            None => {
                self.memory_high = false;
                return None;
            }
        };

        let percent = memory.usage_percent();
        let high = percent >= threshold;
        if high == self.memory_high {
            return None;
        }
        self.memory_high = high;

        let (kind, message) = if high {
            (
                AlertKind::Crossed,
                format!(
                    "Memory usage at {} (warning threshold: {})",
                    format_percent(percent),
                    format_percent(threshold)
                ),
            )
        } else {
            (
                AlertKind::Recovered,
                format!("Memory usage back to {}", format_percent(percent)),
            )
        };

        Some(Alert {
            kind,
            metric: Metric::Memory,
            value: percent,
            threshold,
            message,
        })
    }
}

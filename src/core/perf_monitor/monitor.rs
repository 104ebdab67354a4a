//! The owned monitor instance and its read-only query handle.

use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};

use crate::core::broadcast::{BroadcastSink, LogSink};
use crate::core::config::MonitorConfig;
use crate::core::scheduler::{Scheduler, TokioScheduler};
use crate::core::update::{current_version, VersionStatus};
use crate::error::Result;
use crate::ui::{format_duration, format_time};

use super::clock::{Clock, SystemClock};
use super::coordinator::{Collaborators, MonitorState, ReportingCoordinator};
use super::rate_meter::{RateReader, RateSnapshot};
use super::report::{build_summary, Summary};
use super::resources::{ResourceSample, ResourceSampler};
use super::uptime::UptimeTracker;

/// Cloneable handle for answering status queries from any thread.
///
/// Reads only published values and never waits on the periodic callback.
#[derive(Clone)]
pub struct MonitorQueries {
    rate: RateReader,
    sampler: Arc<ResourceSampler>,
    uptime: Arc<UptimeTracker>,
    version: Arc<VersionStatus>,
    config: Arc<RwLock<Arc<MonitorConfig>>>,
    unique_logins: Arc<AtomicUsize>,
}

impl MonitorQueries {
    pub(crate) fn new(
        rate: RateReader,
        sampler: Arc<ResourceSampler>,
        uptime: Arc<UptimeTracker>,
        version: Arc<VersionStatus>,
        config: Arc<RwLock<Arc<MonitorConfig>>>,
        unique_logins: Arc<AtomicUsize>,
    ) -> Self {
        Self {
            rate,
            sampler,
            uptime,
            version,
            config,
            unique_logins,
        }
    }

    /// The configuration currently in effect.
    pub fn config(&self) -> Arc<MonitorConfig> {
        Arc::clone(&self.config.read())
    }

    pub fn current_rate(&self) -> f64 {
        self.rate.current_rate()
    }

    pub fn rate_snapshot(&self) -> RateSnapshot {
        self.rate.snapshot()
    }

    pub fn sample_memory(&self) -> Result<ResourceSample> {
        self.sampler.sample_memory()
    }

    /// Sample the configured disk path.
    pub fn sample_disk(&self) -> Result<ResourceSample> {
        let config = self.config();
        self.sampler.sample_disk(&config.disk_path)
    }

    pub fn uptime(&self) -> Duration {
        self.uptime.elapsed()
    }

    pub fn last_restart(&self) -> Option<DateTime<Local>> {
        self.uptime.started_at_local()
    }

    pub fn is_fresh_restart(&self) -> bool {
        self.uptime.is_fresh_restart()
    }

    pub fn is_latest_version(&self) -> bool {
        self.version.is_latest_version()
    }

    pub fn unique_logins(&self) -> usize {
        self.unique_logins.load(Ordering::Acquire)
    }

    /// Evaluate every enabled metric now.
    pub fn summary(&self) -> Summary {
        let config = self.config();
        build_summary(&config, &self.rate, &self.sampler, &self.uptime)
    }

    pub fn update_notice(&self) -> Option<String> {
        if self.version.is_latest_version() {
            return None;
        }
        self.version.latest_known().map(|latest| {
            format!(
                "A new version is available: {} (running {})",
                latest,
                current_version()
            )
        })
    }

    /// Lines answering a status command.
    pub fn status_lines(&self) -> Vec<String> {
        let config = self.config();
        let summary = build_summary(&config, &self.rate, &self.sampler, &self.uptime);

        let mut lines = vec![format!("Server state (perfmon {})", current_version())];
        lines.extend(summary.lines());
        for metric in &summary.unavailable {
            lines.push(format!("{}: unavailable", metric));
        }

        if config.show_last_restart {
            if let Some(started) = self.last_restart() {
                let notice = if self.uptime.is_fresh_restart() {
                    "Last restart"
                } else {
                    "Monitoring since"
                };
                lines.push(format!(
                    "{}: {} ({} ago)",
                    notice,
                    format_time(started),
                    format_duration(self.uptime.elapsed())
                ));
            }
        }

        if config.show_unique_logins {
            lines.push(format!("Unique logins: {}", self.unique_logins()));
        }

        if let Some(notice) = self.update_notice() {
            lines.push(notice);
        }

        lines
    }
}

/// Explicitly constructed monitor owned by the host.
///
/// Control operations go through the coordinator lock; queries go through
/// [`MonitorQueries`]. Sampling for reports and logins happens before the
/// lock is taken.
pub struct PerformanceMonitor {
    coordinator: Arc<Mutex<ReportingCoordinator>>,
    queries: MonitorQueries,
}

impl PerformanceMonitor {
    /// Build a disabled monitor. Fails when `config` does not validate.
    pub fn new(config: MonitorConfig, collaborators: Collaborators) -> Result<Self> {
        config.validate()?;

        let coordinator = Arc::new_cyclic(|weak| {
            Mutex::new(ReportingCoordinator::new(config, collaborators, weak.clone()))
        });
        let queries = coordinator.lock().queries().clone();

        Ok(Self {
            coordinator,
            queries,
        })
    }

    /// Monitor on the system clock, a private Tokio scheduler, sysinfo and the log.
    pub fn with_defaults(config: MonitorConfig) -> Result<Self> {
        Self::with_sink(config, Arc::new(LogSink))
    }

    pub fn with_sink(config: MonitorConfig, sink: Arc<dyn BroadcastSink>) -> Result<Self> {
        let scheduler: Arc<dyn Scheduler> = Arc::new(TokioScheduler::new()?);
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        Self::new(
            config,
            Collaborators {
                clock,
                scheduler,
                sink,
                sampler: ResourceSampler::new(),
            },
        )
    }

    pub fn queries(&self) -> MonitorQueries {
        self.queries.clone()
    }

    pub fn state(&self) -> MonitorState {
        self.coordinator.lock().state()
    }

    pub fn start(&self) -> Result<()> {
        self.coordinator.lock().activate()
    }

    pub fn pause(&self) {
        self.coordinator.lock().pause();
    }

    pub fn resume(&self) -> Result<()> {
        self.coordinator.lock().resume()
    }

    pub fn shutdown(&self) {
        self.coordinator.lock().shutdown();
    }

    pub fn reload(&self, config: MonitorConfig) -> Result<()> {
        self.coordinator.lock().reload(config)
    }

    /// Record an observer login and return the lines to send to it.
    pub fn on_login(&self, observer: &str) -> Vec<String> {
        let send_status = self.coordinator.lock().record_login(observer);
        if send_status {
            self.queries.status_lines()
        } else {
            self.queries.update_notice().into_iter().collect()
        }
    }

    /// Build a summary now and broadcast it regardless of the schedule.
    pub fn report_now(&self) -> Summary {
        let summary = self.queries.summary();
        self.coordinator.lock().publish_report(summary)
    }

    pub fn last_summary(&self) -> Option<Summary> {
        self.coordinator.lock().last_summary().cloned()
    }
}

impl Drop for PerformanceMonitor {
    fn drop(&mut self) {
        self.coordinator.lock().shutdown();
    }
}

//! Orchestration of the samplers.
//!
//! The coordinator owns the rate meter and the periodic registrations. Two
//! callbacks are registered while active:
//!
//! * the heartbeat, every `tick_interval_ms`, only while tps is enabled
//! * the sampler, every `sample_interval_secs`, which evaluates thresholds and
//!   broadcasts the scheduled summary
//!
//! Both callbacks hold a `Weak` reference and call back into the coordinator.
//! The sampling callback takes its measurements before locking, so a slow
//! memory or disk read never holds up the heartbeat. Each registration carries a liveness
//! flag that is cleared under the coordinator lock and checked again once a
//! callback holds it; a callback that raced a cancel does nothing.

use parking_lot::{Mutex, RwLock};
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use crate::core::broadcast::BroadcastSink;
use crate::core::config::MonitorConfig;
use crate::core::scheduler::{Scheduler, TaskHandle, TickCallback};
use crate::core::update::{current_version, spawn_version_check, VersionStatus};
use crate::error::Result;

use super::clock::Clock;
use super::monitor::MonitorQueries;
use super::rate_meter::RateMeter;
use super::report::{Alert, Summary, ThresholdState};
use super::resources::ResourceSampler;
use super::uptime::UptimeTracker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    /// No samplers running and nothing registered with the scheduler
    Disabled,
    Active,
    /// Callbacks cancelled, last values kept
    Paused,
}

impl fmt::Display for MonitorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MonitorState::Disabled => "disabled",
            MonitorState::Active => "active",
            MonitorState::Paused => "paused",
        };
        f.write_str(name)
    }
}

/// External collaborators the coordinator is wired to.
pub struct Collaborators {
    pub clock: Arc<dyn Clock>,
    pub scheduler: Arc<dyn Scheduler>,
    pub sink: Arc<dyn BroadcastSink>,
    pub sampler: ResourceSampler,
}

#[derive(Debug)]
struct Registration {
    handle: TaskHandle,
    interval: Duration,
    live: Arc<AtomicBool>,
}

type SharedCoordinator = Mutex<ReportingCoordinator>;

pub struct ReportingCoordinator {
    config: Arc<MonitorConfig>,
    published_config: Arc<RwLock<Arc<MonitorConfig>>>,
    state: MonitorState,
    /// Set by `activate`, cleared by `shutdown`; reload only re-activates while set
    enabled: bool,
    clock: Arc<dyn Clock>,
    scheduler: Arc<dyn Scheduler>,
    sink: Arc<dyn BroadcastSink>,
    rate_meter: RateMeter,
    uptime: Arc<UptimeTracker>,
    version: Arc<VersionStatus>,
    version_check_started: bool,
    queries: MonitorQueries,
    logins: HashSet<String>,
    unique_logins: Arc<AtomicUsize>,
    heartbeat: Option<Registration>,
    sampling: Option<Registration>,
    last_report: Option<Instant>,
    last_summary: Option<Summary>,
    thresholds: ThresholdState,
    self_ref: Weak<SharedCoordinator>,
}

impl ReportingCoordinator {
    /// Build a disabled coordinator. `config` must already be validated.
    pub(crate) fn new(
        config: MonitorConfig,
        collaborators: Collaborators,
        self_ref: Weak<SharedCoordinator>,
    ) -> Self {
        let Collaborators {
            clock,
            scheduler,
            sink,
            sampler,
        } = collaborators;

        let config = Arc::new(config);
        let published_config = Arc::new(RwLock::new(Arc::clone(&config)));
        let rate_meter = RateMeter::new(config.rate_settings(), Arc::clone(&clock));
        let uptime = Arc::new(UptimeTracker::new(Arc::clone(&clock)));
        let version = Arc::new(VersionStatus::new());
        let unique_logins = Arc::new(AtomicUsize::new(0));

        let queries = MonitorQueries::new(
            rate_meter.reader(),
            Arc::new(sampler),
            Arc::clone(&uptime),
            Arc::clone(&version),
            Arc::clone(&published_config),
            Arc::clone(&unique_logins),
        );

        Self {
            config,
            published_config,
            state: MonitorState::Disabled,
            enabled: false,
            clock,
            scheduler,
            sink,
            rate_meter,
            uptime,
            version,
            version_check_started: false,
            queries,
            logins: HashSet::new(),
            unique_logins,
            heartbeat: None,
            sampling: None,
            last_report: None,
            last_summary: None,
            thresholds: ThresholdState::default(),
            self_ref,
        }
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn queries(&self) -> &MonitorQueries {
        &self.queries
    }

    pub fn last_summary(&self) -> Option<&Summary> {
        self.last_summary.as_ref()
    }

    /// Start monitoring. Stays `Disabled` when no metric is enabled.
    pub fn activate(&mut self) -> Result<()> {
        self.enabled = true;

        match self.state {
            MonitorState::Active => Ok(()),
            MonitorState::Paused => self.resume(),
            MonitorState::Disabled => {
                if !self.config.any_metric_enabled() {
                    log::info!("No metric enabled, monitor stays disabled");
                    return Ok(());
                }

                if self.config.show_last_restart {
                    self.uptime.start();
                }
                self.maybe_start_version_check();

                self.state = MonitorState::Active;
                self.last_report = Some(self.clock.now());
                if let Err(e) = self.sync_registrations() {
                    self.cancel_registrations();
                    self.rate_meter.stop();
                    self.state = MonitorState::Disabled;
                    return Err(e);
                }

                log::info!("Monitor enabled (perfmon {})", current_version());
                Ok(())
            }
        }
    }

    /// Cancel the callbacks but keep the last values readable.
    pub fn pause(&mut self) {
        if self.state != MonitorState::Active {
            return;
        }

        self.cancel_registrations();
        self.rate_meter.stop();
        self.state = MonitorState::Paused;
        log::info!("Monitor paused");
    }

    /// Re-register the callbacks. The rate window starts over.
    pub fn resume(&mut self) -> Result<()> {
        if self.state != MonitorState::Paused {
            return Ok(());
        }

        self.state = MonitorState::Active;
        self.last_report = Some(self.clock.now());
        self.thresholds.reset();
        self.sync_registrations()?;
        log::info!("Monitor resumed");
        Ok(())
    }

    /// Stop everything. Only an explicit `activate` starts the monitor again.
    pub fn shutdown(&mut self) {
        self.enabled = false;
        if self.state == MonitorState::Disabled {
            return;
        }

        self.disable();
        log::info!("Monitor disabled");
    }

    /// Swap in a new configuration and start or stop components to match it.
    ///
    /// An invalid configuration is rejected and the current one stays in effect.
    pub fn reload(&mut self, config: MonitorConfig) -> Result<()> {
        config.validate()?;

        self.config = Arc::new(config);
        *self.published_config.write() = Arc::clone(&self.config);
        self.rate_meter.reconfigure(self.config.rate_settings());

        if !self.config.show_unique_logins {
            self.logins.clear();
            self.unique_logins.store(0, Ordering::Release);
        }

        log::info!("Configuration reloaded");

        if !self.config.any_metric_enabled() {
            if self.state != MonitorState::Disabled {
                self.disable();
                log::info!("No metric enabled, monitor disabled");
            }
            return Ok(());
        }

        match self.state {
            MonitorState::Active => {
                // Reload is not a restart; only pick up a newly enabled tracker.
                if self.config.show_last_restart && !self.uptime.is_started() {
                    self.uptime.start();
                }
                self.sync_registrations()
            }
            // Registrations are rebuilt from the new config on resume.
            MonitorState::Paused => Ok(()),
            MonitorState::Disabled if self.enabled => self.activate(),
            MonitorState::Disabled => Ok(()),
        }
    }

    /// Heartbeat callback body.
    pub fn on_tick(&mut self) {
        if self.state != MonitorState::Active {
            return;
        }

        if self.rate_meter.on_tick() {
            let rate = self.rate_meter.current_rate();
            if let Some(alert) = self
                .thresholds
                .evaluate_rate(rate, self.config.tps_warning_below)
            {
                self.send_alert(&alert);
            }
        }
    }

    /// Sampling callback body: thresholds, then the scheduled summary when due.
    ///
    /// `summary` is built by the caller without holding the coordinator.
    pub fn on_sample(&mut self, summary: Summary) {
        if self.state != MonitorState::Active {
            return;
        }

        if let Some(ref memory) = summary.memory {
            if let Some(alert) = self
                .thresholds
                .evaluate_memory(memory, self.config.memory_warning_percent)
            {
                self.send_alert(&alert);
            }
        }

        let now = self.clock.now();
        let due = match (self.config.report_interval(), self.last_report) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(every), Some(last)) => now.saturating_duration_since(last) >= every,
        };

        if due && !summary.is_empty() {
            self.send(&summary.to_message());
            self.last_report = Some(now);
        }

        self.last_summary = Some(summary);
    }

    /// Broadcast `summary` regardless of the schedule.
    pub fn publish_report(&mut self, summary: Summary) -> Summary {
        if !summary.is_empty() {
            self.send(&summary.to_message());
        }
        self.last_report = Some(self.clock.now());
        self.last_summary = Some(summary.clone());
        summary
    }

    /// Record an observer login. Returns whether it should get the status lines.
    pub fn record_login(&mut self, observer: &str) -> bool {
        if self.config.show_unique_logins && self.logins.insert(observer.to_string()) {
            self.unique_logins
                .store(self.logins.len(), Ordering::Release);
        }
        self.config.status_message_upon_login
    }

    fn disable(&mut self) {
        self.cancel_registrations();
        self.rate_meter.stop();
        self.thresholds.reset();
        self.state = MonitorState::Disabled;
    }

    fn maybe_start_version_check(&mut self) {
        if self.version_check_started || !self.config.check_for_updates_on_start {
            return;
        }
        let Some(url) = self.config.update_url.clone() else {
            return;
        };

        self.version_check_started = true;
        if let Err(e) = spawn_version_check(url, Arc::clone(&self.version)) {
            log::warn!("Could not start version check: {}", e);
        }
    }

    /// Make the registrations match the config. Only called while `Active`.
    fn sync_registrations(&mut self) -> Result<()> {
        if self.config.show_tps {
            let interval = self.config.tick_interval();
            if !self.rate_meter.is_running() {
                self.rate_meter.start();
            }
            if self.heartbeat.as_ref().map(|r| r.interval) != Some(interval) {
                self.cancel_heartbeat();
                let registration = self.register_heartbeat(interval)?;
                log::info!(
                    "Starting tps meter every {:?} (task {})",
                    interval,
                    registration.handle.id()
                );
                self.heartbeat = Some(registration);
            }
        } else {
            self.cancel_heartbeat();
            self.rate_meter.stop();
        }

        let interval = self.config.sample_interval();
        if self.sampling.as_ref().map(|r| r.interval) != Some(interval) {
            if let Some(old) = self.sampling.take() {
                self.cancel(old);
            }
            self.sampling = Some(self.register_sampling(interval)?);
        }

        Ok(())
    }

    fn register_heartbeat(&self, interval: Duration) -> Result<Registration> {
        let weak = self.self_ref.clone();
        let live = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&live);

        let callback: TickCallback = Box::new(move || {
            with_live_coordinator(&weak, &flag, |coordinator| coordinator.on_tick());
        });
        let handle = self.scheduler.register_periodic(interval, callback)?;

        Ok(Registration {
            handle,
            interval,
            live,
        })
    }

    fn register_sampling(&self, interval: Duration) -> Result<Registration> {
        let weak = self.self_ref.clone();
        let queries = self.queries.clone();
        let live = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&live);

        let callback: TickCallback = Box::new(move || {
            if !flag.load(Ordering::Acquire) {
                return;
            }
            let summary = queries.summary();
            with_live_coordinator(&weak, &flag, move |coordinator| {
                coordinator.on_sample(summary)
            });
        });
        let handle = self.scheduler.register_periodic(interval, callback)?;

        Ok(Registration {
            handle,
            interval,
            live,
        })
    }

    fn cancel(&self, registration: Registration) {
        // Cleared while the coordinator is locked; callbacks re-check it under the lock.
        registration.live.store(false, Ordering::Release);
        self.scheduler.cancel(registration.handle);
    }

    fn cancel_heartbeat(&mut self) {
        if let Some(registration) = self.heartbeat.take() {
            let id = registration.handle.id();
            self.cancel(registration);
            log::debug!("Tps meter callback cancelled (task {})", id);
        }
    }

    fn cancel_registrations(&mut self) {
        self.cancel_heartbeat();
        if let Some(registration) = self.sampling.take() {
            self.cancel(registration);
        }
    }

    fn send_alert(&self, alert: &Alert) {
        log::warn!("{}", alert.message);
        self.send(&alert.message);
    }

    fn send(&self, message: &str) {
        if let Err(e) = self.sink.broadcast(message) {
            log::warn!("Broadcast failed: {}", e);
        }
    }
}

/// Run `body` on the coordinator unless the registration behind `live` was
/// cancelled, including while this callback waited for the lock.
fn with_live_coordinator(
    weak: &Weak<SharedCoordinator>,
    live: &AtomicBool,
    body: impl FnOnce(&mut ReportingCoordinator),
) {
    let Some(coordinator) = weak.upgrade() else {
        return;
    };
    let mut guard = coordinator.lock();
    if live.load(Ordering::Acquire) {
        body(&mut *guard);
    }
}

//! Heartbeat rate measurement.
//!
//! The meter counts heartbeats and publishes ticks-per-second once per
//! measurement window. The divisor is the measured wall-clock span of the
//! window, so a throttled scheduler shows up as a lower rate.

use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Instant;

use crate::core::config::RateSettings;

use super::clock::Clock;

/// What the published rate currently represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatePhase {
    /// No full window since the last start; the rate is the nominal sentinel
    Warmup,
    Measured,
    /// The meter is stopped and the last value is frozen
    Paused,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateSnapshot {
    pub rate: f64,
    pub phase: RatePhase,
}

/// Read handle onto the latest published rate.
///
/// Rate and phase are published together, so a snapshot never mixes a new
/// rate with an old phase.
#[derive(Debug, Clone)]
pub struct RateReader {
    published: Arc<RwLock<RateSnapshot>>,
}

impl RateReader {
    pub fn current_rate(&self) -> f64 {
        self.published.read().rate
    }

    pub fn snapshot(&self) -> RateSnapshot {
        *self.published.read()
    }
}

/// Counts heartbeats and turns them into a ticks-per-second figure.
///
/// Only the periodic callback mutates a meter; other threads read through a
/// [`RateReader`].
pub struct RateMeter {
    clock: Arc<dyn Clock>,
    settings: RateSettings,
    running: bool,
    ticks_in_window: u64,
    window_start: Option<Instant>,
    published: Arc<RwLock<RateSnapshot>>,
}

impl RateMeter {
    /// Create a stopped meter that reports the nominal rate.
    pub fn new(settings: RateSettings, clock: Arc<dyn Clock>) -> Self {
        let published = Arc::new(RwLock::new(RateSnapshot {
            rate: settings.nominal_rate(),
            phase: RatePhase::Warmup,
        }));

        Self {
            clock,
            settings,
            running: false,
            ticks_in_window: 0,
            window_start: None,
            published,
        }
    }

    pub fn reader(&self) -> RateReader {
        RateReader {
            published: Arc::clone(&self.published),
        }
    }

    /// Replace the window settings. A running meter restarts its window.
    pub fn reconfigure(&mut self, settings: RateSettings) {
        if settings == self.settings {
            return;
        }
        self.settings = settings;
        if self.running {
            self.start();
        }
    }

    /// Begin a fresh measurement. The sentinel is reported until a full window closes.
    pub fn start(&mut self) {
        self.running = true;
        self.ticks_in_window = 0;
        self.window_start = None;
        self.publish(self.settings.nominal_rate(), RatePhase::Warmup);
    }

    /// Stop counting. The last rate stays readable.
    pub fn stop(&mut self) {
        self.running = false;
        self.ticks_in_window = 0;
        self.window_start = None;
        self.published.write().phase = RatePhase::Paused;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Record one heartbeat. Returns true when this tick closed a window.
    pub fn on_tick(&mut self) -> bool {
        if !self.running {
            return false;
        }

        let now = self.clock.now();
        let window_start = match self.window_start {
            Some(start) => start,
            None => {
                self.window_start = Some(now);
                self.ticks_in_window = 0;
                return false;
            }
        };

        // Clock went backwards: drop the window, keep the last rate.
        let Some(elapsed) = now.checked_duration_since(window_start) else {
            log::debug!("Clock anomaly in rate window, discarding sample");
            self.window_start = Some(now);
            self.ticks_in_window = 0;
            return false;
        };

        self.ticks_in_window += 1;

        if elapsed < self.settings.window {
            return false;
        }

        let elapsed_secs = elapsed.as_secs_f64();
        if elapsed_secs > 0.0 {
            let rate = self.ticks_in_window as f64 / elapsed_secs;
            self.publish(rate, RatePhase::Measured);
            log::trace!(
                "Rate window closed: {} ticks in {:.3}s = {:.2}/s",
                self.ticks_in_window,
                elapsed_secs,
                rate
            );
        }

        // The closing tick opens the next window.
        self.window_start = Some(now);
        self.ticks_in_window = 0;
        true
    }

    pub fn current_rate(&self) -> f64 {
        self.published.read().rate
    }

    fn publish(&self, rate: f64, phase: RatePhase) {
        *self.published.write() = RateSnapshot { rate, phase };
    }
}

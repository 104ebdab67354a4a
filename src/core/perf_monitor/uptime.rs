use chrono::{DateTime, Local};
use once_cell::sync::OnceCell;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::clock::Clock;

/// Remembers when monitoring first started in this process run.
pub struct UptimeTracker {
    clock: Arc<dyn Clock>,
    started_at: OnceCell<(Instant, DateTime<Local>)>,
    activations: AtomicU32,
}

impl UptimeTracker {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            started_at: OnceCell::new(),
            activations: AtomicU32::new(0),
        }
    }

    /// Record the start instant. Later calls keep the original instant.
    pub fn start(&self) {
        let clock = &self.clock;
        self.started_at.get_or_init(|| (clock.now(), Local::now()));
        self.activations.fetch_add(1, Ordering::AcqRel);
    }

    pub fn is_started(&self) -> bool {
        self.started_at.get().is_some()
    }

    pub fn started_at(&self) -> Option<Instant> {
        self.started_at.get().map(|(instant, _)| *instant)
    }

    /// Wall-clock time of the first activation, for "last restart" messages.
    pub fn started_at_local(&self) -> Option<DateTime<Local>> {
        self.started_at.get().map(|(_, local)| *local)
    }

    /// Time since the first activation; zero before it.
    pub fn elapsed(&self) -> Duration {
        match self.started_at() {
            Some(start) => self.clock.now().saturating_duration_since(start),
            None => Duration::ZERO,
        }
    }

    /// True when the tracker has been activated exactly once in this run.
    pub fn is_fresh_restart(&self) -> bool {
        self.activations.load(Ordering::Acquire) == 1
    }
}

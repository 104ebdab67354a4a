//! Performance monitoring core.
//!
//! Turns a stream of heartbeats into a ticks-per-second figure and combines it
//! with memory, disk and uptime sampling behind one reporting coordinator.

mod clock;
mod coordinator;
mod monitor;
mod rate_meter;
mod report;
mod resources;
mod uptime;

pub use clock::{Clock, ManualClock, SystemClock};
pub use coordinator::{Collaborators, MonitorState, ReportingCoordinator};
pub use monitor::{MonitorQueries, PerformanceMonitor};
pub use rate_meter::{RateMeter, RatePhase, RateReader, RateSnapshot};
pub use report::{build_summary, Alert, AlertKind, Metric, Summary, ThresholdState};
pub use resources::{
    DiskUsage, MemoryUsage, ResourceProbe, ResourceSample, ResourceSampler, SysinfoProbe,
};
pub use uptime::UptimeTracker;

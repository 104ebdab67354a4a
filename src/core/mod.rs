// Core business logic module

pub mod broadcast;
pub mod config;
pub mod perf_monitor;
pub mod scheduler;
pub mod update;

// Re-export commonly used items
pub use broadcast::{BroadcastSink, ConsoleSink, LogSink};
pub use config::{MonitorConfig, RateSettings};
pub use perf_monitor::{MonitorQueries, MonitorState, PerformanceMonitor};
pub use scheduler::{ManualScheduler, Scheduler, TaskHandle, TokioScheduler};

//! Delivery of human-readable lines to observers.

use colored::Colorize;
use std::io::{self, Write};

use crate::error::{MonitorError, Result};

/// Sends a message to every subscribed observer. Transport is up to the implementor.
pub trait BroadcastSink: Send + Sync {
    fn broadcast(&self, message: &str) -> Result<()>;
}

/// Writes broadcasts to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl BroadcastSink for LogSink {
    fn broadcast(&self, message: &str) -> Result<()> {
        log::info!("{}", message);
        Ok(())
    }
}

/// Prints broadcasts to stdout with a coloured prefix.
#[derive(Debug, Clone)]
pub struct ConsoleSink {
    prefix: String,
}

impl ConsoleSink {
    pub fn new<S: Into<String>>(prefix: S) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new("[perfmon]")
    }
}

impl BroadcastSink for ConsoleSink {
    fn broadcast(&self, message: &str) -> Result<()> {
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{} {}", self.prefix.cyan().bold(), message)
            .map_err(|e| MonitorError::broadcast(format!("stdout: {}", e)))
    }
}

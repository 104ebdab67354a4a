use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Error type for the performance monitor
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The disk path cannot be measured. Never reported as "zero bytes free".
    #[error("Path unavailable: {path}: {reason}")]
    PathUnavailable { path: PathBuf, reason: String },

    #[error("Memory figures unavailable: {0}")]
    MemoryUnavailable(String),

    #[error("Scheduler error: {0}")]
    Scheduler(String),

    #[error("Broadcast failed: {0}")]
    Broadcast(String),

    #[error("Update check failed: {0}")]
    UpdateCheck(String),
}

/// Result type alias for the performance monitor
pub type Result<T> = std::result::Result<T, MonitorError>;

impl MonitorError {
    /// Create a config error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        MonitorError::Config(msg.into())
    }

    /// Create a path unavailable error
    pub fn path_unavailable<P: Into<PathBuf>, S: Into<String>>(path: P, reason: S) -> Self {
        MonitorError::PathUnavailable {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn memory_unavailable<S: Into<String>>(msg: S) -> Self {
        MonitorError::MemoryUnavailable(msg.into())
    }

    pub fn scheduler<S: Into<String>>(msg: S) -> Self {
        MonitorError::Scheduler(msg.into())
    }

    pub fn broadcast<S: Into<String>>(msg: S) -> Self {
        MonitorError::Broadcast(msg.into())
    }

    pub fn update_check<S: Into<String>>(msg: S) -> Self {
        MonitorError::UpdateCheck(msg.into())
    }

    /// Whether the failure only affects the current sample and may clear on retry
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            MonitorError::PathUnavailable { .. } | MonitorError::MemoryUnavailable(_)
        )
    }
}

//! Point-in-time memory and disk sampling.
//!
//! The sampler keeps no history: every call asks the probe for fresh figures
//! and wraps them in an immutable [`ResourceSample`].

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use sysinfo::{Disks, Pid, ProcessRefreshKind, ProcessesToUpdate, System};

use crate::error::{MonitorError, Result};

/// Memory figures in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryUsage {
    /// Resident memory of this process
    pub used_bytes: u64,
    /// Total memory the host could give this process
    pub max_bytes: u64,
    pub available_bytes: u64,
}

impl MemoryUsage {
    pub fn usage_percent(&self) -> f64 {
        if self.max_bytes > 0 {
            (self.used_bytes as f64 / self.max_bytes as f64) * 100.0
        } else {
            0.0
        }
    }
}

/// Disk figures in bytes for the volume holding `path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskUsage {
    pub path: PathBuf,
    pub mount_point: PathBuf,
    pub free_bytes: u64,
    pub total_bytes: u64,
}

impl DiskUsage {
    pub fn used_bytes(&self) -> u64 {
        self.total_bytes.saturating_sub(self.free_bytes)
    }
}

/// Immutable snapshot produced by one sampler call.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceSample {
    pub memory: Option<MemoryUsage>,
    pub disk: Option<DiskUsage>,
    pub taken_at: DateTime<Utc>,
}

/// Source of raw memory and disk figures.
///
/// Implementations must answer from local OS queries; the coordinator may call
/// them from the periodic callback.
pub trait ResourceProbe: Send + Sync {
    fn memory(&self) -> Result<MemoryUsage>;

    /// Usage of the volume containing `path`, which the caller has already canonicalized.
    fn disk(&self, path: &Path) -> Result<DiskUsage>;
}

/// Probe backed by the sysinfo crate.
#[derive(Debug, Clone, Copy)]
pub struct SysinfoProbe {
    pid: Option<Pid>,
}

impl SysinfoProbe {
    pub fn new() -> Self {
        let pid = sysinfo::get_current_pid()
            .map_err(|e| log::warn!("Cannot resolve own pid: {}", e))
            .ok();
        Self { pid }
    }
}

impl Default for SysinfoProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceProbe for SysinfoProbe {
    fn memory(&self) -> Result<MemoryUsage> {
        let pid = self
            .pid
            .ok_or_else(|| MonitorError::memory_unavailable("current process id unknown"))?;

        let mut system = System::new();
        system.refresh_memory();
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::nothing().with_memory(),
        );

        let process = system
            .process(pid)
            .ok_or_else(|| MonitorError::memory_unavailable("process not visible to sysinfo"))?;

        let total = system.total_memory();
        if total == 0 {
            return Err(MonitorError::memory_unavailable(
                "host reported zero total memory",
            ));
        }

        Ok(MemoryUsage {
            used_bytes: process.memory(),
            max_bytes: total,
            available_bytes: system.available_memory(),
        })
    }

    fn disk(&self, path: &Path) -> Result<DiskUsage> {
        let disks = Disks::new_with_refreshed_list();
        let lookup = strip_verbatim_prefix(path);

        let disk = disks
            .iter()
            .filter(|disk| lookup.starts_with(disk.mount_point()))
            .max_by_key(|disk| disk.mount_point().components().count())
            .ok_or_else(|| MonitorError::path_unavailable(path, "no mounted volume contains path"))?;

        Ok(DiskUsage {
            path: path.to_path_buf(),
            mount_point: disk.mount_point().to_path_buf(),
            free_bytes: disk.available_space(),
            total_bytes: disk.total_space(),
        })
    }
}

/// `canonicalize` returns `\\?\C:\...` on Windows while mount points are `C:\`.
#[cfg(windows)]
fn strip_verbatim_prefix(path: &Path) -> PathBuf {
    let text = path.to_string_lossy();
    match text.strip_prefix(r"\\?\") {
        Some(rest) => PathBuf::from(rest),
        None => path.to_path_buf(),
    }
}

#[cfg(not(windows))]
fn strip_verbatim_prefix(path: &Path) -> PathBuf {
    path.to_path_buf()
}

/// Produces fresh memory and disk snapshots.
pub struct ResourceSampler {
    probe: Box<dyn ResourceProbe>,
}

impl ResourceSampler {
    pub fn new() -> Self {
        Self::with_probe(Box::new(SysinfoProbe::new()))
    }

    pub fn with_probe(probe: Box<dyn ResourceProbe>) -> Self {
        Self { probe }
    }

    pub fn sample_memory(&self) -> Result<ResourceSample> {
        let memory = self.probe.memory()?;
        Ok(ResourceSample {
            memory: Some(memory),
            disk: None,
            taken_at: Utc::now(),
        })
    }

    /// Sample the volume holding `path`.
    ///
    /// A path that does not exist or cannot be read is `PathUnavailable`,
    /// never a zeroed sample.
    pub fn sample_disk(&self, path: &Path) -> Result<ResourceSample> {
        let canonical = path
            .canonicalize()
            .map_err(|e| MonitorError::path_unavailable(path, e.to_string()))?;

        std::fs::metadata(&canonical)
            .map_err(|e| MonitorError::path_unavailable(path, e.to_string()))?;

        let mut disk = self.probe.disk(&canonical)?;
        disk.path = path.to_path_buf();

        Ok(ResourceSample {
            memory: None,
            disk: Some(disk),
            taken_at: Utc::now(),
        })
    }
}

impl Default for ResourceSampler {
    fn default() -> Self {
        Self::new()
    }
}

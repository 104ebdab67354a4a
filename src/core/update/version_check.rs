use once_cell::sync::OnceCell;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::error::{MonitorError, Result};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(8);
const READ_TIMEOUT: Duration = Duration::from_secs(15);

/// Version of the running binary.
pub fn current_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Result of the background version check, written at most once.
///
/// Until a check succeeds the running version is assumed to be the latest.
#[derive(Debug, Default)]
pub struct VersionStatus {
    latest: OnceCell<String>,
}

impl VersionStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish the version reported by the endpoint. Only the first call has an effect.
    pub fn publish(&self, latest: String) -> bool {
        self.latest.set(latest).is_ok()
    }

    pub fn latest_known(&self) -> Option<&str> {
        self.latest.get().map(String::as_str)
    }

    pub fn is_latest_version(&self) -> bool {
        match self.latest.get() {
            Some(latest) => !is_newer_version(latest, current_version()),
            None => true,
        }
    }
}

/// Fetch the latest version string: the first line of the endpoint's body.
pub fn fetch_latest_version(url: &str) -> Result<String> {
    let client = reqwest::blocking::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(READ_TIMEOUT)
        .user_agent(format!("perfmon {}", current_version()))
        .build()
        .map_err(|e| MonitorError::update_check(e.to_string()))?;

    let response = client
        .get(url)
        .send()
        .map_err(|e| MonitorError::update_check(e.to_string()))?;

    if !response.status().is_success() {
        return Err(MonitorError::update_check(format!(
            "endpoint returned status {}",
            response.status()
        )));
    }

    let body = response
        .text()
        .map_err(|e| MonitorError::update_check(e.to_string()))?;

    parse_version_line(&body)
        .ok_or_else(|| MonitorError::update_check("empty version response"))
}

fn parse_version_line(body: &str) -> Option<String> {
    body.lines()
        .next()
        .map(|line| line.trim().trim_start_matches('v').to_string())
        .filter(|line| !line.is_empty())
}

/// Run the check on its own thread and publish the outcome into `status`.
///
/// Failures are logged and leave the status untouched.
pub fn spawn_version_check(
    url: String,
    status: Arc<VersionStatus>,
) -> Result<thread::JoinHandle<()>> {
    let handle = thread::Builder::new()
        .name("perfmon-version-check".to_string())
        .spawn(move || match fetch_latest_version(&url) {
            Ok(latest) => {
                if is_newer_version(&latest, current_version()) {
                    log::info!(
                        "There is a new version available for download: {} (running {})",
                        latest,
                        current_version()
                    );
                }
                status.publish(latest);
            }
            Err(e) => {
                log::warn!("Could not check for latest version: {}", e);
            }
        })?;

    Ok(handle)
}

/// Compare dotted numeric versions. True when `new` is more recent than `current`.
pub fn is_newer_version(new: &str, current: &str) -> bool {
    let parse_version =
        |v: &str| -> Vec<u32> { v.split('.').filter_map(|s| s.parse::<u32>().ok()).collect() };

    let new_parts = parse_version(new);
    let current_parts = parse_version(current);

    for (new_part, current_part) in new_parts.iter().zip(current_parts.iter()) {
        if new_part > current_part {
            return true;
        } else if new_part < current_part {
            return false;
        }
    }

    new_parts.len() > current_parts.len()
}

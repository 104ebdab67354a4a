// Command handlers module
pub mod config;
pub mod run;
pub mod status;
pub mod version;

use anyhow::{Context, Result};
use clap::ArgMatches;
use std::path::PathBuf;

use crate::core::config::MonitorConfig;

/// Config file passed with the global `--config` flag, if any.
pub(crate) fn config_path(matches: &ArgMatches) -> Option<PathBuf> {
    matches
        .try_get_one::<String>("config")
        .ok()
        .flatten()
        .map(PathBuf::from)
}

pub(crate) fn load_config(matches: &ArgMatches) -> Result<MonitorConfig> {
    let path = config_path(matches);
    MonitorConfig::load(path.as_deref()).with_context(|| match path {
        Some(ref p) => format!("Failed to load config from {}", p.display()),
        None => "Failed to load config".to_string(),
    })
}

use anyhow::{bail, Context, Result};
use clap::ArgMatches;
use colored::Colorize;

use crate::core::config::MonitorConfig;

use super::{config_path, load_config};

pub fn execute(matches: &ArgMatches) -> Result<()> {
    match matches.subcommand() {
        Some(("show", sub_matches)) => show(sub_matches),
        Some(("init", sub_matches)) => init(sub_matches),
        Some(("path", sub_matches)) => path(sub_matches),
        Some(("validate", sub_matches)) => validate(sub_matches),
        _ => {
            println!("Use 'perfmon config --help' for more information.");
            Ok(())
        }
    }
}

fn resolved_path(matches: &ArgMatches) -> Result<std::path::PathBuf> {
    match config_path(matches) {
        Some(path) => Ok(path),
        None => MonitorConfig::default_path().context("Could not determine config path"),
    }
}

fn show(matches: &ArgMatches) -> Result<()> {
    let config = load_config(matches)?;
    let path = resolved_path(matches)?;

    println!("{} {}", "Config file:".cyan(), path.display());
    if !path.exists() {
        println!("{}", "(not found, showing defaults)".dimmed());
    }
    println!(
        "{}",
        serde_json::to_string_pretty(&config).context("Failed to serialize config")?
    );
    Ok(())
}

fn init(matches: &ArgMatches) -> Result<()> {
    let path = resolved_path(matches)?;
    let force = matches.get_flag("force");

    if path.exists() && !force {
        bail!(
            "Config already exists at {} (use --force to overwrite)",
            path.display()
        );
    }

    let written = MonitorConfig::default()
        .save(Some(&path))
        .with_context(|| format!("Failed to write config to {}", path.display()))?;
    println!("{} {}", "✓ Default config written to".green(), written.display());
    Ok(())
}

fn path(matches: &ArgMatches) -> Result<()> {
    println!("{}", resolved_path(matches)?.display());
    Ok(())
}

fn validate(matches: &ArgMatches) -> Result<()> {
    let config = load_config(matches)?;
    config.validate().context("Invalid configuration")?;
    println!("{}", "✓ Configuration is valid".green());
    Ok(())
}

use anyhow::{Context, Result};
use clap::ArgMatches;
use colored::Colorize;

use crate::core::update::{current_version, fetch_latest_version, is_newer_version};

use super::load_config;

pub fn execute(matches: &ArgMatches) -> Result<()> {
    println!("perfmon version {}", current_version());

    if !matches.get_flag("check") {
        return Ok(());
    }

    let url = match matches.get_one::<String>("url") {
        Some(url) => url.clone(),
        None => load_config(matches)?
            .update_url
            .context("No update_url configured; pass --url")?,
    };

    let latest = fetch_latest_version(&url).context("Could not check for latest version")?;
    if is_newer_version(&latest, current_version()) {
        println!(
            "{} {}",
            "There is a new version available:".yellow(),
            latest.bold()
        );
    } else {
        println!("{}", "You are running the latest version".green());
    }

    Ok(())
}

use anyhow::{Context, Result};
use clap::ArgMatches;
use colored::Colorize;
use std::thread;

use crate::core::perf_monitor::PerformanceMonitor;

use super::load_config;

/// Print the server state: tick rate, memory, disk, uptime and version.
///
/// Unless `--quick` is given the tick rate is measured over one full window
/// first, so the reported figure is not the warm-up value.
pub fn execute(matches: &ArgMatches) -> Result<()> {
    let config = load_config(matches)?;
    let quick = matches.get_flag("quick");
    let measure_for = config.rate_window() + config.tick_interval() * 2;
    let measure = config.show_tps && !quick;

    let monitor = PerformanceMonitor::with_defaults(config).context("Failed to create monitor")?;
    monitor.start().context("Failed to start monitor")?;

    if measure {
        println!(
            "{}",
            format!("Measuring tick rate for {:.1}s...", measure_for.as_secs_f64()).dimmed()
        );
        thread::sleep(measure_for);
    }

    let lines = monitor.queries().status_lines();
    let mut lines = lines.into_iter();
    if let Some(header) = lines.next() {
        println!("{}", header.cyan().bold());
    }
    for line in lines {
        match line.split_once(": ") {
            Some((label, value)) => println!("  {}: {}", label.bold(), value),
            None => println!("  {}", line),
        }
    }

    monitor.shutdown();
    Ok(())
}

use anyhow::{Context, Result};
use clap::ArgMatches;
use colored::Colorize;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use crate::core::broadcast::ConsoleSink;
use crate::core::perf_monitor::PerformanceMonitor;

use super::load_config;

/// Run the monitor until Ctrl-C or until `--duration` elapses.
pub fn execute(matches: &ArgMatches) -> Result<()> {
    let config = load_config(matches)?;
    let duration = matches.get_one::<u64>("duration").copied();

    let monitor = PerformanceMonitor::with_sink(config, Arc::new(ConsoleSink::default()))
        .context("Failed to create monitor")?;
    monitor.start().context("Failed to start monitor")?;

    let (stop_tx, stop_rx) = mpsc::channel::<()>();
    ctrlc::set_handler(move || {
        let _ = stop_tx.send(());
    })
    .context("Failed to install Ctrl-C handler")?;

    println!(
        "{} (state: {}, press Ctrl-C to stop)",
        "Monitoring started".green().bold(),
        monitor.state()
    );

    if let Some(observer) = matches.get_one::<String>("login") {
        for line in monitor.on_login(observer) {
            println!("  {}", line);
        }
    }

    match duration {
        Some(secs) => {
            let _ = stop_rx.recv_timeout(Duration::from_secs(secs));
        }
        None => {
            let _ = stop_rx.recv();
        }
    }

    println!("\n{}", "Final report:".bold());
    let summary = monitor.report_now();
    for metric in &summary.unavailable {
        println!("  {} {}", metric.to_string().yellow(), "unavailable".dimmed());
    }

    monitor.shutdown();
    println!("{}", "Monitoring stopped".green());

    Ok(())
}

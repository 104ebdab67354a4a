use chrono::{DateTime, Local};
use humansize::{format_size as human_format_size, BINARY};
use std::time::Duration;

/// Format a byte count in human-readable binary units (KiB, MiB, GiB)
pub fn format_size(size: u64) -> String {
    human_format_size(size, BINARY)
}

/// Format a timestamp as YYYY-MM-DD HH:MM
pub fn format_time(time: DateTime<Local>) -> String {
    time.format("%Y-%m-%d %H:%M").to_string()
}

/// Format a duration as "1d 2h 3m 4s", dropping leading zero units
pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;
    let seconds = total % 60;

    if days > 0 {
        format!("{}d {}h {}m {}s", days, hours, minutes, seconds)
    } else if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

pub fn format_rate(rate: f64) -> String {
    format!("{:.2}", rate)
}

pub fn format_percent(percent: f64) -> String {
    format!("{:.1}%", percent)
}

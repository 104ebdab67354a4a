// Presentation helpers: unit conversion and text formatting

pub mod formatters;

pub use formatters::{format_duration, format_percent, format_rate, format_size, format_time};

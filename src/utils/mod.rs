//! Utilities: errors, logging, charts and console formatting

pub mod charts;
pub mod error;
pub mod logging;

pub use error::{Result, TomatoError};
pub use logging::{init_logging, LogConfig, LogLevel};

/// Human-readable duration: `42.0s`, `3m 05s`, `1h 02m`
pub fn format_duration(seconds: f64) -> String {
    let seconds = seconds.max(0.0);
    if seconds < 60.0 {
        return format!("{:.1}s", seconds);
    }

    let whole = seconds.round() as u64;
    let (hours, minutes, secs) = (whole / 3600, (whole % 3600) / 60, whole % 60);
    if hours > 0 {
        format!("{}h {:02}m", hours, minutes)
    } else {
        format!("{}m {:02}s", minutes, secs)
    }
}

/// Group digits by thousands: `4289418` -> `4,289,418`
pub fn format_number(n: usize) -> String {
    let digits = n.to_string();
    let (head, rest) = digits.split_at(digits.len() % 3);

    let mut out = head.to_string();
    for start in (0..rest.len()).step_by(3) {
        if !out.is_empty() {
            out.push(',');
        }
        out.push_str(&rest[start..start + 3]);
    }
    out
}

//! Formatting utilities

use humansize::{DECIMAL, format_size};

/// Format file size in human-readable format
pub fn format_bytes(bytes: u64) -> String {
    format_size(bytes, DECIMAL)
}

/// Format a signed size change, e.g. `+1.02 kB`
pub fn format_delta(delta: i64) -> String {
    let sign = if delta < 0 { '-' } else { '+' };
    format!("{sign}{}", format_bytes(delta.unsigned_abs()))
}

/// Format a load-order priority, showing unlisted entries as `-`
pub fn format_priority(priority: i32) -> String {
    if priority == 0 {
        "-".to_string()
    } else {
        priority.to_string()
    }
}

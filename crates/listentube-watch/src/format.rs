//! Human-readable progress values

const UNITS: &[&str] = &["B", "KB", "MB", "GB"];

/// Binary-scaled size with at most two decimals, e.g. `1.5 KB`
pub fn format_bytes(bytes: u64) -> String {
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let fixed = format!("{:.2}", value);
    let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", trimmed, UNITS[unit])
}

/// Remaining time as `m:ss`, or `--` when unknown
pub fn format_eta(eta: Option<u64>) -> String {
    match eta {
        Some(secs) if secs > 0 => format!("{}:{:02}", secs / 60, secs % 60),
        _ => "--".to_string(),
    }
}

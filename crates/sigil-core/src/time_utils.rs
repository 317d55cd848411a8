use chrono::DateTime;

/// Returns the current Unix timestamp in milliseconds.
pub fn current_unix_timestamp_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
        .try_into()
        .unwrap_or(u64::MAX)
}

/// Returns the current Unix timestamp in seconds.
pub fn current_unix_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Renders a Unix-seconds timestamp as a UTC wall-clock string for listings
/// and relay notices. Out-of-range values fall back to the raw number.
pub fn format_unix_timestamp(unix_seconds: i64) -> String {
    match DateTime::from_timestamp(unix_seconds, 0) {
        Some(moment) => moment.format("%Y-%m-%d %H:%M UTC").to_string(),
        None => unix_seconds.to_string(),
    }
}

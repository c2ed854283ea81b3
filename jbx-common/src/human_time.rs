//! Human-readable time display
//!
//! Formats millisecond track positions the way a jukebox display shows them.
//! Unknown values are rendered as a placeholder rather than "0:00" so a
//! stream that has not reported timing yet is distinguishable from one at
//! the start of a track.

/// Placeholder shown while stream timing is still unknown
pub const UNKNOWN_TIME: &str = "--:--";

/// Format a millisecond position as `M:SS` (or `H:MM:SS` above one hour).
pub fn format_ms(ms: u64) -> String {
    let total_secs = ms / 1000;
    let hours = total_secs / 3600;
    let mins = (total_secs % 3600) / 60;
    let secs = total_secs % 60;
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, mins, secs)
    } else {
        format!("{}:{:02}", mins, secs)
    }
}

/// Format an optional millisecond position, using the placeholder when
/// the value is unknown.
pub fn format_opt_ms(ms: Option<u64>) -> String {
    match ms {
        Some(ms) => format_ms(ms),
        None => UNKNOWN_TIME.to_string(),
    }
}

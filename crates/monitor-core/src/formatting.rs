/// Format a session's running time from whole seconds.
///
/// Seconds are shown only during the first minute; minutes are truncated,
/// never rounded, so a session does not jump ahead of the clock.
///
/// # Examples
///
/// ```
/// use monitor_core::formatting::format_elapsed;
///
/// assert_eq!(format_elapsed(0),    "0s");
/// assert_eq!(format_elapsed(59),   "59s");
/// assert_eq!(format_elapsed(119),  "1m");
/// assert_eq!(format_elapsed(3600), "1h 0m");
/// assert_eq!(format_elapsed(7500), "2h 5m");
/// ```
pub fn format_elapsed(secs: u64) -> String {
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    }
}

/// Shorten `s` to at most `max_chars` characters, ending in `…` when cut.
///
/// Newlines are folded into spaces so a multi-line prompt fits one row.
pub fn truncate_line(s: &str, max_chars: usize) -> String {
    let flat: String = s
        .chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect();
    if flat.chars().count() <= max_chars {
        return flat;
    }
    if max_chars == 0 {
        return String::new();
    }
    let mut out: String = flat.chars().take(max_chars - 1).collect();
    out.push('…');
    out
}

// ── Tests ──────────────────────────────────────────────────────────────────────

// crates/capdeck-ui/src/helpers/format.rs
//
// UI-layer string utilities: payload sizes, elapsed-time readouts, and name
// truncation for fixed-width library cards. Display-only — nothing here has
// meaning outside a label.

use std::time::Duration;

/// Human-readable payload size: "412 B", "38.2 KB", "4.1 MB".
pub fn format_bytes(bytes: usize) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = 1024.0 * 1024.0;
    let b = bytes as f64;
    if b >= MB {
        format!("{:.1} MB", b / MB)
    } else if b >= KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{bytes} B")
    }
}

/// Elapsed recording time as "m:ss".
pub fn format_elapsed(elapsed: Duration) -> String {
    let total = elapsed.as_secs();
    format!("{}:{:02}", total / 60, total % 60)
}

/// Truncate `s` to at most `max` characters, respecting UTF-8 boundaries.
/// Used by the library card grid to keep item names inside their tiles.
pub fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((end, _)) => &s[..end],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_pick_the_right_unit() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(412), "412 B");
        assert_eq!(format_bytes(39_120), "38.2 KB");
        assert_eq!(format_bytes(4_300_000), "4.1 MB");
    }

    #[test]
    fn elapsed_reads_as_minutes_seconds() {
        assert_eq!(format_elapsed(Duration::from_secs(0)), "0:00");
        assert_eq!(format_elapsed(Duration::from_secs(9)), "0:09");
        assert_eq!(format_elapsed(Duration::from_secs(61)), "1:01");
        assert_eq!(format_elapsed(Duration::from_secs(600)), "10:00");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("recording-1700000000123.wav", 9), "recording");
        assert_eq!(truncate("héllo", 2), "hé");
    }
}

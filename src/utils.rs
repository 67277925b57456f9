//! Formatting helpers for command output.

use chrono::{DateTime, Utc};

/// Format a number with thousands separators.
///
/// ```
/// use pangrosan::utils::format_count;
/// assert_eq!(format_count(1234567), "1,234,567");
/// ```
pub fn format_count(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Truncate to at most `max_chars` characters, ending with "..." when cut.
/// Counts characters, not bytes, so org names with accents are safe.
pub fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    if max_chars <= 3 {
        return "...".to_string();
    }
    let kept: String = s.chars().take(max_chars - 3).collect();
    format!("{}...", kept)
}

/// Coarse "time since" for the last-run line.
pub fn format_duration_ago(dt: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = now.signed_duration_since(dt).num_seconds();
    if seconds < 60 {
        "just now".to_string()
    } else if seconds < 3600 {
        format!("{}m ago", seconds / 60)
    } else if seconds < 86400 {
        format!("{}h ago", seconds / 3600)
    } else {
        format!("{}d ago", seconds / 86400)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_format_count() {
        assert_eq!(format_count(0), "0");
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1000), "1,000");
        assert_eq!(format_count(12345), "12,345");
        assert_eq!(format_count(123456), "123,456");
        assert_eq!(format_count(1234567890), "1,234,567,890");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("this is a long string", 10), "this is...");
        assert_eq!(truncate("exactly10!", 10), "exactly10!");
        assert_eq!(truncate("test", 3), "...");
        assert_eq!(truncate("Télécom Société", 8), "Téléc...");
    }

    #[test]
    fn test_format_duration_ago() {
        let now = Utc::now();
        assert_eq!(format_duration_ago(now, now), "just now");
        assert_eq!(format_duration_ago(now - Duration::minutes(5), now), "5m ago");
        assert_eq!(format_duration_ago(now - Duration::hours(3), now), "3h ago");
        assert_eq!(format_duration_ago(now - Duration::days(2), now), "2d ago");
    }
}

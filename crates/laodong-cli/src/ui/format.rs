//! Small text formatters shared by the tables and the REPL.

use chrono::{DateTime, Utc};

/// Truncate to at most `max_chars` characters, ending with `...` when cut.
///
/// Counts characters, not bytes, so Vietnamese diacritics are never split.
pub fn truncate_str(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    if max_chars <= 3 {
        return ".".repeat(max_chars);
    }
    let kept: String = s.chars().take(max_chars - 3).collect();
    format!("{}...", kept)
}

/// Relative age of a timestamp: "just now", "5 mins ago", "3h ago", "2d ago",
/// or the date when older than a week.
pub fn format_relative_time(timestamp: DateTime<Utc>) -> String {
    let duration = Utc::now().signed_duration_since(timestamp);

    if duration.num_seconds() < 0 {
        return timestamp.format("%Y-%m-%d").to_string();
    }

    if duration.num_minutes() < 1 {
        "just now".to_string()
    } else if duration.num_hours() < 1 {
        format!("{} mins ago", duration.num_minutes())
    } else if duration.num_hours() < 24 {
        format!("{}h ago", duration.num_hours())
    } else if duration.num_days() < 7 {
        format!("{}d ago", duration.num_days())
    } else {
        timestamp.format("%Y-%m-%d").to_string()
    }
}

/// Latency in ms or s, e.g. `42 ms`, `1.3 s`.
pub fn format_latency(ms: u64) -> String {
    if ms >= 1000 {
        format!("{:.1} s", ms as f64 / 1000.0)
    } else {
        format!("{} ms", ms)
    }
}

/// Number with thousands separators.
pub fn format_thousands(n: u64) -> String {
    let digits = n.to_string();
    let len = digits.len();
    let mut result = String::with_capacity(len + len / 3);

    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }

    result
}

/// Collapse whitespace runs (including newlines) into single spaces.
pub fn one_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_truncate_str() {
        assert_eq!(truncate_str("hello", 10), "hello");
        assert_eq!(truncate_str("hello world", 8), "hello...");
        assert_eq!(truncate_str("hello", 3), "...");
        // Multibyte characters count once.
        assert_eq!(truncate_str("Nghỉ thai sản", 13), "Nghỉ thai sản");
        assert_eq!(truncate_str("Nghỉ thai sản", 7), "Nghỉ...");
    }

    #[test]
    fn test_format_relative_time() {
        assert_eq!(format_relative_time(Utc::now()), "just now");
        assert_eq!(
            format_relative_time(Utc::now() - Duration::minutes(5)),
            "5 mins ago"
        );
        assert_eq!(format_relative_time(Utc::now() - Duration::hours(3)), "3h ago");
    }

    #[test]
    fn test_format_latency() {
        assert_eq!(format_latency(42), "42 ms");
        assert_eq!(format_latency(1300), "1.3 s");
    }

    #[test]
    fn test_format_thousands() {
        assert_eq!(format_thousands(0), "0");
        assert_eq!(format_thousands(999), "999");
        assert_eq!(format_thousands(12345), "12,345");
        assert_eq!(format_thousands(1234567), "1,234,567");
    }

    #[test]
    fn test_one_line() {
        assert_eq!(one_line("Điều 139\n  Nghỉ thai sản"), "Điều 139 Nghỉ thai sản");
    }
}

use chrono::{DateTime, SecondsFormat, Utc};

/// Keeps only the ASCII digits of `text` ("1.234.567 views" -> 1234567). Empty or
/// overflowing input yields 0.
pub fn parse_digits(text: &str) -> u64 {
    let digits: String = text.chars().filter(char::is_ascii_digit).collect();
    digits.parse().unwrap_or(0)
}

/// Parse a clock-style length ("4:13", "1:02:03") to total seconds. `None` when the text
/// is not a clock or the total does not fit.
pub fn parse_clock_duration(text: &str) -> Option<u64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    text.split(':').try_fold(0u64, |total, part| {
        let part = part.trim();
        if part.is_empty() || !part.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        total.checked_mul(60)?.checked_add(part.parse::<u64>().ok()?)
    })
}

pub fn sanitize_for_filename(query: &str) -> String {
    query
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// `youtube-comments-<query>-<timestamp>.csv`, with `:` and `.` of the ISO timestamp
/// replaced by `-`.
pub fn csv_filename(query: &str, now: DateTime<Utc>) -> String {
    let timestamp = now
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-");
    format!(
        "youtube-comments-{}-{timestamp}.csv",
        sanitize_for_filename(query)
    )
}

use chrono::{DateTime, Utc};

/// Shorten a hash for list display: first 8 and last 8 characters.
/// Examples: "0x1234ab...9f8e7d6c", "-" for empty input
pub fn short_hash(hash: &str) -> String {
    if hash.is_empty() {
        return "-".to_string();
    }
    let chars: Vec<char> = hash.chars().collect();
    if chars.len() <= 19 {
        return hash.to_string();
    }
    let head: String = chars[..8].iter().collect();
    let tail: String = chars[chars.len() - 8..].iter().collect();
    format!("{head}...{tail}")
}

/// Format epoch milliseconds as a UTC timestamp.
/// Example: "2023-11-14 22:13:20 UTC"
pub fn format_timestamp(ts_ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(ts_ms)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| format!("{ts_ms} ms"))
}

/// Relative age of an epoch-millis timestamp.
/// Examples: "12s ago", "5m ago", "3h ago", "2d ago", "in 30s"
pub fn format_time_ago(ts_ms: i64, now: DateTime<Utc>) -> String {
    let delta = now.timestamp_millis().saturating_sub(ts_ms) / 1000;
    if delta < 0 {
        return format!("in {}s", -delta);
    }
    match delta {
        0..=59 => format!("{delta}s ago"),
        60..=3599 => format!("{}m ago", delta / 60),
        3600..=86_399 => format!("{}h ago", delta / 3600),
        _ => format!("{}d ago", delta / 86_400),
    }
}

/// Shift a raw integer balance by `decimals` places without going through floats.
/// Examples: ("12345", 2) -> "123.45", ("5", 3) -> "0.005", ("1000", 3) -> "1"
pub fn format_balance(raw: &str, decimals: u32) -> String {
    let raw = raw.trim();
    if decimals == 0 || raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return raw.to_string();
    }
    let d = decimals as usize;
    let padded = format!("{raw:0>width$}", width = d + 1);
    let (int, frac) = padded.split_at(padded.len() - d);
    let int = int.trim_start_matches('0');
    let int = if int.is_empty() { "0" } else { int };
    let frac = frac.trim_end_matches('0');
    if frac.is_empty() {
        int.to_string()
    } else {
        format!("{int}.{frac}")
    }
}

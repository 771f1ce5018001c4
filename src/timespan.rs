//! Time helpers: unit constants, timespan parsing and human readable ages

use crate::error::TimespanError;
use chrono::Utc;

pub const MINUTE: i64 = 60;
pub const HOUR: i64 = 60 * MINUTE;
pub const DAY: i64 = 24 * HOUR;

/// Current unix time in seconds with sub-second precision
pub fn now_ts() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}

/// Parses a timespan such as `"90"`, `"1d12h"` or `"2h, 30m"` into seconds
///
/// A plain integer is taken as seconds. Otherwise the string is a sequence of
/// `<digits><unit>` components where unit is one of `d`, `h`, `m`, `s`
/// (case-insensitive). Spaces and `,;:/.` tabs between components are ignored.
pub fn parse_timespan_to_seconds(span: &str) -> Result<u64, TimespanError> {
    if let Ok(seconds) = span.trim().parse::<u64>() {
        return Ok(seconds);
    }

    let mut result: u64 = 0;
    let mut number = String::new();

    for symbol in span.chars().map(|c| c.to_ascii_lowercase()) {
        match symbol {
            'd' | 'h' | 'm' | 's' => {
                if number.is_empty() {
                    return Err(TimespanError::MissingDigits(symbol));
                }
                let value: u64 = number
                    .parse()
                    .map_err(|_| TimespanError::InvalidNumber(number.clone()))?;
                let multiplier = match symbol {
                    'd' => DAY as u64,
                    'h' => HOUR as u64,
                    'm' => MINUTE as u64,
                    _ => 1,
                };
                result = value
                    .checked_mul(multiplier)
                    .and_then(|seconds| result.checked_add(seconds))
                    .ok_or_else(|| TimespanError::Overflow(span.to_string()))?;
                number.clear();
            }
            '0'..='9' => number.push(symbol),
            ' ' | ',' | ';' | ':' | '\t' | '/' | '.' => {}
            other => return Err(TimespanError::UnexpectedSymbol(other)),
        }
    }

    if !number.is_empty() {
        return Err(TimespanError::UnfinishedComponent(number));
    }

    Ok(result)
}

/// Formats a number of seconds as e.g. `"2 days 3 hours"` or `"5 min 10 sec"`
pub fn seconds_human(seconds: i64) -> String {
    if seconds == 0 {
        return "same time".to_string();
    }

    let minutes = seconds / 60;
    let hours = minutes / 60;
    let days = hours / 24;

    let mut parts = Vec::new();
    if days != 0 {
        parts.push(format!("{} {}", days, if days == 1 { "day" } else { "days" }));
    }
    if days <= 31 && hours % 24 != 0 {
        parts.push(format!(
            "{} {}",
            hours % 24,
            if hours % 24 == 1 { "hour" } else { "hours" }
        ));
    }
    if days == 0 && minutes % 60 != 0 {
        parts.push(format!("{} min", minutes % 60));
    }
    if hours == 0 && seconds % 60 != 0 {
        parts.push(format!("{} sec", seconds % 60));
    }
    parts.join(" ")
}

/// `"3 hours ago"` style age of a unix timestamp, `"never"` for zero
pub fn format_time_ago(ts: i64) -> String {
    if ts == 0 {
        return "never".to_string();
    }
    let elapsed = now_ts() as i64 - ts;
    format!("{} ago", seconds_human(elapsed))
}

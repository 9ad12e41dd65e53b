use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use std::time::SystemTime;

use crate::error::ArchiveError;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Convert system time to UTC DateTime, keeping sub-second precision
pub fn system_time_to_utc(system_time: SystemTime) -> DateTime<Utc> {
    DateTime::<Utc>::from(system_time)
}

/// Whole seconds elapsed between `timestamp` and `now` (negative if in the future)
pub fn age_in_seconds(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - timestamp).num_seconds()
}

/// Age expressed in fractional days, used for listings
pub fn age_in_days(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    age_in_seconds(timestamp, now) as f64 / 86_400.0
}

/// Parse an age threshold in days; decimals are allowed
pub fn parse_days(raw: &str) -> Result<f64, ArchiveError> {
    let days: f64 = raw
        .trim()
        .parse()
        .map_err(|_| ArchiveError::InvalidDays(raw.to_string()))?;
    validate_days(days)
}

fn validate_days(days: f64) -> Result<f64, ArchiveError> {
    if !days.is_finite() || days < 0.0 {
        return Err(ArchiveError::InvalidDays(days.to_string()));
    }
    Ok(days)
}

/// Compute the point in time before which files count as stale
pub fn cutoff_for_days(start: DateTime<Utc>, days: f64) -> Result<DateTime<Utc>> {
    let days = validate_days(days)?;

    let millis = (days * MILLIS_PER_DAY).round() as i64;
    let window = Duration::try_milliseconds(millis)
        .ok_or_else(|| ArchiveError::InvalidDays(days.to_string()))?;

    start
        .checked_sub_signed(window)
        .ok_or_else(|| ArchiveError::InvalidDays(days.to_string()).into())
}

/// Full timestamp used in log lines
pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Year-month label (`YYYY-MM`, UTC)
pub fn year_month(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%Y-%m").to_string()
}

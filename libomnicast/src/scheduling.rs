//! Schedule string parsing
//!
//! Turns human-entered schedule strings into concrete UTC times. Accepted
//! forms are relative durations ("30m", "2h", "1 day"), natural language
//! ("tomorrow", "next friday 9am", "2026-09-01 15:00"), and randomized
//! intervals ("random:1h-4h") for posting cadences that should not look
//! mechanical.

use crate::error::{OmnicastError, Result};
use chrono::{DateTime, Duration, Utc};
use rand::Rng;

// Bounds on the random interval form
const RANDOM_FLOOR_SECONDS: i64 = 30;
const RANDOM_CEIL_SECONDS: i64 = 30 * 24 * 3600;

/// Parse a schedule string into a UTC time.
///
/// For `random:MIN-MAX`, the interval is added to `last_scheduled` when one
/// exists so a run of queued posts spreads out instead of clustering at now.
pub fn parse_schedule(input: &str, last_scheduled: Option<i64>) -> Result<DateTime<Utc>> {
    let input = input.trim();
    if input.is_empty() {
        return Err(OmnicastError::InvalidInput(
            "Schedule string cannot be empty".to_string(),
        ));
    }

    if let Some(range) = input.strip_prefix("random:") {
        return parse_random(range, last_scheduled);
    }

    if let Ok(duration) = parse_duration(input) {
        return Ok(Utc::now() + duration);
    }

    if let Ok(dt) =
        chrono_english::parse_date_string(input, Utc::now(), chrono_english::Dialect::Us)
    {
        return Ok(dt);
    }

    Err(OmnicastError::InvalidInput(format!(
        "Could not parse schedule string: {}",
        input
    )))
}

fn parse_duration(input: &str) -> Result<Duration> {
    let std_duration = humantime::parse_duration(input)
        .map_err(|_| OmnicastError::InvalidInput(format!("Could not parse duration: {}", input)))?;

    Duration::try_seconds(std_duration.as_secs() as i64)
        .ok_or_else(|| OmnicastError::InvalidInput("Duration out of range".to_string()))
}

/// Parse the `MIN-MAX` part of a random schedule and pick a point inside it
fn parse_random(range: &str, last_scheduled: Option<i64>) -> Result<DateTime<Utc>> {
    let (min_str, max_str) = range.split_once('-').ok_or_else(|| {
        OmnicastError::InvalidInput("Random schedule must be random:MIN-MAX".to_string())
    })?;

    let min_secs = parse_duration(min_str)?.num_seconds();
    let max_secs = parse_duration(max_str)?.num_seconds();

    if min_secs < RANDOM_FLOOR_SECONDS {
        return Err(OmnicastError::InvalidInput(format!(
            "Minimum random interval must be at least {} seconds",
            RANDOM_FLOOR_SECONDS
        )));
    }
    if max_secs > RANDOM_CEIL_SECONDS {
        return Err(OmnicastError::InvalidInput(format!(
            "Maximum random interval must be at most {} days",
            RANDOM_CEIL_SECONDS / (24 * 3600)
        )));
    }
    if min_secs >= max_secs {
        return Err(OmnicastError::InvalidInput(
            "Minimum must be less than maximum".to_string(),
        ));
    }

    let base = last_scheduled
        .and_then(|ts| DateTime::from_timestamp(ts, 0))
        .unwrap_or_else(Utc::now);
    let offset = rand::thread_rng().gen_range(min_secs..=max_secs);

    Ok(base + Duration::try_seconds(offset).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration_minutes() {
        let scheduled = parse_schedule("30m", None).unwrap();
        let diff = (scheduled - Utc::now()).num_minutes();
        assert!((29..=31).contains(&diff), "Expected ~30 minutes, got {}", diff);
    }

    #[test]
    fn test_parse_duration_with_space() {
        let scheduled = parse_schedule("2 hours", None).unwrap();
        let diff = (scheduled - Utc::now()).num_minutes();
        assert!((119..=121).contains(&diff), "Expected ~2 hours, got {}", diff);
    }

    #[test]
    fn test_parse_tomorrow() {
        let scheduled = parse_schedule("tomorrow", None).unwrap();
        let diff = (scheduled - Utc::now()).num_hours();
        assert!((20..=28).contains(&diff), "Expected ~24 hours, got {}", diff);
    }

    #[test]
    fn test_parse_random_without_anchor() {
        let scheduled = parse_schedule("random:10m-20m", None).unwrap();
        let diff = (scheduled - Utc::now()).num_minutes();
        assert!((10..=20).contains(&diff), "Expected 10-20 minutes, got {}", diff);
    }

    #[test]
    fn test_parse_random_anchors_on_last_scheduled() {
        let last = Utc::now().timestamp() + 3600;
        let scheduled = parse_schedule("random:10m-20m", Some(last)).unwrap();
        let diff = (scheduled.timestamp() - last) / 60;
        assert!(
            (10..=20).contains(&diff),
            "Expected 10-20 minutes after anchor, got {}",
            diff
        );
    }

    #[test]
    fn test_parse_random_mixed_units() {
        let scheduled = parse_schedule("random:30m-2h", None).unwrap();
        let diff = (scheduled - Utc::now()).num_minutes();
        assert!((30..=120).contains(&diff));
    }

    #[test]
    fn test_parse_empty_string() {
        assert!(parse_schedule("", None).is_err());
        assert!(parse_schedule("   ", None).is_err());
    }

    #[test]
    fn test_parse_invalid_format() {
        assert!(parse_schedule("not a time", None).is_err());
    }

    #[test]
    fn test_parse_random_invalid_range() {
        assert!(parse_schedule("random:invalid", None).is_err());
        assert!(parse_schedule("random:2h-1h", None).is_err());
        assert!(parse_schedule("random:1s-10s", None).is_err());
        assert!(parse_schedule("random:1d-40d", None).is_err());
    }
}

//! Time utilities for pomosync
//!
//! The timer engine is anchored to wall-clock time: every remaining-time
//! value is recomputed from the delta between two wall-clock readings, so a
//! stalled event loop corrects itself on the next tick instead of
//! accumulating error.
//!
//! # Mock Time for Development
//!
//! In debug builds, the `POMO_MOCK_TIME` environment variable can be set
//! to override the system time for all time-sensitive operations. This is
//! useful for exercising persistence staleness and queued-notification expiry
//! without waiting in real time.
//!
//! Format: `YYYY-MM-DD HH:MM:SS` (e.g., `2025-12-25 14:30:00`)
//!
//! Example:
//! ```bash
//! POMO_MOCK_TIME="2025-12-25 14:30:00" pomod --activity a1 --session s1
//! ```

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use std::sync::OnceLock;
use std::time::Duration;

/// Environment variable name for mock time (debug builds only)
pub const MOCK_TIME_ENV_VAR: &str = "POMO_MOCK_TIME";

/// Format accepted by [`MOCK_TIME_ENV_VAR`]
const MOCK_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Cached mock time offset from the real time when the process started.
/// This allows mock time to advance naturally.
static MOCK_TIME_OFFSET: OnceLock<Option<chrono::Duration>> = OnceLock::new();

#[allow(clippy::disallowed_methods)] // This is the internal implementation that wraps Local::now()
fn get_mock_time_offset() -> Option<chrono::Duration> {
    *MOCK_TIME_OFFSET.get_or_init(|| {
        #[cfg(debug_assertions)]
        {
            if let Ok(mock_time_str) = std::env::var(MOCK_TIME_ENV_VAR) {
                match NaiveDateTime::parse_from_str(&mock_time_str, MOCK_TIME_FORMAT) {
                    Ok(naive_dt) => {
                        if let Some(mock_dt) = Local.from_local_datetime(&naive_dt).single() {
                            let offset = mock_dt.signed_duration_since(chrono::Local::now());
                            tracing::info!(
                                mock_time = %mock_time_str,
                                offset_secs = offset.num_seconds(),
                                "Mock time enabled"
                            );
                            return Some(offset);
                        }
                        tracing::warn!(
                            mock_time = %mock_time_str,
                            "Failed to convert mock time to local timezone"
                        );
                    }
                    Err(_) => {
                        tracing::warn!(
                            mock_time = %mock_time_str,
                            expected_format = MOCK_TIME_FORMAT,
                            "Invalid mock time format"
                        );
                    }
                }
            }
            None
        }
        #[cfg(not(debug_assertions))]
        {
            None
        }
    })
}

/// Returns whether mock time is currently active.
pub fn is_mock_time_active() -> bool {
    get_mock_time_offset().is_some()
}

/// Get the current local time, respecting mock time settings in debug builds.
///
/// In release builds, this always returns the real system time.
#[allow(clippy::disallowed_methods)] // This is the wrapper that provides mock time support
pub fn now() -> DateTime<Local> {
    let real_now = chrono::Local::now();

    if let Some(offset) = get_mock_time_offset() {
        real_now + offset
    } else {
        real_now
    }
}

/// Whole seconds elapsed from `earlier` to `later`, floored.
///
/// Returns zero when `later` is before `earlier` (wall clock stepped back).
pub fn whole_seconds_between(earlier: DateTime<Local>, later: DateTime<Local>) -> u64 {
    let millis = later.signed_duration_since(earlier).num_milliseconds();
    if millis <= 0 { 0 } else { (millis / 1000) as u64 }
}

/// Age of `then` as seen from `now`, or zero if `then` is in the future.
pub fn age(then: DateTime<Local>, now: DateTime<Local>) -> Duration {
    now.signed_duration_since(then)
        .to_std()
        .unwrap_or(Duration::ZERO)
}

/// Format a remaining-seconds value as a countdown (`MM:SS`, or `H:MM:SS`).
pub fn format_countdown(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{:02}:{:02}", minutes, secs)
    }
}

/// Helper to format durations in human-readable form
pub fn format_duration(d: Duration) -> String {
    let total_secs = d.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, TimeZone};

    #[test]
    fn test_whole_seconds_floors() {
        let t0 = Local.with_ymd_and_hms(2025, 12, 25, 14, 30, 0).unwrap();
        let t1 = t0 + chrono::Duration::milliseconds(2999);
        assert_eq!(whole_seconds_between(t0, t1), 2);

        let t2 = t0 + chrono::Duration::seconds(3);
        assert_eq!(whole_seconds_between(t0, t2), 3);
    }

    #[test]
    fn test_whole_seconds_clock_stepped_back() {
        let t0 = Local.with_ymd_and_hms(2025, 12, 25, 14, 30, 0).unwrap();
        let earlier = t0 - chrono::Duration::seconds(10);
        assert_eq!(whole_seconds_between(t0, earlier), 0);
    }

    #[test]
    fn test_age() {
        let t0 = Local.with_ymd_and_hms(2025, 12, 25, 14, 30, 0).unwrap();
        let later = t0 + chrono::Duration::minutes(6);
        assert_eq!(age(t0, later), Duration::from_secs(360));
        assert_eq!(age(later, t0), Duration::ZERO);
    }

    #[test]
    fn test_format_countdown() {
        assert_eq!(format_countdown(0), "00:00");
        assert_eq!(format_countdown(59), "00:59");
        assert_eq!(format_countdown(25 * 60), "25:00");
        assert_eq!(format_countdown(3661), "1:01:01");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(30)), "30s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
        assert_eq!(format_duration(Duration::from_secs(3661)), "1h 1m 1s");
    }

    #[test]
    fn test_now_returns_time() {
        let t = now();
        assert!(t.year() >= 2020);
        assert!(t.year() <= 2100);
    }

    #[test]
    fn test_parse_mock_time_format() {
        assert!(NaiveDateTime::parse_from_str("2025-12-25 14:30:00", MOCK_TIME_FORMAT).is_ok());
        assert!(NaiveDateTime::parse_from_str("2025-12-25T14:30:00", MOCK_TIME_FORMAT).is_err());
        assert!(NaiveDateTime::parse_from_str("not a date", MOCK_TIME_FORMAT).is_err());
    }

    #[test]
    #[cfg(debug_assertions)]
    fn test_is_mock_time_active_in_debug() {
        let _ = is_mock_time_active();
    }
}

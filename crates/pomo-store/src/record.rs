//! Persisted timer state

use chrono::{DateTime, Local};
use pomo_util::{whole_seconds_between, SessionId};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Local countdown state written to durable storage so a timer survives a
/// reload or a full restart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedTimerRecord {
    pub remaining_seconds: u64,
    pub is_running: bool,
    pub is_paused: bool,

    /// Wall-clock time at which this record was written
    pub last_sync_time: DateTime<Local>,

    /// Time of the last successful server reconciliation, if any
    pub server_time: Option<DateTime<Local>>,

    /// Last measured drift in seconds
    pub drift: u64,
}

impl PersistedTimerRecord {
    /// Storage key for a session's record
    pub fn key(session_id: &SessionId) -> String {
        format!("pomo.timer.{}", session_id)
    }

    /// Records older than `window` are treated as absent
    pub fn is_stale(&self, now: DateTime<Local>, window: Duration) -> bool {
        pomo_util::age(self.last_sync_time, now) > window
    }

    /// Remaining seconds as of `now`.
    ///
    /// A running record keeps counting down while nothing was watching it;
    /// a paused record is frozen.
    pub fn age_corrected_remaining(&self, now: DateTime<Local>) -> u64 {
        if self.is_running {
            let elapsed = whole_seconds_between(self.last_sync_time, now);
            self.remaining_seconds.saturating_sub(elapsed)
        } else {
            self.remaining_seconds
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(running: bool, written: DateTime<Local>) -> PersistedTimerRecord {
        PersistedTimerRecord {
            remaining_seconds: 600,
            is_running: running,
            is_paused: !running,
            last_sync_time: written,
            server_time: None,
            drift: 0,
        }
    }

    #[test]
    fn test_staleness_window() {
        let written = Local.with_ymd_and_hms(2025, 12, 25, 14, 0, 0).unwrap();
        let rec = record(true, written);
        let window = Duration::from_secs(300);

        assert!(!rec.is_stale(written + chrono::Duration::seconds(299), window));
        assert!(!rec.is_stale(written + chrono::Duration::seconds(300), window));
        assert!(rec.is_stale(written + chrono::Duration::seconds(301), window));
    }

    #[test]
    fn test_age_correction_only_when_running() {
        let written = Local.with_ymd_and_hms(2025, 12, 25, 14, 0, 0).unwrap();
        let later = written + chrono::Duration::seconds(90);

        assert_eq!(record(true, written).age_corrected_remaining(later), 510);
        assert_eq!(record(false, written).age_corrected_remaining(later), 600);
    }

    #[test]
    fn test_age_correction_never_negative() {
        let written = Local.with_ymd_and_hms(2025, 12, 25, 14, 0, 0).unwrap();
        let much_later = written + chrono::Duration::seconds(4000);
        assert_eq!(record(true, written).age_corrected_remaining(much_later), 0);
    }

    #[test]
    fn test_record_json_shape() {
        let written = Local.with_ymd_and_hms(2025, 12, 25, 14, 0, 0).unwrap();
        let json = serde_json::to_value(record(true, written)).unwrap();
        assert_eq!(json["remainingSeconds"], 600);
        assert_eq!(json["isRunning"], true);
        assert!(json.get("lastSyncTime").is_some());
        assert!(json.get("serverTime").is_some());
    }

    #[test]
    fn test_key_is_session_scoped() {
        assert_eq!(
            PersistedTimerRecord::key(&SessionId::new("s-42")),
            "pomo.timer.s-42"
        );
    }
}

//! Best-effort persistence of the local countdown

use chrono::{DateTime, Local};
use pomo_store::{KeyValueStore, PersistedTimerRecord};
use pomo_util::SessionId;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Session-scoped persistence of `PersistedTimerRecord`.
///
/// The first store failure is logged and switches this session to
/// memory-only; later calls are silently skipped.
pub struct TimerPersistence {
    store: Arc<dyn KeyValueStore>,
    key: String,
    staleness: Duration,
    available: bool,
}

impl TimerPersistence {
    pub fn new(store: Arc<dyn KeyValueStore>, session_id: &SessionId, staleness: Duration) -> Self {
        Self {
            store,
            key: PersistedTimerRecord::key(session_id),
            staleness,
            available: true,
        }
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    /// Read the record once at startup. Stale or unreadable records are
    /// removed and treated as absent.
    pub fn load(&mut self, now: DateTime<Local>) -> Option<PersistedTimerRecord> {
        if !self.available {
            return None;
        }

        let raw = match self.store.get(&self.key) {
            Ok(raw) => raw?,
            Err(e) => {
                self.disable(&e.to_string());
                return None;
            }
        };

        let record: PersistedTimerRecord = match serde_json::from_str(&raw) {
            Ok(r) => r,
            Err(e) => {
                warn!(key = %self.key, error = %e, "Discarding unreadable timer record");
                self.clear();
                return None;
            }
        };

        if record.is_stale(now, self.staleness) {
            debug!(
                key = %self.key,
                written = %record.last_sync_time,
                "Discarding stale timer record"
            );
            self.clear();
            return None;
        }

        Some(record)
    }

    /// Write the record. Returns true if this call is the one that made the
    /// store unavailable.
    pub fn save(&mut self, record: &PersistedTimerRecord) -> bool {
        if !self.available {
            return false;
        }

        let json = match serde_json::to_string(record) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "Failed to serialize timer record");
                return false;
            }
        };

        match self.store.set(&self.key, &json) {
            Ok(()) => false,
            Err(e) => {
                self.disable(&e.to_string());
                true
            }
        }
    }

    pub fn clear(&mut self) {
        if !self.available {
            return;
        }
        if let Err(e) = self.store.remove(&self.key) {
            self.disable(&e.to_string());
        }
    }

    fn disable(&mut self, error: &str) {
        warn!(
            key = %self.key,
            error,
            "Timer persistence unavailable, continuing memory-only"
        );
        self.available = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pomo_store::{MemoryStore, SqliteStore};

    fn t0() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 12, 25, 14, 0, 0).unwrap()
    }

    fn record(written: DateTime<Local>) -> PersistedTimerRecord {
        PersistedTimerRecord {
            remaining_seconds: 420,
            is_running: true,
            is_paused: false,
            last_sync_time: written,
            server_time: None,
            drift: 1,
        }
    }

    #[test]
    fn test_save_and_load() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let mut p = TimerPersistence::new(store, &SessionId::new("s"), Duration::from_secs(300));

        assert!(p.load(t0()).is_none());
        assert!(!p.save(&record(t0())));

        let loaded = p.load(t0() + chrono::Duration::seconds(60)).unwrap();
        assert_eq!(loaded, record(t0()));
    }

    #[test]
    fn test_stale_record_is_absent_and_removed() {
        let store = Arc::new(MemoryStore::new());
        let mut p = TimerPersistence::new(store.clone(), &SessionId::new("s"), Duration::from_secs(300));

        p.save(&record(t0()));
        assert_eq!(store.len(), 1);

        assert!(p.load(t0() + chrono::Duration::seconds(301)).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_garbage_record_is_absent() {
        let store = Arc::new(MemoryStore::new());
        let key = PersistedTimerRecord::key(&SessionId::new("s"));
        store.set(&key, "not json").unwrap();

        let mut p = TimerPersistence::new(store.clone(), &SessionId::new("s"), Duration::from_secs(300));
        assert!(p.load(t0()).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_failure_switches_to_memory_only() {
        let store = Arc::new(MemoryStore::new());
        store.set_unavailable(true);
        let mut p = TimerPersistence::new(store.clone(), &SessionId::new("s"), Duration::from_secs(300));

        assert!(p.save(&record(t0())));
        assert!(!p.is_available());
        // Reported only once
        assert!(!p.save(&record(t0())));

        // Store recovering does not matter for this session
        store.set_unavailable(false);
        assert!(!p.save(&record(t0())));
        assert!(store.is_empty());
    }
}

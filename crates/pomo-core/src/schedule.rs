//! Explicit interval scheduler driven by the runtime's poll loop

use chrono::{DateTime, Local};
use std::time::Duration;
use tracing::trace;

/// Handle to a scheduled timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CancelToken(u64);

#[derive(Debug)]
struct Timer {
    token: CancelToken,
    period: chrono::Duration,
    next_due: DateTime<Local>,
    repeating: bool,
}

/// Interval and one-shot timers evaluated against an explicit `now`.
///
/// A repeating timer that misses several periods fires once and is then
/// realigned to the next period after `now`. A cancelled timer never fires.
#[derive(Debug, Default)]
pub struct Scheduler {
    next_id: u64,
    timers: Vec<Timer>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire every `period`, first at `now + period`
    pub fn every(&mut self, period: Duration, now: DateTime<Local>) -> CancelToken {
        self.add(period, now, true)
    }

    /// Fire once at `now + delay`
    pub fn once(&mut self, delay: Duration, now: DateTime<Local>) -> CancelToken {
        self.add(delay, now, false)
    }

    fn add(&mut self, period: Duration, now: DateTime<Local>, repeating: bool) -> CancelToken {
        self.next_id += 1;
        let token = CancelToken(self.next_id);
        let period = chrono::Duration::from_std(period)
            .unwrap_or(chrono::Duration::seconds(1))
            .max(chrono::Duration::milliseconds(1));

        self.timers.push(Timer {
            token,
            period,
            next_due: now + period,
            repeating,
        });

        trace!(token = token.0, repeating, "Timer scheduled");
        token
    }

    /// Cancel a timer. Returns false if it had already fired or been cancelled.
    pub fn cancel(&mut self, token: CancelToken) -> bool {
        let before = self.timers.len();
        self.timers.retain(|t| t.token != token);
        self.timers.len() != before
    }

    pub fn is_active(&self, token: CancelToken) -> bool {
        self.timers.iter().any(|t| t.token == token)
    }

    /// When the given timer next fires
    pub fn next_due(&self, token: CancelToken) -> Option<DateTime<Local>> {
        self.timers
            .iter()
            .find(|t| t.token == token)
            .map(|t| t.next_due)
    }

    /// Collect timers due at `now`, in scheduling order. One-shot timers are
    /// removed; repeating timers are moved past `now`.
    pub fn due(&mut self, now: DateTime<Local>) -> Vec<CancelToken> {
        let mut fired = Vec::new();

        for timer in &mut self.timers {
            if timer.next_due > now {
                continue;
            }
            fired.push(timer.token);

            if timer.repeating {
                while timer.next_due <= now {
                    timer.next_due += timer.period;
                }
            }
        }

        self.timers
            .retain(|t| t.repeating || !fired.contains(&t.token));

        fired
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }
}

//! Wall-clock anchored countdown

use chrono::{DateTime, Local};
use pomo_util::whole_seconds_between;
use serde::Serialize;

/// Local countdown state, owned exclusively by the engine.
///
/// While running, `remaining_seconds` always equals
/// `server_remaining_at_sync - floor(now - local_start_time)` clamped at zero.
/// While stopped it is frozen and authoritative for the next resume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalTimerState {
    pub remaining_seconds: u64,
    pub is_running: bool,
    pub is_paused: bool,
    pub local_start_time: Option<DateTime<Local>>,
    pub server_remaining_at_sync: u64,
    pub last_sync_time: Option<DateTime<Local>>,
    pub drift: u64,
    pub has_custom_time: bool,
}

/// Result of one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    pub remaining: u64,

    /// Set on the single tick that reached zero
    pub zero_crossed: bool,
}

/// Countdown that derives remaining time from wall-clock deltas rather than
/// decrementing, so a stalled event loop self-corrects on the next tick.
#[derive(Debug, Clone)]
pub struct CountdownClock {
    state: LocalTimerState,
    zero_emitted: bool,
}

impl CountdownClock {
    pub fn new(remaining_seconds: u64) -> Self {
        Self {
            state: LocalTimerState {
                remaining_seconds,
                is_running: false,
                is_paused: false,
                local_start_time: None,
                server_remaining_at_sync: remaining_seconds,
                last_sync_time: None,
                drift: 0,
                has_custom_time: false,
            },
            zero_emitted: false,
        }
    }

    pub fn state(&self) -> &LocalTimerState {
        &self.state
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running
    }

    pub fn has_custom_time(&self) -> bool {
        self.state.has_custom_time
    }

    /// Remaining seconds as of `now`, without mutating the clock
    pub fn remaining_at(&self, now: DateTime<Local>) -> u64 {
        match self.state.local_start_time {
            Some(start) if self.state.is_running => self
                .state
                .server_remaining_at_sync
                .saturating_sub(whole_seconds_between(start, now)),
            _ => self.state.remaining_seconds,
        }
    }

    /// Start counting down from the frozen value. No-op when already running.
    pub fn start(&mut self, now: DateTime<Local>) {
        if self.state.is_running {
            return;
        }
        self.state.local_start_time = Some(now);
        self.state.server_remaining_at_sync = self.state.remaining_seconds;
        self.state.is_running = true;
        self.state.is_paused = false;
        self.zero_emitted = false;
    }

    /// Freeze the current value. Returns false if the clock was not running.
    pub fn pause(&mut self, now: DateTime<Local>) -> bool {
        if !self.state.is_running {
            return false;
        }
        self.state.remaining_seconds = self.remaining_at(now);
        self.state.is_running = false;
        self.state.is_paused = true;
        true
    }

    /// Recompute remaining time. Reports the zero crossing exactly once and
    /// stops the clock there.
    pub fn tick(&mut self, now: DateTime<Local>) -> Tick {
        if !self.state.is_running {
            return Tick {
                remaining: self.state.remaining_seconds,
                zero_crossed: false,
            };
        }

        let remaining = self.remaining_at(now);
        self.state.remaining_seconds = remaining;

        if remaining == 0 && !self.zero_emitted {
            self.zero_emitted = true;
            self.state.is_running = false;
            self.state.is_paused = true;
            return Tick {
                remaining,
                zero_crossed: true,
            };
        }

        Tick {
            remaining,
            zero_crossed: false,
        }
    }

    /// Manual override. Suppresses drift correction until the next phase
    /// transition clears it.
    pub fn set_remaining(&mut self, seconds: u64, now: DateTime<Local>) {
        self.state.remaining_seconds = seconds;
        self.state.server_remaining_at_sync = seconds;
        self.state.local_start_time = Some(now);
        self.state.has_custom_time = true;
        self.zero_emitted = false;
    }

    /// Re-anchor on an authoritative value, keeping the run state
    pub fn correct(&mut self, seconds: u64, now: DateTime<Local>) {
        self.state.remaining_seconds = seconds;
        self.state.server_remaining_at_sync = seconds;
        if self.state.is_running {
            self.state.local_start_time = Some(now);
        }
        if seconds > 0 {
            self.zero_emitted = false;
        }
    }

    /// Load a new phase: stopped, not paused, custom time cleared
    pub fn reset_to(&mut self, seconds: u64) {
        self.state.remaining_seconds = seconds;
        self.state.server_remaining_at_sync = seconds;
        self.state.local_start_time = None;
        self.state.is_running = false;
        self.state.is_paused = false;
        self.state.has_custom_time = false;
        self.zero_emitted = false;
    }

    /// Mark a stopped clock as paused (parked or restored paused state)
    pub fn mark_paused(&mut self) {
        if !self.state.is_running {
            self.state.is_paused = true;
        }
    }

    pub fn clear_custom_time(&mut self) {
        self.state.has_custom_time = false;
    }

    pub fn record_sync(&mut self, now: DateTime<Local>, drift: u64) {
        self.state.last_sync_time = Some(now);
        self.state.drift = drift;
    }
}

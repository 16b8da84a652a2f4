//! Drift reconciliation against the authoritative snapshot

use pomo_api::{SessionPosition, SessionStatus, TimerSnapshot};
use tracing::{debug, info, warn};

/// Thresholds for drift correction
#[derive(Debug, Clone, Copy)]
pub struct DriftPolicy {
    pub max_drift_secs: u64,
    pub just_started_threshold_secs: u64,
}

/// What the engine knows locally when a snapshot arrives
#[derive(Debug, Clone, Copy)]
pub struct LocalObservation {
    pub position: SessionPosition,
    pub remaining_seconds: u64,
    pub has_custom_time: bool,

    /// The clock was (re)started since the last successful reconciliation
    pub started_since_sync: bool,

    /// Status of the snapshot returned by the start/resume call, if any
    pub previous_status: Option<SessionStatus>,
}

/// Why a measured drift was left alone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepReason {
    WithinTolerance,
    CustomTime,
    JustStarted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncDecision {
    /// Status, phase or cycle count differ: adopt the snapshot wholesale
    ServerTransition,

    /// Re-anchor the clock on the server's remaining time
    Correct { server_remaining: u64, drift: u64 },

    Keep { drift: u64, reason: KeepReason },
}

impl DriftPolicy {
    pub fn decide(&self, local: &LocalObservation, snapshot: &TimerSnapshot) -> SyncDecision {
        if snapshot.position() != local.position {
            return SyncDecision::ServerTransition;
        }

        let server_remaining = snapshot.remaining_phase_seconds;
        let drift = server_remaining.abs_diff(local.remaining_seconds);

        if drift <= self.max_drift_secs {
            return SyncDecision::Keep {
                drift,
                reason: KeepReason::WithinTolerance,
            };
        }

        if local.has_custom_time {
            return SyncDecision::Keep {
                drift,
                reason: KeepReason::CustomTime,
            };
        }

        if self.is_just_started(local, snapshot) {
            return SyncDecision::Keep {
                drift,
                reason: KeepReason::JustStarted,
            };
        }

        SyncDecision::Correct {
            server_remaining,
            drift,
        }
    }

    fn is_just_started(&self, local: &LocalObservation, snapshot: &TimerSnapshot) -> bool {
        local.started_since_sync
            && local.previous_status == Some(SessionStatus::InProgress)
            && snapshot.status == SessionStatus::InProgress
            && snapshot.remaining_phase_seconds > self.just_started_threshold_secs
    }
}

/// Consecutive-failure tracking for the "disconnected" indicator
#[derive(Debug, Clone)]
pub struct ConnectionHealth {
    threshold: u32,
    consecutive_failures: u32,
    connected: bool,
}

impl ConnectionHealth {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            consecutive_failures: 0,
            connected: true,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Returns `Some(true)` when this success ends a disconnected period
    pub fn record_success(&mut self) -> Option<bool> {
        self.consecutive_failures = 0;
        if self.connected {
            return None;
        }
        self.connected = true;
        info!("Connection to session server restored");
        Some(true)
    }

    /// Returns `Some(false)` when this failure crosses the threshold
    pub fn record_failure(&mut self) -> Option<bool> {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        debug!(failures = self.consecutive_failures, "Gateway call failed");

        if self.connected && self.consecutive_failures >= self.threshold {
            self.connected = false;
            warn!(
                failures = self.consecutive_failures,
                "Session server unreachable, marking disconnected"
            );
            return Some(false);
        }
        None
    }
}

//! Visibility-aware completion guard
//!
//! A server-side scheduler completes phases for clients that are not
//! watching. When the local countdown reaches zero while hidden, the client
//! cedes authority and parks; when it becomes visible again it re-fetches
//! before deciding who completes the phase.

use chrono::{DateTime, Local};
use pomo_api::{SessionPosition, SessionStatus, TimerSnapshot};

/// What to do when the countdown reaches zero
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZeroCrossingAction {
    /// Visible: ask the gateway to complete the phase
    CompleteNow,

    /// Hidden: pause and leave completion to the server scheduler
    Park,
}

pub fn on_zero_crossing(visible: bool) -> ZeroCrossingAction {
    if visible {
        ZeroCrossingAction::CompleteNow
    } else {
        ZeroCrossingAction::Park
    }
}

/// Position recorded when the engine parked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Parked {
    pub position: SessionPosition,
    pub since: DateTime<Local>,
}

/// Decision once a fresh snapshot is available for a parked session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeDecision {
    /// The server already moved on (and already notified)
    AdoptServer,

    /// Nothing happened server-side; complete the phase from the client
    CompleteLocally,
}

impl Parked {
    pub fn decide(&self, snapshot: &TimerSnapshot) -> ResumeDecision {
        let server = snapshot.position();
        if server == self.position && server.status == SessionStatus::InProgress {
            ResumeDecision::CompleteLocally
        } else {
            ResumeDecision::AdoptServer
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pomo_api::{Phase, PhaseDurations};
    use pomo_util::{ActivityId, SessionId};

    fn parked() -> Parked {
        Parked {
            position: SessionPosition {
                status: SessionStatus::InProgress,
                phase: Phase::Focus,
                cycles_completed: 2,
            },
            since: Local.with_ymd_and_hms(2025, 12, 25, 14, 0, 0).unwrap(),
        }
    }

    fn snapshot(status: SessionStatus, phase: Phase, cycles: u32) -> TimerSnapshot {
        let mut snap = TimerSnapshot::not_started(
            ActivityId::new("a"),
            SessionId::new("s"),
            PhaseDurations::default(),
        );
        snap.status = status;
        snap.current_phase = Some(phase);
        snap.cycles_completed = cycles;
        snap
    }

    #[test]
    fn test_hidden_zero_crossing_parks() {
        assert_eq!(on_zero_crossing(false), ZeroCrossingAction::Park);
        assert_eq!(on_zero_crossing(true), ZeroCrossingAction::CompleteNow);
    }

    #[test]
    fn test_server_advanced_is_adopted() {
        let p = parked();
        assert_eq!(
            p.decide(&snapshot(SessionStatus::Paused, Phase::Break, 2)),
            ResumeDecision::AdoptServer
        );
        assert_eq!(
            p.decide(&snapshot(SessionStatus::InProgress, Phase::LongBreak, 2)),
            ResumeDecision::AdoptServer
        );
        assert_eq!(
            p.decide(&snapshot(SessionStatus::Abandoned, Phase::Focus, 2)),
            ResumeDecision::AdoptServer
        );
    }

    #[test]
    fn test_unchanged_server_completes_locally() {
        assert_eq!(
            parked().decide(&snapshot(SessionStatus::InProgress, Phase::Focus, 2)),
            ResumeDecision::CompleteLocally
        );
    }
}

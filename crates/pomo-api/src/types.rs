//! Shared types for the session gateway and the timer engine

use chrono::{DateTime, Local};
use pomo_util::{ActivityId, NotificationId, SessionId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of a Pomodoro session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    NotStarted,
    InProgress,
    Paused,
    Completed,
    Abandoned,
}

impl SessionStatus {
    /// Terminal statuses accept no further transitions
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Abandoned)
    }

    /// Whether the countdown may be started or resumed from this status
    pub fn can_start(self) -> bool {
        matches!(self, SessionStatus::NotStarted | SessionStatus::Paused)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionStatus::NotStarted => "NOT_STARTED",
            SessionStatus::InProgress => "IN_PROGRESS",
            SessionStatus::Paused => "PAUSED",
            SessionStatus::Completed => "COMPLETED",
            SessionStatus::Abandoned => "ABANDONED",
        };
        f.write_str(s)
    }
}

/// A timed segment of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    #[default]
    Focus,
    Break,
    LongBreak,
}

impl Phase {
    pub fn is_break(self) -> bool {
        matches!(self, Phase::Break | Phase::LongBreak)
    }

    /// Human-readable label
    pub fn label(self) -> &'static str {
        match self {
            Phase::Focus => "Focus",
            Phase::Break => "Break",
            Phase::LongBreak => "Long Break",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Focus => "FOCUS",
            Phase::Break => "BREAK",
            Phase::LongBreak => "LONG_BREAK",
        };
        f.write_str(s)
    }
}

/// Configured length of each phase, in minutes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseDurations {
    pub focus_minutes: u32,
    pub break_minutes: u32,
    pub long_break_minutes: u32,
}

impl PhaseDurations {
    pub fn seconds_for(&self, phase: Phase) -> u64 {
        let minutes = match phase {
            Phase::Focus => self.focus_minutes,
            Phase::Break => self.break_minutes,
            Phase::LongBreak => self.long_break_minutes,
        };
        u64::from(minutes) * 60
    }
}

impl Default for PhaseDurations {
    fn default() -> Self {
        Self {
            focus_minutes: 25,
            break_minutes: 5,
            long_break_minutes: 15,
        }
    }
}

/// Authoritative session state as reported by the server.
///
/// Never mutated by the client; each reconciliation replaces it wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerSnapshot {
    pub session_id: SessionId,
    pub activity_id: ActivityId,
    pub status: SessionStatus,
    #[serde(default)]
    pub current_phase: Option<Phase>,
    #[serde(default)]
    pub cycles_completed: u32,
    #[serde(default)]
    pub remaining_phase_seconds: u64,
    pub focus_time_in_minutes: u32,
    pub break_time_in_minutes: u32,
    pub long_break_time_in_minutes: u32,
}

impl TimerSnapshot {
    /// A session that has not been started yet
    pub fn not_started(
        activity_id: ActivityId,
        session_id: SessionId,
        durations: PhaseDurations,
    ) -> Self {
        Self {
            session_id,
            activity_id,
            status: SessionStatus::NotStarted,
            current_phase: Some(Phase::Focus),
            cycles_completed: 0,
            remaining_phase_seconds: durations.seconds_for(Phase::Focus),
            focus_time_in_minutes: durations.focus_minutes,
            break_time_in_minutes: durations.break_minutes,
            long_break_time_in_minutes: durations.long_break_minutes,
        }
    }

    /// Current phase, treating a missing phase as FOCUS
    pub fn phase(&self) -> Phase {
        self.current_phase.unwrap_or_default()
    }

    pub fn durations(&self) -> PhaseDurations {
        PhaseDurations {
            focus_minutes: self.focus_time_in_minutes,
            break_minutes: self.break_time_in_minutes,
            long_break_minutes: self.long_break_time_in_minutes,
        }
    }

    /// The triple used to detect a server-side transition
    pub fn position(&self) -> SessionPosition {
        SessionPosition {
            status: self.status,
            phase: self.phase(),
            cycles_completed: self.cycles_completed,
        }
    }
}

/// Where a session stands, independent of remaining time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionPosition {
    pub status: SessionStatus,
    pub phase: Phase,
    pub cycles_completed: u32,
}

/// Class of device the client runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    #[default]
    Desktop,
    Mobile,
    Tablet,
}

impl DeviceType {
    /// Mobile and tablet devices share the handheld notification path
    pub fn is_handheld(self) -> bool {
        matches!(self, DeviceType::Mobile | DeviceType::Tablet)
    }
}

impl FromStr for DeviceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "desktop" => Ok(DeviceType::Desktop),
            "mobile" => Ok(DeviceType::Mobile),
            "tablet" => Ok(DeviceType::Tablet),
            other => Err(format!("Unknown device type: {}", other)),
        }
    }
}

/// Result of asking the host for notification permission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionState {
    Granted,
    Denied,
    Default,
}

/// Which phase a completion event closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionKind {
    FocusComplete,
    BreakComplete,
    LongBreakComplete,
}

impl CompletionKind {
    pub fn for_phase(phase: Phase) -> Self {
        match phase {
            Phase::Focus => CompletionKind::FocusComplete,
            Phase::Break => CompletionKind::BreakComplete,
            Phase::LongBreak => CompletionKind::LongBreakComplete,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            CompletionKind::FocusComplete => "Focus Phase Complete!",
            CompletionKind::BreakComplete => "Break Complete!",
            CompletionKind::LongBreakComplete => "Long Break Complete!",
        }
    }
}

/// Everything needed to show one completion notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationContext {
    pub id: NotificationId,
    pub title: String,
    pub body: String,
    pub session_id: SessionId,
    pub activity_id: ActivityId,
    pub activity_title: Option<String>,
    pub completion: CompletionKind,
    pub timestamp: DateTime<Local>,
}

impl NotificationContext {
    /// Build the context for the completion of `phase`
    pub fn for_completion(
        phase: Phase,
        session_id: SessionId,
        activity_id: ActivityId,
        activity_title: Option<String>,
        now: DateTime<Local>,
    ) -> Self {
        let completion = CompletionKind::for_phase(phase);
        let subject = activity_title.as_deref().unwrap_or("your session");
        let body = match completion {
            CompletionKind::FocusComplete => {
                format!("Great work on {}! Time for a break.", subject)
            }
            CompletionKind::BreakComplete | CompletionKind::LongBreakComplete => {
                format!("Break is over. Ready to focus on {}?", subject)
            }
        };

        Self {
            id: NotificationId::new(),
            title: completion.title().to_string(),
            body,
            session_id,
            activity_id,
            activity_title,
            completion,
            timestamp: now,
        }
    }
}

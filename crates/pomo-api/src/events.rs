//! Read model published to observers of the timer engine

use serde::{Deserialize, Serialize};

use crate::{Phase, SessionStatus};

/// Immutable view of the engine, published after every state change.
///
/// Observers subscribe to a stream of these rather than reading engine
/// internals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerView {
    pub status: SessionStatus,
    pub phase: Phase,
    pub cycles_completed: u32,
    pub remaining_seconds: u64,
    pub is_running: bool,
    pub is_paused: bool,
    pub has_custom_time: bool,
    /// False while repeated sync failures show the "disconnected" indicator
    pub connected: bool,
    /// Seconds until the pending auto-start fires, if one is armed
    pub auto_start_in_seconds: Option<u64>,
    /// The server scheduler already notified for the last completion
    pub notification_already_sent: bool,
}

impl Default for TimerView {
    fn default() -> Self {
        Self {
            status: SessionStatus::NotStarted,
            phase: Phase::Focus,
            cycles_completed: 0,
            remaining_seconds: 0,
            is_running: false,
            is_paused: false,
            has_custom_time: false,
            connected: true,
            auto_start_in_seconds: None,
            notification_already_sent: false,
        }
    }
}

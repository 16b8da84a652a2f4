//! Core events and gateway requests emitted by the engine

use pomo_api::{NotificationContext, Phase, SessionPosition, SessionStatus};
use pomo_host_api::GatewayCall;

use crate::Dispatch;

/// Events emitted by the timer engine
#[derive(Debug, Clone)]
pub enum CoreEvent {
    /// Local status/phase/cycles changed
    Transitioned {
        from: SessionPosition,
        to: SessionPosition,
    },

    /// The countdown reached zero
    ZeroCrossed { phase: Phase, visible: bool },

    /// Zero reached while hidden; completion left to the server scheduler
    Parked { phase: Phase },

    /// Local clock re-anchored on the server's remaining time
    DriftCorrected { local: u64, server: u64, drift: u64 },

    /// A server-side transition was adopted wholesale
    ServerStateAdopted {
        position: SessionPosition,
        notification_already_sent: bool,
    },

    /// Deliver a completion notification
    Notify(Dispatch),

    /// Show an in-app modal for a notification missed while hidden
    ShowModal(NotificationContext),

    /// The disconnected indicator changed
    ConnectionChanged { connected: bool },

    /// The gateway rejected our credentials; the local timer keeps running
    AuthExpired,

    /// A server-calling transition failed; the optimistic state stands
    RetryLater { action: &'static str, error: String },

    /// The next phase will start on its own
    AutoStartScheduled { phase: Phase, in_secs: u64 },

    AutoStartCancelled,

    /// Durable storage failed; this session continues memory-only
    PersistenceUnavailable,

    /// The session reached a terminal status
    SessionEnded { status: SessionStatus },
}

/// Why a gateway request was issued
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOrigin {
    /// Initial load of the session
    Load,

    /// Periodic drift reconciliation
    Sync,

    /// Re-fetch after the client became visible
    VisibilityRefetch,

    /// Re-fetch after a completion conflict
    ConflictRefetch,

    /// Natural completion of `phase` at zero
    Completion { phase: Phase },

    /// Manual skip away from `phase`
    Skip { phase: Phase },

    /// start/pause/resume/stop/finish
    UserAction,
}

impl RequestOrigin {
    pub fn is_fetch(&self) -> bool {
        matches!(
            self,
            RequestOrigin::Load
                | RequestOrigin::Sync
                | RequestOrigin::VisibilityRefetch
                | RequestOrigin::ConflictRefetch
        )
    }
}

/// A gateway call the runtime must execute and feed back through
/// `TimerEngine::handle_response`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayRequest {
    pub id: u64,
    pub generation: u64,
    pub call: GatewayCall,
    pub origin: RequestOrigin,
}

/// Everything produced by one engine step
#[derive(Debug, Default)]
pub struct Outcome {
    pub events: Vec<CoreEvent>,
    pub requests: Vec<GatewayRequest>,
}

impl Outcome {
    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && self.requests.is_empty()
    }

    pub fn extend(&mut self, other: Outcome) {
        self.events.extend(other.events);
        self.requests.extend(other.requests);
    }

    /// Notifications to deliver, in order
    pub fn dispatches(&self) -> impl Iterator<Item = &Dispatch> {
        self.events.iter().filter_map(|e| match e {
            CoreEvent::Notify(d) => Some(d),
            _ => None,
        })
    }
}

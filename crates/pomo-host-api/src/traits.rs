//! Collaborator traits

use async_trait::async_trait;
use pomo_api::{PermissionState, TimerSnapshot};
use pomo_util::{ActivityId, SessionId};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;

/// Errors from the remote session gateway
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("Session not found")]
    NotFound,

    #[error("Not authorized")]
    Unauthorized,

    #[error("Conflicting session state")]
    Conflict,

    #[error("Transient gateway failure: {0}")]
    Transient(String),
}

impl GatewayError {
    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient(msg.into())
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Errors from local host services (notifications, sound)
#[derive(Debug, Error)]
pub enum HostError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Not supported on this host")]
    Unsupported,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type HostResult<T> = Result<T, HostError>;

/// One gateway operation, as requested by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GatewayCall {
    GetSession,
    Start,
    Pause,
    Resume,
    CompletePhase,
    Stop,
    Finish,
}

impl GatewayCall {
    /// Path segment under `/sessions/{id}` for mutating calls
    pub fn action_path(&self) -> Option<&'static str> {
        match self {
            GatewayCall::GetSession => None,
            GatewayCall::Start => Some("start"),
            GatewayCall::Pause => Some("pause"),
            GatewayCall::Resume => Some("resume"),
            GatewayCall::CompletePhase => Some("complete-phase"),
            GatewayCall::Stop => Some("stop"),
            GatewayCall::Finish => Some("finish"),
        }
    }

    pub fn name(&self) -> &'static str {
        self.action_path().unwrap_or("get-session")
    }
}

/// Remote session gateway: the authoritative owner of session state
#[async_trait]
pub trait SessionGateway: Send + Sync {
    async fn get_session(
        &self,
        activity_id: &ActivityId,
        session_id: &SessionId,
    ) -> GatewayResult<TimerSnapshot>;

    /// Ask the server to complete the current phase. A `Conflict` means the
    /// server already moved on; callers re-fetch instead of retrying.
    async fn complete_phase(
        &self,
        activity_id: &ActivityId,
        session_id: &SessionId,
    ) -> GatewayResult<TimerSnapshot>;

    async fn start(
        &self,
        activity_id: &ActivityId,
        session_id: &SessionId,
    ) -> GatewayResult<TimerSnapshot>;

    async fn pause(
        &self,
        activity_id: &ActivityId,
        session_id: &SessionId,
    ) -> GatewayResult<TimerSnapshot>;

    async fn resume(
        &self,
        activity_id: &ActivityId,
        session_id: &SessionId,
    ) -> GatewayResult<TimerSnapshot>;

    async fn stop(
        &self,
        activity_id: &ActivityId,
        session_id: &SessionId,
    ) -> GatewayResult<TimerSnapshot>;

    async fn finish(
        &self,
        activity_id: &ActivityId,
        session_id: &SessionId,
    ) -> GatewayResult<TimerSnapshot>;

    /// Execute a call by kind
    async fn execute(
        &self,
        call: GatewayCall,
        activity_id: &ActivityId,
        session_id: &SessionId,
    ) -> GatewayResult<TimerSnapshot> {
        match call {
            GatewayCall::GetSession => self.get_session(activity_id, session_id).await,
            GatewayCall::Start => self.start(activity_id, session_id).await,
            GatewayCall::Pause => self.pause(activity_id, session_id).await,
            GatewayCall::Resume => self.resume(activity_id, session_id).await,
            GatewayCall::CompletePhase => self.complete_phase(activity_id, session_id).await,
            GatewayCall::Stop => self.stop(activity_id, session_id).await,
            GatewayCall::Finish => self.finish(activity_id, session_id).await,
        }
    }
}

/// System notification transport (push)
#[async_trait]
pub trait NotificationTransport: Send + Sync {
    /// Ask for (or report the already-decided) permission to show notifications
    async fn request_permission(&self) -> PermissionState;

    async fn show(&self, title: &str, body: &str) -> HostResult<()>;
}

/// Audible cue played on completion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SoundCue {
    FocusComplete,
    BreakComplete,
}

#[async_trait]
pub trait SoundPlayer: Send + Sync {
    async fn play(&self, cue: SoundCue) -> HostResult<()>;
}

/// Foreground/background state of the client
pub trait VisibilityMonitor: Send + Sync {
    fn is_visible(&self) -> bool;

    /// Subscribe to visibility changes
    fn subscribe(&self) -> watch::Receiver<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_paths() {
        assert_eq!(GatewayCall::GetSession.action_path(), None);
        assert_eq!(GatewayCall::CompletePhase.action_path(), Some("complete-phase"));
        assert_eq!(GatewayCall::Finish.name(), "finish");
        assert_eq!(GatewayCall::GetSession.name(), "get-session");
    }

    #[test]
    fn gateway_error_display() {
        assert_eq!(
            GatewayError::transient("timeout").to_string(),
            "Transient gateway failure: timeout"
        );
    }
}

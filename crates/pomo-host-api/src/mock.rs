//! Mock collaborators for testing

use async_trait::async_trait;
use pomo_api::{PermissionState, Phase, SessionStatus, TimerSnapshot};
use pomo_util::{ActivityId, SessionId};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

use crate::{
    GatewayCall, GatewayError, GatewayResult, HostError, HostResult, NotificationTransport,
    SessionGateway, SoundCue, SoundPlayer, VisibilityMonitor,
};

/// Long break after every fourth completed focus phase
const MOCK_LONG_BREAK_EVERY: u32 = 4;

/// In-memory stand-in for the remote session server.
///
/// Keeps one authoritative snapshot and applies a simplified version of the
/// server's transitions to it. Scripted responses take priority over the
/// simulation.
pub struct MockGateway {
    server: Arc<Mutex<TimerSnapshot>>,
    scripted: Arc<Mutex<HashMap<GatewayCall, VecDeque<GatewayResult<TimerSnapshot>>>>>,
    calls: Arc<Mutex<Vec<GatewayCall>>>,

    /// Configure every call to fail with this error
    pub fail_with: Arc<Mutex<Option<GatewayError>>>,
}

impl MockGateway {
    pub fn new(initial: TimerSnapshot) -> Self {
        Self {
            server: Arc::new(Mutex::new(initial)),
            scripted: Arc::new(Mutex::new(HashMap::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
            fail_with: Arc::new(Mutex::new(None)),
        }
    }

    /// Current server-side snapshot
    pub fn snapshot(&self) -> TimerSnapshot {
        self.server.lock().unwrap().clone()
    }

    /// Replace the server-side snapshot (simulates the server scheduler or
    /// another device acting on the session)
    pub fn set_snapshot(&self, snapshot: TimerSnapshot) {
        *self.server.lock().unwrap() = snapshot;
    }

    /// Queue a one-shot response for the next call of this kind
    pub fn script(&self, call: GatewayCall, result: GatewayResult<TimerSnapshot>) {
        self.scripted
            .lock()
            .unwrap()
            .entry(call)
            .or_default()
            .push_back(result);
    }

    pub fn set_failure(&self, error: Option<GatewayError>) {
        *self.fail_with.lock().unwrap() = error;
    }

    /// Every call made so far, in order
    pub fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, call: GatewayCall) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| **c == call).count()
    }

    fn respond(&self, call: GatewayCall) -> GatewayResult<TimerSnapshot> {
        self.calls.lock().unwrap().push(call);

        if let Some(err) = self.fail_with.lock().unwrap().clone() {
            return Err(err);
        }

        if let Some(result) = self
            .scripted
            .lock()
            .unwrap()
            .get_mut(&call)
            .and_then(|queue| queue.pop_front())
        {
            return result;
        }

        let mut server = self.server.lock().unwrap();
        if server.status.is_terminal() && call != GatewayCall::GetSession {
            return Err(GatewayError::Conflict);
        }

        match call {
            GatewayCall::GetSession => {}
            GatewayCall::Start | GatewayCall::Resume => {
                server.status = SessionStatus::InProgress;
            }
            GatewayCall::Pause => {
                server.status = SessionStatus::Paused;
            }
            GatewayCall::CompletePhase => {
                let (next, cycles) = match server.phase() {
                    Phase::Focus => {
                        let next = if (server.cycles_completed + 1) % MOCK_LONG_BREAK_EVERY == 0 {
                            Phase::LongBreak
                        } else {
                            Phase::Break
                        };
                        (next, server.cycles_completed)
                    }
                    Phase::Break | Phase::LongBreak => (Phase::Focus, server.cycles_completed + 1),
                };
                server.current_phase = Some(next);
                server.cycles_completed = cycles;
                server.remaining_phase_seconds = server.durations().seconds_for(next);
                server.status = SessionStatus::Paused;
            }
            GatewayCall::Stop => {
                server.status = SessionStatus::Abandoned;
            }
            GatewayCall::Finish => {
                server.status = if server.cycles_completed > 0 {
                    SessionStatus::Completed
                } else {
                    SessionStatus::NotStarted
                };
            }
        }

        Ok(server.clone())
    }
}

#[async_trait]
impl SessionGateway for MockGateway {
    async fn get_session(&self, _: &ActivityId, _: &SessionId) -> GatewayResult<TimerSnapshot> {
        self.respond(GatewayCall::GetSession)
    }

    async fn complete_phase(&self, _: &ActivityId, _: &SessionId) -> GatewayResult<TimerSnapshot> {
        self.respond(GatewayCall::CompletePhase)
    }

    async fn start(&self, _: &ActivityId, _: &SessionId) -> GatewayResult<TimerSnapshot> {
        self.respond(GatewayCall::Start)
    }

    async fn pause(&self, _: &ActivityId, _: &SessionId) -> GatewayResult<TimerSnapshot> {
        self.respond(GatewayCall::Pause)
    }

    async fn resume(&self, _: &ActivityId, _: &SessionId) -> GatewayResult<TimerSnapshot> {
        self.respond(GatewayCall::Resume)
    }

    async fn stop(&self, _: &ActivityId, _: &SessionId) -> GatewayResult<TimerSnapshot> {
        self.respond(GatewayCall::Stop)
    }

    async fn finish(&self, _: &ActivityId, _: &SessionId) -> GatewayResult<TimerSnapshot> {
        self.respond(GatewayCall::Finish)
    }
}

/// Records shown notifications
pub struct MockNotifier {
    pub permission: Arc<Mutex<PermissionState>>,
    shown: Arc<Mutex<Vec<(String, String)>>>,

    /// Configure show to fail
    pub fail_show: Arc<Mutex<bool>>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self {
            permission: Arc::new(Mutex::new(PermissionState::Granted)),
            shown: Arc::new(Mutex::new(Vec::new())),
            fail_show: Arc::new(Mutex::new(false)),
        }
    }

    pub fn with_permission(self, permission: PermissionState) -> Self {
        *self.permission.lock().unwrap() = permission;
        self
    }

    /// (title, body) pairs shown so far
    pub fn shown(&self) -> Vec<(String, String)> {
        self.shown.lock().unwrap().clone()
    }
}

impl Default for MockNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationTransport for MockNotifier {
    async fn request_permission(&self) -> PermissionState {
        *self.permission.lock().unwrap()
    }

    async fn show(&self, title: &str, body: &str) -> HostResult<()> {
        if *self.fail_show.lock().unwrap() {
            return Err(HostError::Internal("Mock show failure".into()));
        }
        self.shown
            .lock()
            .unwrap()
            .push((title.to_string(), body.to_string()));
        Ok(())
    }
}

/// Records played cues
#[derive(Default)]
pub struct MockSound {
    played: Arc<Mutex<Vec<SoundCue>>>,
}

impl MockSound {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn played(&self) -> Vec<SoundCue> {
        self.played.lock().unwrap().clone()
    }
}

#[async_trait]
impl SoundPlayer for MockSound {
    async fn play(&self, cue: SoundCue) -> HostResult<()> {
        self.played.lock().unwrap().push(cue);
        Ok(())
    }
}

/// Visibility that tests flip by hand
pub struct MockVisibility {
    tx: watch::Sender<bool>,
}

impl MockVisibility {
    pub fn new(visible: bool) -> Self {
        let (tx, _rx) = watch::channel(visible);
        Self { tx }
    }

    pub fn set_visible(&self, visible: bool) {
        self.tx.send_replace(visible);
    }
}

impl VisibilityMonitor for MockVisibility {
    fn is_visible(&self) -> bool {
        *self.tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

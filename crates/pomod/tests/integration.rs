//! Integration tests for pomod
//!
//! These tests drive the timer engine end to end against the mock gateway,
//! notifier and sound player, with a fake clock.

use chrono::{DateTime, Local, TimeZone};
use pomo_api::{Phase, PhaseDurations, SessionStatus, TimerSnapshot};
use pomo_config::Settings;
use pomo_core::{deliver, CoreEvent, GatewayRequest, Outcome, SessionBinding, TimerEngine};
use pomo_host_api::{
    GatewayCall, GatewayError, HostCapabilities, MockGateway, MockNotifier, MockSound,
    SessionGateway,
};
use pomo_store::{KeyValueStore, MemoryStore, PersistedTimerRecord, SqliteStore};
use pomo_util::{ActivityId, SessionId};
use std::collections::VecDeque;
use std::sync::Arc;

fn t0() -> DateTime<Local> {
    Local.with_ymd_and_hms(2025, 12, 25, 9, 0, 0).unwrap()
}

fn snapshot(status: SessionStatus, phase: Phase, cycles: u32, remaining: u64) -> TimerSnapshot {
    let mut snap = TimerSnapshot::not_started(
        ActivityId::new("thesis"),
        SessionId::new("morning"),
        PhaseDurations::default(),
    );
    snap.status = status;
    snap.current_phase = Some(phase);
    snap.cycles_completed = cycles;
    snap.remaining_phase_seconds = remaining;
    snap
}

fn binding() -> SessionBinding {
    SessionBinding {
        activity_id: ActivityId::new("thesis"),
        session_id: SessionId::new("morning"),
        activity_title: Some("Thesis".into()),
    }
}

/// Engine plus mock collaborators on a fake clock
struct Harness {
    engine: TimerEngine,
    gateway: MockGateway,
    notifier: MockNotifier,
    sound: MockSound,
    now: DateTime<Local>,
    events: Vec<CoreEvent>,
}

impl Harness {
    fn with_store(server: TimerSnapshot, visible: bool, store: Arc<dyn KeyValueStore>) -> Self {
        let engine = TimerEngine::new(
            binding(),
            &Settings::default(),
            HostCapabilities::default(),
            store,
            visible,
        );
        Self {
            engine,
            gateway: MockGateway::new(server),
            notifier: MockNotifier::new(),
            sound: MockSound::new(),
            now: t0(),
            events: Vec::new(),
        }
    }

    fn new(server: TimerSnapshot, visible: bool) -> Self {
        Self::with_store(server, visible, Arc::new(MemoryStore::new()))
    }

    async fn init(&mut self) {
        let out = self.engine.initialize(self.now);
        self.settle(out).await;
    }

    /// Execute every request (and follow-up request) to completion, then
    /// deliver notifications
    async fn settle(&mut self, outcome: Outcome) {
        let b = binding();
        let mut events: Vec<CoreEvent> = outcome.events;
        let mut queue: VecDeque<GatewayRequest> = outcome.requests.into();

        while let Some(request) = queue.pop_front() {
            let result = self
                .gateway
                .execute(request.call, &b.activity_id, &b.session_id)
                .await;
            let out = self.engine.handle_response(&request, result, self.now);
            events.extend(out.events);
            queue.extend(out.requests);
        }

        for event in &events {
            if let CoreEvent::Notify(dispatch) = event {
                deliver(dispatch, &self.notifier, &self.sound).await;
            }
        }
        self.events.extend(events);
    }

    /// Move the clock forward one second at a time. The mock server's
    /// countdown runs alongside while it is in progress.
    async fn advance(&mut self, secs: i64) {
        for _ in 0..secs {
            self.now += chrono::Duration::seconds(1);
            let mut server = self.gateway.snapshot();
            if server.status == SessionStatus::InProgress {
                server.remaining_phase_seconds = server.remaining_phase_seconds.saturating_sub(1);
                self.gateway.set_snapshot(server);
            }
            let out = self.engine.poll(self.now);
            self.settle(out).await;
        }
    }

    async fn act(&mut self, outcome: pomo_util::Result<Outcome>) {
        let out = outcome.unwrap();
        self.settle(out).await;
    }

    fn count(&self, pred: impl Fn(&CoreEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }

    /// Run a visible countdown into its zero crossing, but only let the
    /// completion reply arrive after the client went to the background
    async fn complete_then_hide(&mut self, secs: i64) {
        self.advance(secs - 1).await;
        self.now += chrono::Duration::seconds(1);
        let out = self.engine.poll(self.now);
        let hidden = self.engine.set_visible(false, self.now);
        assert!(hidden.is_empty());
        self.settle(out).await;
    }

    fn server_remaining(&self, remaining: u64) {
        let mut server = self.gateway.snapshot();
        server.remaining_phase_seconds = remaining;
        self.gateway.set_snapshot(server);
    }
}

#[tokio::test]
async fn test_visible_focus_completion_scenario() {
    let mut h = Harness::new(snapshot(SessionStatus::InProgress, Phase::Focus, 0, 0), true);
    h.init().await;

    h.advance(1).await;

    assert_eq!(h.gateway.call_count(GatewayCall::CompletePhase), 1);
    let view = h.engine.view(h.now);
    assert_eq!(view.status, SessionStatus::Paused);
    assert_eq!(view.phase, Phase::Break);
    assert_eq!(view.remaining_seconds, 300);
    assert_eq!(view.cycles_completed, 0);

    let shown = h.notifier.shown();
    assert_eq!(shown.len(), 1);
    assert_eq!(shown[0].0, "Focus Phase Complete!");

    // Nothing else fires while paused
    h.advance(60).await;
    assert_eq!(h.notifier.shown().len(), 1);
    assert_eq!(h.gateway.call_count(GatewayCall::CompletePhase), 1);
}

#[tokio::test]
async fn test_elapsed_time_from_wall_clock() {
    let mut h = Harness::new(snapshot(SessionStatus::NotStarted, Phase::Focus, 0, 0), true);
    h.init().await;
    assert_eq!(h.engine.view(h.now).remaining_seconds, 1500);

    let start = h.now;
    let out = h.engine.start(start);
    h.act(out).await;

    for k in [1, 7, 59, 600] {
        assert_eq!(
            h.engine.remaining_at(start + chrono::Duration::seconds(k)),
            1500 - k as u64
        );
    }
    assert_eq!(h.engine.remaining_at(start + chrono::Duration::milliseconds(1_500_250)), 0);
}

#[tokio::test]
async fn test_pause_is_idempotent() {
    let mut h = Harness::new(snapshot(SessionStatus::NotStarted, Phase::Focus, 0, 0), true);
    h.init().await;
    let out = h.engine.start(h.now);
    h.act(out).await;
    h.advance(3).await;

    let out = h.engine.pause(h.now);
    h.act(out).await;
    let out = h.engine.pause(h.now);
    h.act(out).await;

    assert_eq!(h.gateway.call_count(GatewayCall::Pause), 1);
    let view = h.engine.view(h.now);
    assert_eq!(view.remaining_seconds, 1497);
    assert!(view.is_paused && !view.is_running);

    // Stopped intervals: no syncs, no drift while paused
    let syncs = h.gateway.call_count(GatewayCall::GetSession);
    h.advance(45).await;
    assert_eq!(h.gateway.call_count(GatewayCall::GetSession), syncs);
    assert_eq!(h.engine.view(h.now).remaining_seconds, 1497);
}

#[tokio::test]
async fn test_drift_beyond_tolerance_is_corrected() {
    let mut h = Harness::new(snapshot(SessionStatus::InProgress, Phase::Focus, 0, 100), true);
    h.init().await;

    h.advance(14).await;
    assert_eq!(h.engine.view(h.now).remaining_seconds, 86);

    // Server is 5 s ahead at the next sync: local 85, server 80
    h.server_remaining(81);
    h.advance(1).await;

    assert_eq!(h.engine.view(h.now).remaining_seconds, 80);
    assert_eq!(
        h.count(|e| matches!(e, CoreEvent::DriftCorrected { local: 85, server: 80, drift: 5 })),
        1
    );
}

#[tokio::test]
async fn test_drift_within_tolerance_is_kept() {
    let mut h = Harness::new(snapshot(SessionStatus::InProgress, Phase::Focus, 0, 100), true);
    h.init().await;

    h.advance(14).await;
    // local 85, server 83
    h.server_remaining(84);
    h.advance(1).await;

    assert_eq!(h.engine.view(h.now).remaining_seconds, 85);
    assert_eq!(h.count(|e| matches!(e, CoreEvent::DriftCorrected { .. })), 0);
}

#[tokio::test]
async fn test_custom_time_suppresses_correction_until_transition() {
    let mut h = Harness::new(snapshot(SessionStatus::NotStarted, Phase::Focus, 0, 0), true);
    h.init().await;

    let out = h.engine.set_remaining_seconds(600, h.now);
    h.act(out).await;
    let out = h.engine.start(h.now);
    h.act(out).await;

    // Server still counts from its own 1500
    h.server_remaining(1500);
    h.advance(31).await;
    assert!(h.gateway.call_count(GatewayCall::GetSession) >= 3);
    assert_eq!(h.engine.view(h.now).remaining_seconds, 569);
    assert!(h.engine.view(h.now).has_custom_time);

    let out = h.engine.skip(h.now);
    h.act(out).await;
    let view = h.engine.view(h.now);
    assert!(!view.has_custom_time);
    assert_eq!(view.phase, Phase::Break);
    assert_eq!(view.remaining_seconds, 300);
}

#[tokio::test]
async fn test_cycles_count_on_break_completion_only() {
    let mut h = Harness::new(snapshot(SessionStatus::NotStarted, Phase::Focus, 0, 0), true);
    h.init().await;

    let out = h.engine.start(h.now);
    h.act(out).await;
    let out = h.engine.skip(h.now);
    h.act(out).await;
    assert_eq!(h.engine.position().phase, Phase::Break);
    assert_eq!(h.engine.position().cycles_completed, 0);

    let out = h.engine.start(h.now);
    h.act(out).await;
    let out = h.engine.skip(h.now);
    h.act(out).await;
    assert_eq!(h.engine.position().phase, Phase::Focus);
    assert_eq!(h.engine.position().cycles_completed, 1);
    assert_eq!(h.gateway.snapshot().cycles_completed, 1);

    // Skips never notify
    assert!(h.notifier.shown().is_empty());

    // One completed cycle: finish completes the session on the server
    let out = h.engine.finish(h.now);
    h.act(out).await;
    assert_eq!(h.gateway.snapshot().status, SessionStatus::Completed);
    assert_eq!(h.count(|e| matches!(e, CoreEvent::SessionEnded { status: SessionStatus::Completed })), 1);
}

#[tokio::test]
async fn test_hidden_completion_defers_to_server() {
    let mut h = Harness::new(snapshot(SessionStatus::InProgress, Phase::Focus, 0, 3), false);
    h.init().await;

    h.advance(10).await;
    assert!(h.engine.is_parked());
    assert_eq!(h.gateway.call_count(GatewayCall::CompletePhase), 0);
    assert_eq!(h.count(|e| matches!(e, CoreEvent::Parked { phase: Phase::Focus })), 1);

    // The server scheduler completed the phase and notified on its own
    h.gateway
        .set_snapshot(snapshot(SessionStatus::Paused, Phase::Break, 0, 300));

    let out = h.engine.set_visible(true, h.now);
    h.settle(out).await;

    assert_eq!(h.gateway.call_count(GatewayCall::CompletePhase), 0);
    assert!(h.notifier.shown().is_empty());
    assert!(h.sound.played().is_empty());
    assert!(!h.engine.is_parked());

    let view = h.engine.view(h.now);
    assert_eq!(view.phase, Phase::Break);
    assert_eq!(view.status, SessionStatus::Paused);
    assert_eq!(view.remaining_seconds, 300);
    assert!(view.notification_already_sent);
}

#[tokio::test]
async fn test_hidden_completion_finished_locally_when_server_idle() {
    let mut h = Harness::new(snapshot(SessionStatus::InProgress, Phase::Focus, 0, 3), false);
    h.init().await;
    h.advance(5).await;
    assert!(h.engine.is_parked());

    // Server still at (IN_PROGRESS, FOCUS, 0)
    let out = h.engine.set_visible(true, h.now);
    h.settle(out).await;

    assert_eq!(h.gateway.call_count(GatewayCall::CompletePhase), 1);
    assert_eq!(h.notifier.shown().len(), 1);
    assert_eq!(h.engine.position().phase, Phase::Break);

    // Regaining visibility again does not repeat anything
    let out = h.engine.set_visible(false, h.now);
    h.settle(out).await;
    let out = h.engine.set_visible(true, h.now);
    h.settle(out).await;
    assert_eq!(h.gateway.call_count(GatewayCall::CompletePhase), 1);
    assert_eq!(h.notifier.shown().len(), 1);
}

#[tokio::test]
async fn test_completion_conflict_adopts_server_without_notifying() {
    let mut h = Harness::new(snapshot(SessionStatus::InProgress, Phase::Focus, 2, 1), true);
    h.init().await;

    h.gateway.script(GatewayCall::CompletePhase, Err(GatewayError::Conflict));
    h.gateway
        .set_snapshot(snapshot(SessionStatus::Paused, Phase::LongBreak, 3, 900));

    h.advance(1).await;

    assert_eq!(h.gateway.call_count(GatewayCall::CompletePhase), 1);
    assert!(h.notifier.shown().is_empty());
    let view = h.engine.view(h.now);
    assert_eq!(view.phase, Phase::LongBreak);
    assert_eq!(view.cycles_completed, 3);
    assert_eq!(view.remaining_seconds, 900);
}

#[tokio::test]
async fn test_auth_expiry_keeps_timer_running() {
    let mut h = Harness::new(snapshot(SessionStatus::InProgress, Phase::Focus, 0, 600), true);
    h.init().await;

    h.gateway.set_failure(Some(GatewayError::Unauthorized));
    h.advance(45).await;

    assert_eq!(h.count(|e| matches!(e, CoreEvent::AuthExpired)), 1);
    let view = h.engine.view(h.now);
    assert!(view.is_running);
    assert_eq!(view.remaining_seconds, 555);
    assert!(view.connected);
}

#[tokio::test]
async fn test_disconnected_indicator_after_repeated_failures() {
    let mut h = Harness::new(snapshot(SessionStatus::InProgress, Phase::Focus, 0, 600), true);
    h.init().await;

    h.gateway.set_failure(Some(GatewayError::transient("connection reset")));
    h.advance(30).await;
    assert!(h.engine.view(h.now).connected);

    h.advance(15).await;
    assert!(!h.engine.view(h.now).connected);
    assert_eq!(h.count(|e| matches!(e, CoreEvent::ConnectionChanged { connected: false })), 1);

    h.gateway.set_failure(None);
    h.advance(15).await;
    assert!(h.engine.view(h.now).connected);
    assert_eq!(h.count(|e| matches!(e, CoreEvent::ConnectionChanged { connected: true })), 1);
}

#[tokio::test]
async fn test_failed_start_reports_retry_later() {
    let mut h = Harness::new(snapshot(SessionStatus::NotStarted, Phase::Focus, 0, 0), true);
    h.init().await;

    h.gateway.script(GatewayCall::Start, Err(GatewayError::transient("503")));
    let out = h.engine.start(h.now);
    h.act(out).await;

    assert_eq!(h.count(|e| matches!(e, CoreEvent::RetryLater { action: "start", .. })), 1);
    assert_eq!(h.engine.position().status, SessionStatus::InProgress);
}

#[tokio::test]
async fn test_restart_restores_running_countdown() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pomosync.db");
    let server = snapshot(SessionStatus::NotStarted, Phase::Focus, 0, 0);

    {
        let store = Arc::new(SqliteStore::open(&path).unwrap());
        let mut h = Harness::with_store(server.clone(), true, store);
        h.init().await;
        let out = h.engine.start(h.now);
        h.act(out).await;
        h.advance(7).await;
    }

    // Record written at +5 with 1495 left, restored at +7
    let store = Arc::new(SqliteStore::open(&path).unwrap());
    let mut h = Harness::with_store(server, true, store);
    h.now = t0() + chrono::Duration::seconds(7);
    let out = h.engine.initialize(h.now);

    let view = h.engine.view(h.now);
    assert!(view.is_running);
    assert_eq!(view.status, SessionStatus::InProgress);
    assert_eq!(view.remaining_seconds, 1493);
    assert_eq!(out.requests.len(), 1);
}

#[tokio::test]
async fn test_stale_record_is_ignored() {
    let store = Arc::new(MemoryStore::new());
    let key = PersistedTimerRecord::key(&SessionId::new("morning"));
    let record = PersistedTimerRecord {
        remaining_seconds: 1200,
        is_running: true,
        is_paused: false,
        last_sync_time: t0() - chrono::Duration::minutes(6),
        server_time: None,
        drift: 0,
    };
    store.set(&key, &serde_json::to_string(&record).unwrap()).unwrap();

    let mut h = Harness::with_store(
        snapshot(SessionStatus::NotStarted, Phase::Focus, 0, 0),
        true,
        store.clone(),
    );
    let out = h.engine.initialize(h.now);

    assert!(store.get(&key).unwrap().is_none());
    let view = h.engine.view(h.now);
    assert!(!view.is_running);
    assert_eq!(view.status, SessionStatus::NotStarted);
    assert_eq!(out.requests.len(), 1);
}

#[tokio::test]
async fn test_stop_ends_session_and_clears_record() {
    let store = Arc::new(MemoryStore::new());
    let mut h = Harness::with_store(
        snapshot(SessionStatus::NotStarted, Phase::Focus, 0, 0),
        true,
        store.clone(),
    );
    h.init().await;
    let out = h.engine.start(h.now);
    h.act(out).await;
    assert!(!store.is_empty());

    let out = h.engine.stop(h.now);
    h.act(out).await;

    assert!(store.is_empty());
    assert_eq!(h.gateway.snapshot().status, SessionStatus::Abandoned);
    assert!(h.engine.start(h.now).is_err());
}

#[tokio::test]
async fn test_phase_after_server_auto_start_still_notifies() {
    let mut h = Harness::new(snapshot(SessionStatus::InProgress, Phase::Focus, 0, 3), false);
    h.init().await;
    h.advance(10).await;
    assert!(h.engine.is_parked());

    // The server completed focus and already started the break
    h.gateway
        .set_snapshot(snapshot(SessionStatus::InProgress, Phase::Break, 0, 5));
    let out = h.engine.set_visible(true, h.now);
    h.settle(out).await;
    assert!(h.engine.view(h.now).notification_already_sent);
    assert!(h.notifier.shown().is_empty());

    h.advance(8).await;
    assert_eq!(h.gateway.call_count(GatewayCall::CompletePhase), 1);
    assert_eq!(h.notifier.shown().len(), 1);
    assert!(!h.engine.view(h.now).notification_already_sent);
    assert_eq!(h.engine.position().phase, Phase::Focus);
    assert_eq!(h.engine.position().cycles_completed, 1);
}

#[tokio::test]
async fn test_skip_before_start_is_kept_by_sync() {
    let mut h = Harness::new(snapshot(SessionStatus::NotStarted, Phase::Focus, 0, 0), true);
    h.init().await;

    let out = h.engine.skip(h.now);
    h.act(out).await;
    assert_eq!(h.gateway.snapshot().phase(), Phase::Break);

    let out = h.engine.start(h.now);
    h.act(out).await;
    h.advance(16).await;

    let view = h.engine.view(h.now);
    assert_eq!(view.phase, Phase::Break);
    assert!(!view.notification_already_sent);
    assert_eq!(h.count(|e| matches!(e, CoreEvent::ServerStateAdopted { .. })), 0);

    h.advance(300).await;
    assert_eq!(h.gateway.call_count(GatewayCall::CompletePhase), 2);
    assert_eq!(h.notifier.shown().len(), 1);
    assert_eq!(h.engine.position().phase, Phase::Focus);
    assert_eq!(h.engine.position().cycles_completed, 1);
}

#[tokio::test]
async fn test_background_completion_replayed_on_return() {
    let mut h = Harness::new(snapshot(SessionStatus::InProgress, Phase::Focus, 0, 3), true);
    h.init().await;

    h.complete_then_hide(3).await;
    assert_eq!(h.gateway.call_count(GatewayCall::CompletePhase), 1);
    assert_eq!(h.engine.pending_notifications(), 1);
    assert_eq!(h.count(|e| matches!(e, CoreEvent::ShowModal(_))), 0);

    let out = h.engine.set_visible(true, h.now);
    h.settle(out).await;
    assert_eq!(h.count(|e| matches!(e, CoreEvent::ShowModal(_))), 1);
    assert_eq!(h.engine.pending_notifications(), 0);

    // Replayed once only
    let out = h.engine.set_visible(false, h.now);
    h.settle(out).await;
    let out = h.engine.set_visible(true, h.now);
    h.settle(out).await;
    assert_eq!(h.count(|e| matches!(e, CoreEvent::ShowModal(_))), 1);
}

#[tokio::test]
async fn test_logout_drops_queued_notifications() {
    let mut h = Harness::new(snapshot(SessionStatus::InProgress, Phase::Focus, 0, 3), true);
    h.init().await;

    h.complete_then_hide(3).await;
    assert_eq!(h.engine.pending_notifications(), 1);

    h.engine.logout();
    assert_eq!(h.engine.pending_notifications(), 0);

    let out = h.engine.set_visible(true, h.now);
    h.settle(out).await;
    assert_eq!(h.count(|e| matches!(e, CoreEvent::ShowModal(_))), 0);

    // A completion queued after logout is not replayed either
    let out = h.engine.set_remaining_seconds(3, h.now);
    h.act(out).await;
    let out = h.engine.start(h.now);
    h.act(out).await;
    h.complete_then_hide(3).await;
    assert_eq!(h.gateway.call_count(GatewayCall::CompletePhase), 2);

    let out = h.engine.set_visible(true, h.now);
    h.settle(out).await;
    assert_eq!(h.count(|e| matches!(e, CoreEvent::ShowModal(_))), 0);
}

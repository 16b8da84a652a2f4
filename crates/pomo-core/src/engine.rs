//! Timer synchronization engine

use chrono::{DateTime, Local};
use pomo_api::{
    NotificationContext, Phase, SessionPosition, SessionStatus, TimerSnapshot, TimerView,
};
use pomo_config::{EngineSettings, NotificationSettings, Settings};
use pomo_host_api::{GatewayCall, GatewayError, GatewayResult, HostCapabilities};
use pomo_store::{KeyValueStore, PersistedTimerRecord};
use pomo_util::{ActivityId, PomoError, Result, SessionId};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::{
    guard, CancelToken, ConnectionHealth, CoreEvent, CountdownClock, Dispatch, DispatchInputs,
    DispatchPlan, DriftPolicy, GatewayRequest, LocalObservation, LocalTimerState, Outcome,
    Parked, PendingQueue, PhaseController, RequestOrigin, ResumeDecision, Scheduler,
    SyncDecision, TimerPersistence, ZeroCrossingAction,
};

/// The session an engine is bound to
#[derive(Debug, Clone)]
pub struct SessionBinding {
    pub activity_id: ActivityId,
    pub session_id: SessionId,

    /// Used in notification bodies
    pub activity_title: Option<String>,
}

#[derive(Debug, Clone, Copy)]
struct AutoStart {
    token: CancelToken,
    phase: Phase,
}

/// One engine per active session.
///
/// The engine is a synchronous state machine driven with an explicit `now`.
/// It never performs I/O against the gateway itself: every server call is
/// returned as a `GatewayRequest` tagged with the current generation, and the
/// runtime feeds the result back through `handle_response`. Results from an
/// older generation are discarded.
pub struct TimerEngine {
    binding: SessionBinding,
    settings: EngineSettings,
    notifications: NotificationSettings,
    capabilities: HostCapabilities,
    drift_policy: DriftPolicy,

    controller: PhaseController,
    clock: CountdownClock,
    scheduler: Scheduler,
    tick_timer: Option<CancelToken>,
    sync_timer: Option<CancelToken>,
    load_retry: Option<CancelToken>,
    auto_start: Option<AutoStart>,

    persistence: TimerPersistence,
    health: ConnectionHealth,
    pending: PendingQueue,

    generation: u64,
    next_request_id: u64,
    actions_in_flight: usize,
    sync_in_flight: bool,
    loaded: bool,
    restored: Option<PersistedTimerRecord>,

    last_snapshot: Option<TimerSnapshot>,
    started_since_sync: bool,
    parked: Option<Parked>,
    visible: bool,
    logged_in: bool,
    auth_expired: bool,
    notification_already_sent: bool,
    ticks_since_persist: u32,
}

impl TimerEngine {
    pub fn new(
        binding: SessionBinding,
        settings: &Settings,
        capabilities: HostCapabilities,
        store: Arc<dyn KeyValueStore>,
        visible: bool,
    ) -> Self {
        let engine = settings.engine.clone();
        let controller = PhaseController::default();
        let clock = CountdownClock::new(controller.phase_seconds());

        info!(
            session_id = %binding.session_id,
            activity_id = %binding.activity_id,
            device = ?capabilities.device_type,
            "Timer engine created"
        );

        Self {
            persistence: TimerPersistence::new(
                store,
                &binding.session_id,
                engine.persist_staleness,
            ),
            health: ConnectionHealth::new(engine.disconnected_after_failures),
            pending: PendingQueue::new(settings.notifications.queue_ttl),
            drift_policy: DriftPolicy {
                max_drift_secs: engine.max_drift_secs,
                just_started_threshold_secs: engine.just_started_threshold_secs,
            },
            binding,
            settings: engine,
            notifications: settings.notifications.clone(),
            capabilities,
            controller,
            clock,
            scheduler: Scheduler::new(),
            tick_timer: None,
            sync_timer: None,
            load_retry: None,
            auto_start: None,
            generation: 0,
            next_request_id: 0,
            actions_in_flight: 0,
            sync_in_flight: false,
            loaded: false,
            restored: None,
            last_snapshot: None,
            started_since_sync: false,
            parked: None,
            visible,
            logged_in: true,
            auth_expired: false,
            notification_already_sent: false,
            ticks_since_persist: 0,
        }
    }

    /// Restore persisted state and request the initial snapshot
    pub fn initialize(&mut self, now: DateTime<Local>) -> Outcome {
        let mut out = Outcome::default();

        if let Some(record) = self.persistence.load(now) {
            let remaining = record.age_corrected_remaining(now);
            self.clock.reset_to(remaining);
            if let Some(server_time) = record.server_time {
                self.clock.record_sync(server_time, record.drift);
            }

            if record.is_running {
                self.controller.restore_status(SessionStatus::InProgress);
                self.clock.start(now);
                self.start_intervals(now);
            } else if record.is_paused {
                self.controller.restore_status(SessionStatus::Paused);
                self.clock.mark_paused();
            }

            info!(
                session_id = %self.binding.session_id,
                remaining_secs = remaining,
                running = record.is_running,
                "Restored timer state"
            );
            self.restored = Some(record);
        }
        if !self.persistence.is_available() {
            out.events.push(CoreEvent::PersistenceUnavailable);
        }

        self.request(GatewayCall::GetSession, RequestOrigin::Load, &mut out);
        out
    }

    // ---- observation ----

    pub fn binding(&self) -> &SessionBinding {
        &self.binding
    }

    pub fn position(&self) -> SessionPosition {
        self.controller.position()
    }

    pub fn local_state(&self) -> &LocalTimerState {
        self.clock.state()
    }

    pub fn remaining_at(&self, now: DateTime<Local>) -> u64 {
        self.clock.remaining_at(now)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_parked(&self) -> bool {
        self.parked.is_some()
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn is_connected(&self) -> bool {
        self.health.is_connected()
    }

    pub fn pending_notifications(&self) -> usize {
        self.pending.len()
    }

    /// Whether the tick/sync intervals are currently armed
    pub fn is_ticking(&self) -> bool {
        self.tick_timer.is_some()
    }

    pub fn is_syncing(&self) -> bool {
        self.sync_timer.is_some()
    }

    pub fn view(&self, now: DateTime<Local>) -> TimerView {
        let position = self.controller.position();
        let state = self.clock.state();

        let auto_start_in_seconds = self
            .auto_start
            .and_then(|a| self.scheduler.next_due(a.token))
            .map(|due| {
                let ms = (due - now).num_milliseconds().max(0) as u64;
                ms.div_ceil(1000)
            });

        TimerView {
            status: position.status,
            phase: position.phase,
            cycles_completed: position.cycles_completed,
            remaining_seconds: self.clock.remaining_at(now),
            is_running: state.is_running,
            is_paused: state.is_paused,
            has_custom_time: state.has_custom_time,
            connected: self.health.is_connected(),
            auto_start_in_seconds,
            notification_already_sent: self.notification_already_sent,
        }
    }

    // ---- user operations ----

    /// Start a fresh session or resume a paused one
    pub fn start(&mut self, now: DateTime<Local>) -> Result<Outcome> {
        let mut out = Outcome::default();
        self.begin(now, &mut out)?;
        Ok(out)
    }

    fn begin(&mut self, now: DateTime<Local>, out: &mut Outcome) -> Result<()> {
        let from = self.controller.position();
        let call = if from.status == SessionStatus::Paused {
            GatewayCall::Resume
        } else {
            GatewayCall::Start
        };

        // A phase that already ran out (parked, then paused) completes
        // instead of restarting from its full length
        if from.status == SessionStatus::Paused && self.clock.state().remaining_seconds == 0 {
            self.complete_current(now, out);
            return Ok(());
        }

        self.controller.start()?;
        self.bump_generation();
        self.cancel_auto_start_into(out);
        self.parked = None;

        if self.clock.state().remaining_seconds == 0 {
            self.clock.reset_to(self.controller.phase_seconds());
        }
        self.clock.start(now);
        self.started_since_sync = true;
        self.notification_already_sent = false;
        self.start_intervals(now);
        self.persist(now, out);

        info!(
            session_id = %self.binding.session_id,
            phase = %self.controller.phase(),
            remaining_secs = self.clock.state().remaining_seconds,
            "Timer started"
        );

        self.emit_transition(from, out);
        self.request(call, RequestOrigin::UserAction, out);
        Ok(())
    }

    /// Pause a running session. Pausing a paused session is a no-op.
    pub fn pause(&mut self, now: DateTime<Local>) -> Result<Outcome> {
        let mut out = Outcome::default();
        let from = self.controller.position();

        if !self.controller.pause()? {
            return Ok(out);
        }

        self.bump_generation();
        self.clock.pause(now);
        self.clock.mark_paused();
        self.parked = None;
        self.stop_intervals();
        self.cancel_auto_start_into(&mut out);
        self.persist(now, &mut out);

        info!(
            session_id = %self.binding.session_id,
            remaining_secs = self.clock.state().remaining_seconds,
            "Timer paused"
        );

        self.emit_transition(from, &mut out);
        self.request(GatewayCall::Pause, RequestOrigin::UserAction, &mut out);
        Ok(out)
    }

    /// Force a transition to the other phase
    pub fn skip(&mut self, now: DateTime<Local>) -> Result<Outcome> {
        let mut out = Outcome::default();
        let from = self.controller.position();

        let skipped = self.controller.skip()?;
        self.bump_generation();
        self.stop_intervals();
        self.cancel_auto_start_into(&mut out);
        self.parked = None;

        self.clock.reset_to(self.controller.phase_seconds());
        if self.controller.status() == SessionStatus::Paused {
            self.clock.mark_paused();
        }
        self.persist(now, &mut out);

        info!(
            session_id = %self.binding.session_id,
            from = %skipped,
            to = %self.controller.phase(),
            "Phase skipped"
        );

        self.emit_transition(from, &mut out);
        self.request(
            GatewayCall::CompletePhase,
            RequestOrigin::Skip { phase: skipped },
            &mut out,
        );
        Ok(out)
    }

    /// Back to (NOT_STARTED, FOCUS) with no cycles. Local only.
    pub fn reset(&mut self, _now: DateTime<Local>) -> Outcome {
        let mut out = Outcome::default();
        let from = self.controller.position();

        self.controller.reset();
        self.bump_generation();
        self.stop_intervals();
        self.cancel_auto_start_into(&mut out);
        self.parked = None;
        self.clock.reset_to(self.controller.phase_seconds());
        self.persistence.clear();
        self.started_since_sync = false;
        self.notification_already_sent = false;

        info!(session_id = %self.binding.session_id, "Timer reset");

        self.emit_transition(from, &mut out);
        out
    }

    /// Complete the session early: COMPLETED with at least one cycle,
    /// otherwise back to NOT_STARTED without calling the server
    pub fn finish(&mut self, now: DateTime<Local>) -> Result<Outcome> {
        let mut out = Outcome::default();
        let from = self.controller.position();

        let status = self.controller.finish()?;
        self.bump_generation();
        self.parked = None;

        if status == SessionStatus::Completed {
            self.request(GatewayCall::Finish, RequestOrigin::UserAction, &mut out);
            self.end_session(status, now, &mut out);
        } else {
            self.stop_intervals();
            self.cancel_auto_start_into(&mut out);
            self.clock.reset_to(self.controller.phase_seconds());
            self.persistence.clear();
            info!(
                session_id = %self.binding.session_id,
                "Finished without a completed cycle, session reset"
            );
        }

        self.emit_transition(from, &mut out);
        Ok(out)
    }

    /// Abandon the session
    pub fn stop(&mut self, now: DateTime<Local>) -> Result<Outcome> {
        let mut out = Outcome::default();
        let from = self.controller.position();

        self.controller.abandon()?;
        self.bump_generation();
        self.parked = None;
        self.request(GatewayCall::Stop, RequestOrigin::UserAction, &mut out);
        self.end_session(SessionStatus::Abandoned, now, &mut out);

        self.emit_transition(from, &mut out);
        Ok(out)
    }

    /// Manual override of the remaining time. Only allowed while the session
    /// is NOT_STARTED or PAUSED.
    pub fn set_remaining_seconds(&mut self, seconds: u64, now: DateTime<Local>) -> Result<Outcome> {
        let mut out = Outcome::default();
        let status = self.controller.status();

        if status.is_terminal() {
            return Err(PomoError::SessionEnded);
        }
        if !self.controller.is_editable() {
            return Err(PomoError::NotEditable(status.to_string()));
        }

        self.bump_generation();
        self.clock.set_remaining(seconds, now);
        self.persist(now, &mut out);

        info!(
            session_id = %self.binding.session_id,
            remaining_secs = seconds,
            "Remaining time set manually"
        );
        Ok(out)
    }

    /// Cancel a pending auto-start countdown
    pub fn cancel_auto_start(&mut self) -> Outcome {
        let mut out = Outcome::default();
        self.cancel_auto_start_into(&mut out);
        out
    }

    /// Visibility changed. Regaining visibility always re-fetches the
    /// snapshot and replays notifications missed while hidden.
    pub fn set_visible(&mut self, visible: bool, now: DateTime<Local>) -> Outcome {
        let mut out = Outcome::default();
        if visible == self.visible {
            return out;
        }
        self.visible = visible;
        info!(
            session_id = %self.binding.session_id,
            visible,
            parked = self.parked.is_some(),
            "Visibility changed"
        );

        if !visible {
            return out;
        }

        for context in self
            .pending
            .drain_replayable(now, self.notifications.enabled)
        {
            out.events.push(CoreEvent::ShowModal(context));
        }

        if self.parked.is_some() && self.sync_timer.is_none() {
            self.sync_timer = Some(self.scheduler.every(self.settings.sync_interval, now));
        }

        if self.loaded {
            self.request(
                GatewayCall::GetSession,
                RequestOrigin::VisibilityRefetch,
                &mut out,
            );
        }
        out
    }

    /// Drop queued notifications; anything queued from now on will not be
    /// replayed
    pub fn logout(&mut self) {
        self.logged_in = false;
        self.pending.clear();
        info!(session_id = %self.binding.session_id, "Logged out, pending notifications cleared");
    }

    pub fn update_notification_settings(&mut self, settings: NotificationSettings) {
        self.notifications = settings;
    }

    // ---- time ----

    /// Fire whatever timers are due at `now`
    pub fn poll(&mut self, now: DateTime<Local>) -> Outcome {
        let mut out = Outcome::default();

        for token in self.scheduler.due(now) {
            if self.tick_timer == Some(token) {
                self.on_tick(now, &mut out);
            } else if self.sync_timer == Some(token) {
                self.on_sync(&mut out);
            } else if self.load_retry == Some(token) {
                self.load_retry = None;
                self.request(GatewayCall::GetSession, RequestOrigin::Load, &mut out);
            } else if self.auto_start.map(|a| a.token) == Some(token) {
                self.on_auto_start(now, &mut out);
            }
        }

        out
    }

    fn on_tick(&mut self, now: DateTime<Local>, out: &mut Outcome) {
        let tick = self.clock.tick(now);

        if tick.zero_crossed {
            self.on_zero_crossing(now, out);
            return;
        }

        if self.clock.is_running() {
            self.ticks_since_persist += 1;
            if self.ticks_since_persist >= self.settings.persist_every_ticks {
                self.persist(now, out);
            }
        }
    }

    fn on_zero_crossing(&mut self, now: DateTime<Local>, out: &mut Outcome) {
        let phase = self.controller.phase();
        self.stop_intervals();
        out.events.push(CoreEvent::ZeroCrossed {
            phase,
            visible: self.visible,
        });

        match guard::on_zero_crossing(self.visible) {
            ZeroCrossingAction::CompleteNow => self.complete_current(now, out),
            ZeroCrossingAction::Park => {
                self.parked = Some(Parked {
                    position: self.controller.position(),
                    since: now,
                });
                self.clock.mark_paused();
                self.persist(now, out);
                info!(
                    session_id = %self.binding.session_id,
                    phase = %phase,
                    "Phase ended while hidden, leaving completion to the server"
                );
                out.events.push(CoreEvent::Parked { phase });
            }
        }
    }

    /// Client-side completion of the current phase
    fn complete_current(&mut self, now: DateTime<Local>, out: &mut Outcome) {
        let from = self.controller.position();
        let completed = match self.controller.complete_phase() {
            Ok(phase) => phase,
            Err(e) => {
                warn!(error = %e, "Cannot complete phase");
                return;
            }
        };

        self.bump_generation();
        self.stop_intervals();
        self.parked = None;
        // Any server-sent notification covered an earlier completion
        self.notification_already_sent = false;
        self.clock.reset_to(self.controller.phase_seconds());
        self.clock.mark_paused();
        self.persist(now, out);

        info!(
            session_id = %self.binding.session_id,
            completed = %completed,
            "Completing phase"
        );

        self.emit_transition(from, out);
        self.request(
            GatewayCall::CompletePhase,
            RequestOrigin::Completion { phase: completed },
            out,
        );
    }

    fn on_sync(&mut self, out: &mut Outcome) {
        if self.sync_in_flight {
            debug!("Sync already in flight, skipping");
            return;
        }

        let running = self.controller.status() == SessionStatus::InProgress && self.clock.is_running();
        if !running && self.parked.is_none() {
            return;
        }

        self.request(GatewayCall::GetSession, RequestOrigin::Sync, out);
    }

    fn on_auto_start(&mut self, now: DateTime<Local>, out: &mut Outcome) {
        let Some(auto) = self.auto_start.take() else {
            return;
        };

        if self.controller.status() != SessionStatus::Paused || self.controller.phase() != auto.phase {
            debug!("Auto-start no longer applicable");
            return;
        }

        info!(
            session_id = %self.binding.session_id,
            phase = %auto.phase,
            "Auto-starting next phase"
        );
        if let Err(e) = self.begin(now, out) {
            warn!(error = %e, "Auto-start failed");
        }
    }

    // ---- gateway results ----

    /// Feed back the result of a request previously returned by the engine
    pub fn handle_response(
        &mut self,
        request: &GatewayRequest,
        result: GatewayResult<TimerSnapshot>,
        now: DateTime<Local>,
    ) -> Outcome {
        let mut out = Outcome::default();

        match request.origin {
            RequestOrigin::UserAction | RequestOrigin::Completion { .. } | RequestOrigin::Skip { .. } => {
                self.actions_in_flight = self.actions_in_flight.saturating_sub(1);
            }
            RequestOrigin::Sync => self.sync_in_flight = false,
            _ => {}
        }

        match &result {
            Ok(_) => self.on_gateway_reached(&mut out),
            Err(e) => self.on_gateway_error(request, e, &mut out),
        }

        if request.generation != self.generation {
            debug!(
                call = request.call.name(),
                request_generation = request.generation,
                generation = self.generation,
                "Discarding stale gateway result"
            );
            match (request.origin, &result) {
                (RequestOrigin::Load, Ok(snapshot)) => {
                    // Keep durations, leave position to the next reconciliation
                    self.loaded = true;
                    self.controller.set_durations(snapshot.durations());
                }
                (RequestOrigin::Completion { .. }, Err(GatewayError::Conflict)) => {}
                // The phase still ended, only its state is out of date
                (RequestOrigin::Completion { phase }, _) => self.notify(phase, now, &mut out),
                _ => {}
            }
            return out;
        }

        match (request.origin, result) {
            (RequestOrigin::Load, Ok(snapshot)) => self.apply_load(snapshot, now, &mut out),
            (RequestOrigin::Load, Err(_)) => {
                if self.load_retry.is_none() {
                    self.load_retry = Some(self.scheduler.once(self.settings.sync_interval, now));
                }
            }
            (RequestOrigin::Sync | RequestOrigin::VisibilityRefetch, Ok(snapshot)) => {
                self.reconcile(snapshot, now, &mut out);
            }
            (RequestOrigin::ConflictRefetch, Ok(snapshot)) => {
                self.adopt_server(snapshot, true, now, &mut out);
            }
            (RequestOrigin::Completion { phase }, Ok(snapshot)) => {
                self.apply_completion(snapshot, Some(phase), now, &mut out);
            }
            (RequestOrigin::Skip { .. }, Ok(snapshot)) => {
                self.apply_completion(snapshot, None, now, &mut out);
            }
            (
                RequestOrigin::Completion { .. } | RequestOrigin::Skip { .. },
                Err(GatewayError::Conflict),
            ) => {
                info!(
                    session_id = %self.binding.session_id,
                    "Completion conflicted with the server, re-fetching"
                );
                self.request(
                    GatewayCall::GetSession,
                    RequestOrigin::ConflictRefetch,
                    &mut out,
                );
            }
            (RequestOrigin::Completion { phase }, Err(_)) => {
                // The phase did end locally; keep the optimistic state
                self.notify(phase, now, &mut out);
                self.maybe_schedule_auto_start(now, &mut out);
            }
            (RequestOrigin::UserAction, Ok(snapshot)) => {
                self.last_snapshot = Some(snapshot);
            }
            _ => {}
        }

        out
    }

    fn on_gateway_reached(&mut self, out: &mut Outcome) {
        self.auth_expired = false;
        if let Some(connected) = self.health.record_success() {
            out.events.push(CoreEvent::ConnectionChanged { connected });
        }
    }

    fn on_gateway_error(&mut self, request: &GatewayRequest, error: &GatewayError, out: &mut Outcome) {
        warn!(
            session_id = %self.binding.session_id,
            call = request.call.name(),
            error = %error,
            "Gateway call failed"
        );

        match error {
            GatewayError::Transient(_) => {
                if let Some(connected) = self.health.record_failure() {
                    out.events.push(CoreEvent::ConnectionChanged { connected });
                }
            }
            GatewayError::Unauthorized => {
                if let Some(connected) = self.health.record_success() {
                    out.events.push(CoreEvent::ConnectionChanged { connected });
                }
                if !self.auth_expired {
                    self.auth_expired = true;
                    out.events.push(CoreEvent::AuthExpired);
                }
            }
            GatewayError::NotFound | GatewayError::Conflict => {
                // The server answered
                if let Some(connected) = self.health.record_success() {
                    out.events.push(CoreEvent::ConnectionChanged { connected });
                }
            }
        }

        let is_action = matches!(
            request.origin,
            RequestOrigin::UserAction | RequestOrigin::Completion { .. } | RequestOrigin::Skip { .. }
        );
        if is_action && *error != GatewayError::Conflict {
            out.events.push(CoreEvent::RetryLater {
                action: request.call.name(),
                error: error.to_string(),
            });
        }
    }

    fn apply_load(&mut self, snapshot: TimerSnapshot, now: DateTime<Local>, out: &mut Outcome) {
        self.loaded = true;
        if let Some(token) = self.load_retry.take() {
            self.scheduler.cancel(token);
        }

        let from = self.controller.position();
        let restored = self.restored.take();
        let server_remaining = self.effective_remaining(&snapshot);
        self.controller.adopt(&snapshot);
        self.clock.record_sync(now, 0);

        match snapshot.status {
            SessionStatus::InProgress => {
                let remaining = match &restored {
                    Some(r) if r.is_running => {
                        let local = self.clock.remaining_at(now);
                        if local.abs_diff(server_remaining) <= self.drift_policy.max_drift_secs {
                            local
                        } else {
                            server_remaining
                        }
                    }
                    _ => server_remaining,
                };
                self.align_clock(remaining, true, now);
            }
            SessionStatus::Paused => {
                let remaining = match &restored {
                    Some(r) if r.is_paused => r.remaining_seconds,
                    _ => server_remaining,
                };
                self.align_clock(remaining, false, now);
            }
            SessionStatus::NotStarted => self.align_clock(server_remaining, false, now),
            SessionStatus::Completed | SessionStatus::Abandoned => {
                self.end_session(snapshot.status, now, out);
            }
        }

        self.started_since_sync = false;
        self.last_snapshot = Some(snapshot);

        info!(
            session_id = %self.binding.session_id,
            status = %self.controller.status(),
            phase = %self.controller.phase(),
            cycles = self.controller.cycles_completed(),
            remaining_secs = self.clock.state().remaining_seconds,
            "Session loaded"
        );
        self.emit_transition(from, out);
    }

    fn reconcile(&mut self, snapshot: TimerSnapshot, now: DateTime<Local>, out: &mut Outcome) {
        if let Some(parked) = self.parked {
            match parked.decide(&snapshot) {
                ResumeDecision::AdoptServer => self.adopt_server(snapshot, true, now, out),
                ResumeDecision::CompleteLocally if self.visible => {
                    self.last_snapshot = Some(snapshot);
                    self.complete_current(now, out);
                }
                ResumeDecision::CompleteLocally => {
                    debug!("Still hidden, staying parked");
                }
            }
            return;
        }

        if self.actions_in_flight > 0 {
            debug!(
                in_flight = self.actions_in_flight,
                "Transition in flight, ignoring snapshot"
            );
            return;
        }

        let observation = LocalObservation {
            position: self.controller.position(),
            remaining_seconds: self.clock.remaining_at(now),
            has_custom_time: self.clock.has_custom_time(),
            started_since_sync: self.started_since_sync,
            previous_status: self.last_snapshot.as_ref().map(|s| s.status),
        };

        match self.drift_policy.decide(&observation, &snapshot) {
            SyncDecision::ServerTransition => {
                let from = observation.position;
                let to = snapshot.position();
                let server_completed =
                    from.phase != to.phase || from.cycles_completed != to.cycles_completed;
                self.adopt_server(snapshot, server_completed, now, out);
                return;
            }
            SyncDecision::Correct {
                server_remaining,
                drift,
            } => {
                if self.clock.is_running() {
                    self.clock.correct(server_remaining, now);
                    info!(
                        session_id = %self.binding.session_id,
                        local = observation.remaining_seconds,
                        server = server_remaining,
                        drift,
                        "Drift corrected"
                    );
                    out.events.push(CoreEvent::DriftCorrected {
                        local: observation.remaining_seconds,
                        server: server_remaining,
                        drift,
                    });
                }
                self.clock.record_sync(now, drift);
            }
            SyncDecision::Keep { drift, reason } => {
                debug!(drift, ?reason, "Drift left alone");
                self.clock.record_sync(now, drift);
            }
        }

        self.started_since_sync = false;
        self.last_snapshot = Some(snapshot);
    }

    /// Take a server-side transition wholesale
    fn adopt_server(
        &mut self,
        snapshot: TimerSnapshot,
        already_notified: bool,
        now: DateTime<Local>,
        out: &mut Outcome,
    ) {
        let from = self.controller.position();
        let remaining = self.effective_remaining(&snapshot);
        self.controller.adopt(&snapshot);
        self.parked = None;
        self.clock.clear_custom_time();

        match snapshot.status {
            SessionStatus::InProgress => self.align_clock(remaining, true, now),
            SessionStatus::Paused | SessionStatus::NotStarted => {
                self.align_clock(remaining, false, now)
            }
            SessionStatus::Completed | SessionStatus::Abandoned => {
                self.end_session(snapshot.status, now, out)
            }
        }

        self.clock.record_sync(now, 0);
        self.started_since_sync = false;
        if already_notified {
            self.notification_already_sent = true;
        }

        let position = self.controller.position();
        info!(
            session_id = %self.binding.session_id,
            status = %position.status,
            phase = %position.phase,
            cycles = position.cycles_completed,
            already_notified,
            "Adopted server state"
        );

        self.last_snapshot = Some(snapshot);
        if !position.status.is_terminal() {
            self.persist(now, out);
        }

        out.events.push(CoreEvent::ServerStateAdopted {
            position,
            notification_already_sent: already_notified,
        });
        self.emit_transition(from, out);
        self.maybe_schedule_auto_start(now, out);
    }

    /// Apply the server's answer to a completion (or skip) request
    fn apply_completion(
        &mut self,
        snapshot: TimerSnapshot,
        completed: Option<Phase>,
        now: DateTime<Local>,
        out: &mut Outcome,
    ) {
        let from = self.controller.position();
        let remaining = self.effective_remaining(&snapshot);
        self.controller.adopt(&snapshot);

        if snapshot.status.is_terminal() {
            self.end_session(snapshot.status, now, out);
        } else {
            if self.controller.status() != SessionStatus::NotStarted {
                self.controller.restore_status(SessionStatus::Paused);
            }
            self.clock.reset_to(remaining);
            self.clock.mark_paused();
            self.persist(now, out);
        }

        self.clock.record_sync(now, 0);
        self.last_snapshot = Some(snapshot);

        info!(
            session_id = %self.binding.session_id,
            phase = %self.controller.phase(),
            cycles = self.controller.cycles_completed(),
            remaining_secs = remaining,
            "Phase completion confirmed"
        );
        self.emit_transition(from, out);

        if let Some(phase) = completed {
            self.notify(phase, now, out);
            self.maybe_schedule_auto_start(now, out);
        }
    }

    // ---- helpers ----

    fn notify(&mut self, phase: Phase, now: DateTime<Local>, out: &mut Outcome) {
        if self.notification_already_sent {
            debug!("Notification already sent by the server, suppressing");
            return;
        }

        let context = NotificationContext::for_completion(
            phase,
            self.binding.session_id.clone(),
            self.binding.activity_id.clone(),
            self.binding.activity_title.clone(),
            now,
        );
        let plan = DispatchPlan::new(
            DispatchInputs {
                visible: self.visible,
                device: self.capabilities.device_type,
                notifications_enabled: self.notifications.enabled,
                sound_enabled: self.notifications.sound,
            },
            &self.capabilities,
        );

        if plan.enqueue {
            self.pending.push(context.clone(), now, self.logged_in);
        }
        if !plan.is_noop() {
            out.events.push(CoreEvent::Notify(Dispatch { context, plan }));
        }
    }

    fn maybe_schedule_auto_start(&mut self, now: DateTime<Local>, out: &mut Outcome) {
        if self.controller.status() != SessionStatus::Paused {
            return;
        }
        let phase = self.controller.phase();
        let policy = &self.notifications.auto_start;
        if !policy.applies_to(phase) {
            return;
        }

        let countdown = policy.countdown;
        if let Some(existing) = self.auto_start.take() {
            self.scheduler.cancel(existing.token);
        }
        let token = self.scheduler.once(countdown, now);
        self.auto_start = Some(AutoStart { token, phase });

        info!(
            session_id = %self.binding.session_id,
            phase = %phase,
            in_secs = countdown.as_secs(),
            "Auto-start scheduled"
        );
        out.events.push(CoreEvent::AutoStartScheduled {
            phase,
            in_secs: countdown.as_secs(),
        });
    }

    fn cancel_auto_start_into(&mut self, out: &mut Outcome) {
        if let Some(auto) = self.auto_start.take() {
            self.scheduler.cancel(auto.token);
            debug!("Auto-start cancelled");
            out.events.push(CoreEvent::AutoStartCancelled);
        }
    }

    fn end_session(&mut self, status: SessionStatus, now: DateTime<Local>, out: &mut Outcome) {
        self.stop_intervals();
        self.cancel_auto_start_into(out);
        self.clock.pause(now);
        self.parked = None;
        self.persistence.clear();

        info!(
            session_id = %self.binding.session_id,
            status = %status,
            cycles = self.controller.cycles_completed(),
            "Session ended"
        );
        out.events.push(CoreEvent::SessionEnded { status });
    }

    /// Server remaining time. An unset value outside IN_PROGRESS means the
    /// phase has not begun and gets its full length.
    fn effective_remaining(&self, snapshot: &TimerSnapshot) -> u64 {
        if snapshot.remaining_phase_seconds == 0 && snapshot.status != SessionStatus::InProgress {
            snapshot.durations().seconds_for(snapshot.phase())
        } else {
            snapshot.remaining_phase_seconds
        }
    }

    fn align_clock(&mut self, remaining: u64, running: bool, now: DateTime<Local>) {
        if running {
            if self.clock.is_running() {
                self.clock.correct(remaining, now);
            } else {
                self.clock.reset_to(remaining);
                self.clock.start(now);
            }
            self.start_intervals(now);
        } else {
            self.clock.pause(now);
            self.clock.reset_to(remaining);
            if self.controller.status() == SessionStatus::Paused {
                self.clock.mark_paused();
            }
            self.stop_intervals();
        }
    }

    fn start_intervals(&mut self, now: DateTime<Local>) {
        if self.tick_timer.is_none() {
            self.tick_timer = Some(self.scheduler.every(self.settings.tick_interval, now));
        }
        if self.sync_timer.is_none() {
            self.sync_timer = Some(self.scheduler.every(self.settings.sync_interval, now));
        }
    }

    fn stop_intervals(&mut self) {
        if let Some(token) = self.tick_timer.take() {
            self.scheduler.cancel(token);
        }
        if let Some(token) = self.sync_timer.take() {
            self.scheduler.cancel(token);
        }
        self.ticks_since_persist = 0;
    }

    fn persist(&mut self, now: DateTime<Local>, out: &mut Outcome) {
        let state = self.clock.state();
        let record = PersistedTimerRecord {
            remaining_seconds: self.clock.remaining_at(now),
            is_running: state.is_running,
            is_paused: state.is_paused,
            last_sync_time: now,
            server_time: state.last_sync_time,
            drift: state.drift,
        };

        if self.persistence.save(&record) {
            out.events.push(CoreEvent::PersistenceUnavailable);
        }
        self.ticks_since_persist = 0;
    }

    fn bump_generation(&mut self) {
        self.generation += 1;
    }

    fn request(&mut self, call: GatewayCall, origin: RequestOrigin, out: &mut Outcome) {
        self.next_request_id += 1;
        match origin {
            RequestOrigin::UserAction | RequestOrigin::Completion { .. } | RequestOrigin::Skip { .. } => {
                self.actions_in_flight += 1;
            }
            RequestOrigin::Sync => self.sync_in_flight = true,
            _ => {}
        }

        debug!(
            id = self.next_request_id,
            generation = self.generation,
            call = call.name(),
            ?origin,
            "Gateway request issued"
        );

        out.requests.push(GatewayRequest {
            id: self.next_request_id,
            generation: self.generation,
            call,
            origin,
        });
    }

    fn emit_transition(&self, from: SessionPosition, out: &mut Outcome) {
        let to = self.controller.position();
        if from != to {
            debug!(
                from_status = %from.status,
                to_status = %to.status,
                from_phase = %from.phase,
                to_phase = %to.phase,
                "Transitioned"
            );
            out.events.push(CoreEvent::Transitioned { from, to });
        }
    }
}

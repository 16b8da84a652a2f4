//! Phase transition state machine

use pomo_api::{Phase, PhaseDurations, SessionPosition, SessionStatus, TimerSnapshot};
use pomo_util::{PomoError, Result};
use tracing::debug;

/// Session status × phase state machine with cycle counting.
///
/// Transitions here are local and optimistic; the engine pairs them with
/// gateway requests and later reconciliation.
#[derive(Debug, Clone)]
pub struct PhaseController {
    status: SessionStatus,
    phase: Phase,
    cycles_completed: u32,
    durations: PhaseDurations,
}

impl Default for PhaseController {
    fn default() -> Self {
        Self::new(PhaseDurations::default())
    }
}

impl PhaseController {
    pub fn new(durations: PhaseDurations) -> Self {
        Self {
            status: SessionStatus::NotStarted,
            phase: Phase::Focus,
            cycles_completed: 0,
            durations,
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn cycles_completed(&self) -> u32 {
        self.cycles_completed
    }

    pub fn durations(&self) -> PhaseDurations {
        self.durations
    }

    pub fn position(&self) -> SessionPosition {
        SessionPosition {
            status: self.status,
            phase: self.phase,
            cycles_completed: self.cycles_completed,
        }
    }

    /// Full length of the current phase
    pub fn phase_seconds(&self) -> u64 {
        self.durations.seconds_for(self.phase)
    }

    /// Manual time edits are only allowed before starting or while paused
    pub fn is_editable(&self) -> bool {
        matches!(self.status, SessionStatus::NotStarted | SessionStatus::Paused)
    }

    fn ensure_live(&self) -> Result<()> {
        if self.status.is_terminal() {
            return Err(PomoError::SessionEnded);
        }
        Ok(())
    }

    /// NOT_STARTED|PAUSED → IN_PROGRESS, same phase
    pub fn start(&mut self) -> Result<()> {
        self.ensure_live()?;
        if !self.status.can_start() {
            return Err(PomoError::invalid_transition("start", self.status));
        }
        self.status = SessionStatus::InProgress;
        Ok(())
    }

    /// IN_PROGRESS → PAUSED. Returns false when already paused.
    pub fn pause(&mut self) -> Result<bool> {
        self.ensure_live()?;
        match self.status {
            SessionStatus::InProgress => {
                self.status = SessionStatus::Paused;
                Ok(true)
            }
            SessionStatus::Paused => Ok(false),
            other => Err(PomoError::invalid_transition("pause", other)),
        }
    }

    /// Optimistic local completion of the current phase: FOCUS after any
    /// break (+1 cycle), BREAK after FOCUS until the server says otherwise.
    /// Returns the phase that was completed.
    pub fn complete_phase(&mut self) -> Result<Phase> {
        self.ensure_live()?;
        let completed = self.phase;
        self.advance();
        if self.status != SessionStatus::NotStarted {
            self.status = SessionStatus::Paused;
        }
        Ok(completed)
    }

    /// Manual forced transition to the other phase
    pub fn skip(&mut self) -> Result<Phase> {
        self.complete_phase()
    }

    fn advance(&mut self) {
        if self.phase.is_break() {
            self.cycles_completed += 1;
            self.phase = Phase::Focus;
        } else {
            self.phase = Phase::Break;
        }
        debug!(
            phase = %self.phase,
            cycles = self.cycles_completed,
            "Advanced phase locally"
        );
    }

    /// Back to (NOT_STARTED, FOCUS) with no cycles
    pub fn reset(&mut self) {
        self.status = SessionStatus::NotStarted;
        self.phase = Phase::Focus;
        self.cycles_completed = 0;
    }

    /// COMPLETED with at least one cycle, otherwise back to NOT_STARTED
    pub fn finish(&mut self) -> Result<SessionStatus> {
        self.ensure_live()?;
        if self.cycles_completed > 0 {
            self.status = SessionStatus::Completed;
        } else {
            self.reset();
        }
        Ok(self.status)
    }

    /// → ABANDONED
    pub fn abandon(&mut self) -> Result<()> {
        self.ensure_live()?;
        self.status = SessionStatus::Abandoned;
        Ok(())
    }

    /// Take the snapshot's position and durations wholesale
    pub fn adopt(&mut self, snapshot: &TimerSnapshot) {
        self.status = snapshot.status;
        self.phase = snapshot.phase();
        self.cycles_completed = snapshot.cycles_completed;
        self.durations = snapshot.durations();
    }

    pub fn set_durations(&mut self, durations: PhaseDurations) {
        self.durations = durations;
    }

    /// Force a status, used when restoring before the server has answered
    pub fn restore_status(&mut self, status: SessionStatus) {
        self.status = status;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let ctl = PhaseController::default();
        assert_eq!(ctl.status(), SessionStatus::NotStarted);
        assert_eq!(ctl.phase(), Phase::Focus);
        assert_eq!(ctl.cycles_completed(), 0);
        assert_eq!(ctl.phase_seconds(), 25 * 60);
        assert!(ctl.is_editable());
    }

    #[test]
    fn test_start_pause_resume() {
        let mut ctl = PhaseController::default();
        ctl.start().unwrap();
        assert_eq!(ctl.status(), SessionStatus::InProgress);
        assert!(!ctl.is_editable());

        // Cannot start twice
        assert!(matches!(
            ctl.start(),
            Err(PomoError::InvalidTransition { action: "start", .. })
        ));

        assert!(ctl.pause().unwrap());
        assert!(!ctl.pause().unwrap());
        assert!(ctl.is_editable());

        ctl.start().unwrap();
        assert_eq!(ctl.status(), SessionStatus::InProgress);
    }

    #[test]
    fn test_pause_before_start_is_invalid() {
        let mut ctl = PhaseController::default();
        assert!(ctl.pause().is_err());
    }

    #[test]
    fn test_cycle_counting() {
        let mut ctl = PhaseController::default();
        ctl.start().unwrap();

        // Focus completion does not count a cycle
        assert_eq!(ctl.complete_phase().unwrap(), Phase::Focus);
        assert_eq!(ctl.phase(), Phase::Break);
        assert_eq!(ctl.cycles_completed(), 0);
        assert_eq!(ctl.status(), SessionStatus::Paused);

        ctl.start().unwrap();
        assert_eq!(ctl.complete_phase().unwrap(), Phase::Break);
        assert_eq!(ctl.phase(), Phase::Focus);
        assert_eq!(ctl.cycles_completed(), 1);
    }

    #[test]
    fn test_skip_from_break_counts_cycle() {
        let mut ctl = PhaseController::default();

        // Skipping before starting keeps NOT_STARTED
        ctl.skip().unwrap();
        assert_eq!(ctl.phase(), Phase::Break);
        assert_eq!(ctl.status(), SessionStatus::NotStarted);
        assert_eq!(ctl.cycles_completed(), 0);

        ctl.skip().unwrap();
        assert_eq!(ctl.phase(), Phase::Focus);
        assert_eq!(ctl.cycles_completed(), 1);
    }

    #[test]
    fn test_finish_depends_on_cycles() {
        let mut ctl = PhaseController::default();
        ctl.start().unwrap();
        assert_eq!(ctl.finish().unwrap(), SessionStatus::NotStarted);

        let mut ctl = PhaseController::default();
        ctl.skip().unwrap();
        ctl.skip().unwrap();
        assert_eq!(ctl.finish().unwrap(), SessionStatus::Completed);

        // Terminal
        assert!(matches!(ctl.start(), Err(PomoError::SessionEnded)));
    }

    #[test]
    fn test_abandon_and_reset() {
        let mut ctl = PhaseController::default();
        ctl.skip().unwrap();
        ctl.abandon().unwrap();
        assert_eq!(ctl.status(), SessionStatus::Abandoned);
        assert!(ctl.abandon().is_err());

        ctl.reset();
        assert_eq!(ctl.position(), PhaseController::default().position());
    }
}

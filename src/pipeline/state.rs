//! Pipeline phases and shared application state.
//!
//! [`PipelinePhase`] is the orchestrator's state machine.  The display
//! surface and the voice listener read it via [`SharedState`].
//!
//! [`AppState`] holds everything the display needs: current phase, current
//! task description, the run's issues, and the last error message.  Only the
//! orchestrator writes to it.

use std::sync::{Arc, Mutex, PoisonError};

use crate::issue::Issue;

// ---------------------------------------------------------------------------
// PipelinePhase
// ---------------------------------------------------------------------------

/// Phases of a compliance run.
///
/// ```text
/// Idle ──start──▶ Translating ──hold──▶ CheckingCompliance
///                                        ──analysis ok──▶ Persisting ──hold──▶ Completed
///                                        ──analysis err─▶ Error
/// Completed / Error ──start──▶ Translating
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelinePhase {
    /// No run has happened yet.
    #[default]
    Idle,

    /// Content is being translated (simulated).
    Translating,

    /// The analysis gateway is scanning the markup.
    CheckingCompliance,

    /// Issues are being synced to the board (simulated).
    Persisting,

    /// The run finished successfully.
    Completed,

    /// The analysis failed; a new run may be started.
    Error,
}

impl PipelinePhase {
    /// Returns `true` while a run is in flight.
    ///
    /// ```
    /// use compliance_agent::pipeline::PipelinePhase;
    ///
    /// assert!(!PipelinePhase::Idle.is_busy());
    /// assert!(PipelinePhase::Translating.is_busy());
    /// assert!(PipelinePhase::CheckingCompliance.is_busy());
    /// assert!(PipelinePhase::Persisting.is_busy());
    /// assert!(!PipelinePhase::Completed.is_busy());
    /// assert!(!PipelinePhase::Error.is_busy());
    /// ```
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            PipelinePhase::Translating | PipelinePhase::CheckingCompliance | PipelinePhase::Persisting
        )
    }

    /// A new run may only start from `Idle`, `Completed` or `Error`.
    pub fn can_start(&self) -> bool {
        !self.is_busy()
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelinePhase::Completed | PipelinePhase::Error)
    }

    /// A short label for status lines.
    pub fn label(&self) -> &'static str {
        match self {
            PipelinePhase::Idle => "Idle",
            PipelinePhase::Translating => "Translating",
            PipelinePhase::CheckingCompliance => "Checking compliance",
            PipelinePhase::Persisting => "Persisting",
            PipelinePhase::Completed => "Completed",
            PipelinePhase::Error => "Error",
        }
    }
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// Shared application state.
#[derive(Debug, Default)]
pub struct AppState {
    /// Current phase of the pipeline.
    pub phase: PipelinePhase,

    /// Human-readable description of what the pipeline is doing.
    pub current_task: String,

    /// Issues found by the current run.
    pub issues: Vec<Issue>,

    /// Error message when `phase == PipelinePhase::Error`.
    pub error_message: Option<String>,
}

// ---------------------------------------------------------------------------
// SharedState
// ---------------------------------------------------------------------------

/// Thread-safe handle to [`AppState`].
///
/// Cheap to clone (`Arc` clone).  Lock for a short critical section; do
/// **not** hold the lock across `.await` points.
pub type SharedState = Arc<Mutex<AppState>>;

/// Construct a new [`SharedState`] wrapping a default [`AppState`].
pub fn new_shared_state() -> SharedState {
    Arc::new(Mutex::new(AppState::default()))
}

/// Current phase.  A poisoned lock still holds the last committed phase.
pub fn current_phase(state: &SharedState) -> PipelinePhase {
    state.lock().unwrap_or_else(PoisonError::into_inner).phase
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_idle_and_terminal_phases_can_start() {
        assert!(PipelinePhase::Idle.can_start());
        assert!(PipelinePhase::Completed.can_start());
        assert!(PipelinePhase::Error.can_start());
        assert!(!PipelinePhase::Translating.can_start());
        assert!(!PipelinePhase::CheckingCompliance.can_start());
        assert!(!PipelinePhase::Persisting.can_start());
    }

    #[test]
    fn terminal_phases() {
        assert!(PipelinePhase::Completed.is_terminal());
        assert!(PipelinePhase::Error.is_terminal());
        assert!(!PipelinePhase::Idle.is_terminal());
    }

    #[test]
    fn labels() {
        assert_eq!(PipelinePhase::CheckingCompliance.label(), "Checking compliance");
        assert_eq!(PipelinePhase::Completed.label(), "Completed");
    }

    #[test]
    fn default_state_is_idle_and_empty() {
        let state = AppState::default();
        assert_eq!(state.phase, PipelinePhase::Idle);
        assert!(state.current_task.is_empty());
        assert!(state.issues.is_empty());
        assert!(state.error_message.is_none());
    }

    #[test]
    fn shared_state_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SharedState>();
    }

    #[test]
    fn shared_state_can_be_cloned_and_mutated() {
        let state = new_shared_state();
        let state2 = Arc::clone(&state);

        state.lock().unwrap().phase = PipelinePhase::Persisting;
        assert_eq!(current_phase(&state2), PipelinePhase::Persisting);
    }

    #[test]
    fn poisoned_lock_keeps_last_phase() {
        let state = new_shared_state();
        let writer = Arc::clone(&state);
        let _ = std::thread::spawn(move || {
            let mut st = writer.lock().unwrap();
            st.phase = PipelinePhase::Persisting;
            panic!("writer died holding the lock");
        })
        .join();

        assert!(state.is_poisoned());
        assert_eq!(current_phase(&state), PipelinePhase::Persisting);
        assert!(current_phase(&state).is_busy());
    }
}

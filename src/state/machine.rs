use super::error::{StateError, StateResult};
use super::{AppEvent, AppState, StateTransition};

#[derive(Debug, Default)]
pub struct StateMachine {
    state: AppState,
    transition_history: Vec<StateTransition>,
}

impl StateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> AppState {
        self.state
    }

    pub fn history(&self) -> &[StateTransition] {
        &self.transition_history
    }

    pub fn can_transition(&self, event: AppEvent) -> bool {
        self.next_state(event).is_some()
    }

    pub fn next_state(&self, event: AppEvent) -> Option<AppState> {
        use AppEvent::*;
        match (self.state, event) {
            (AppState::Idle | AppState::Previewing, CaptureRequested) => Some(AppState::Capturing),
            (AppState::Capturing, CaptureSucceeded) => Some(AppState::Previewing),
            (AppState::Capturing, CaptureFailed) => Some(AppState::Idle),
            (AppState::Previewing, CropRequested) => Some(AppState::Cropping),
            (AppState::Cropping, CropApplied | CropRejected | CropCancelled) => {
                Some(AppState::Previewing)
            }
            (AppState::Previewing, AnalyzeRequested) => Some(AppState::Analyzing),
            (AppState::Analyzing, AnalyzeFinished) => Some(AppState::Previewing),
            _ => None,
        }
    }

    pub fn transition(&mut self, event: AppEvent) -> StateResult<AppState> {
        tracing::debug!(from = ?self.state, event = ?event, "request state transition");
        let next = self.next_state(event).ok_or_else(|| {
            let from = self.state;
            tracing::warn!(from = ?from, event = ?event, "invalid state transition requested");
            StateError::InvalidStateTransition { from, event }
        })?;

        let record = StateTransition::new(self.state, event, next);
        self.state = next;
        self.transition_history.push(record);

        Ok(self.state)
    }
}

impl std::fmt::Display for StateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AppState::{:?}", self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine_in(events: &[AppEvent]) -> StateMachine {
        let mut machine = StateMachine::new();
        for event in events {
            machine
                .transition(*event)
                .expect("setup transition should be valid");
        }
        machine
    }

    #[test]
    fn can_transition_tracks_valid_and_invalid_events() {
        let mut machine = StateMachine::new();
        assert!(machine.can_transition(AppEvent::CaptureRequested));
        assert!(!machine.can_transition(AppEvent::CropRequested));
        assert!(!machine.can_transition(AppEvent::AnalyzeRequested));

        machine
            .transition(AppEvent::CaptureRequested)
            .expect("idle -> capturing should transition");

        assert!(machine.can_transition(AppEvent::CaptureSucceeded));
        assert!(machine.can_transition(AppEvent::CaptureFailed));
        assert!(!machine.can_transition(AppEvent::CaptureRequested));
    }

    #[test]
    fn full_cycle_returns_to_previewing() {
        let machine = machine_in(&[
            AppEvent::CaptureRequested,
            AppEvent::CaptureSucceeded,
            AppEvent::CropRequested,
            AppEvent::CropApplied,
            AppEvent::AnalyzeRequested,
            AppEvent::AnalyzeFinished,
            AppEvent::CaptureRequested,
            AppEvent::CaptureSucceeded,
        ]);
        assert_eq!(machine.state(), AppState::Previewing);
        assert_eq!(machine.history().len(), 8);
        assert_eq!(
            machine.history()[2],
            StateTransition::new(
                AppState::Previewing,
                AppEvent::CropRequested,
                AppState::Cropping
            )
        );
        assert_eq!(
            machine.history()[5],
            StateTransition::new(
                AppState::Analyzing,
                AppEvent::AnalyzeFinished,
                AppState::Previewing
            )
        );
    }

    #[test]
    fn capture_failure_returns_to_idle() {
        let machine = machine_in(&[AppEvent::CaptureRequested, AppEvent::CaptureFailed]);
        assert_eq!(machine.state(), AppState::Idle);
    }

    #[test]
    fn rejected_or_cancelled_crop_returns_to_previewing() {
        for event in [AppEvent::CropRejected, AppEvent::CropCancelled] {
            let machine = machine_in(&[
                AppEvent::CaptureRequested,
                AppEvent::CaptureSucceeded,
                AppEvent::CropRequested,
                event,
            ]);
            assert_eq!(machine.state(), AppState::Previewing);
        }
    }

    #[test]
    fn only_one_analysis_may_be_outstanding() {
        let mut machine = machine_in(&[
            AppEvent::CaptureRequested,
            AppEvent::CaptureSucceeded,
            AppEvent::AnalyzeRequested,
        ]);
        assert!(!machine.can_transition(AppEvent::AnalyzeRequested));
        assert!(!machine.can_transition(AppEvent::CaptureRequested));
        assert!(!machine.can_transition(AppEvent::CropRequested));
        assert!(machine.transition(AppEvent::AnalyzeRequested).is_err());
    }

    #[test]
    fn invalid_transition_returns_error_without_mutating_history() {
        let mut machine = StateMachine::new();

        let err = machine
            .transition(AppEvent::CropApplied)
            .expect_err("idle -> crop applied should fail");
        assert_eq!(
            err,
            StateError::InvalidStateTransition {
                from: AppState::Idle,
                event: AppEvent::CropApplied
            }
        );
        assert_eq!(machine.state(), AppState::Idle);
        assert!(machine.history().is_empty());
    }

    #[test]
    fn state_helpers_gate_controls() {
        assert!(AppState::Idle.can_capture());
        assert!(AppState::Previewing.can_capture());
        assert!(!AppState::Analyzing.can_capture());
        assert!(AppState::Previewing.has_ready_image());
        assert!(!AppState::Cropping.has_ready_image());
        assert!(!AppState::Idle.has_ready_image());
    }
}

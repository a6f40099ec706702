use super::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEvent {
    CaptureRequested,
    CaptureSucceeded,
    CaptureFailed,
    CropRequested,
    CropApplied,
    CropRejected,
    CropCancelled,
    AnalyzeRequested,
    AnalyzeFinished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateTransition {
    pub from: AppState,
    pub event: AppEvent,
    pub to: AppState,
}

impl StateTransition {
    pub const fn new(from: AppState, event: AppEvent, to: AppState) -> Self {
        Self { from, event, to }
    }
}

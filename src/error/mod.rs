use crate::session::SessionError;
use crate::state::StateError;
use thiserror::Error;

pub type AppResult<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("failed to initialise GTK: {message}")]
    GtkInit { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{AppEvent, AppState};

    #[test]
    fn state_errors_pass_through_unchanged() {
        let err: AppError = StateError::InvalidStateTransition {
            from: AppState::Idle,
            event: AppEvent::CropRequested,
        }
        .into();
        assert!(matches!(err, AppError::State(_)));
    }

    #[test]
    fn gtk_init_error_mentions_cause() {
        let err = AppError::GtkInit {
            message: "cannot open display".to_string(),
        };
        assert_eq!(err.to_string(), "failed to initialise GTK: cannot open display");
    }
}

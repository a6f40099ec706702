use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use gtk4::prelude::*;
use image::DynamicImage;

use crate::capture::{self, CaptureError};
use crate::describe::{
    AnthropicDescriber, ApiKey, ChatRole, DescribeError, DescribeSettings, Describer,
};
use crate::geometry::Point;
use crate::notification;
use crate::session::{AnalysisReply, AnalysisRequest, CaptureSession};
use crate::state::AppState;
use crate::storage::StorageService;
use crate::ui::StyleTokens;

use super::canvas::PreviewCanvasState;
use super::key_dialog::present_api_key_dialog;
use super::layout::{MainWindowUi, ANALYZE_BUTTON_LABEL, CAPTURE_BUTTON_LABEL};
use super::worker::{spawn_cancellable_worker_action, spawn_worker_action, CancelToken};

const COUNTDOWN_TICK: Duration = Duration::from_secs(1);
// Lets the countdown label repaint before the screen is grabbed.
const CAPTURE_SETTLE_DELAY: Duration = Duration::from_millis(100);

/// Runs user actions against the shared session and reflects the outcome
/// in the window.
#[derive(Clone)]
pub(super) struct ActionExecutor {
    ui: MainWindowUi,
    style_tokens: StyleTokens,
    session: Rc<RefCell<CaptureSession>>,
    canvas_state: Rc<RefCell<PreviewCanvasState>>,
    storage: Rc<StorageService>,
    describe_settings: Rc<DescribeSettings>,
    api_key: Rc<RefCell<Option<ApiKey>>>,
    analysis_token: Rc<RefCell<Option<CancelToken>>>,
    capture_delay_secs: u32,
}

pub(super) struct ActionExecutorDeps {
    pub(super) ui: MainWindowUi,
    pub(super) style_tokens: StyleTokens,
    pub(super) session: Rc<RefCell<CaptureSession>>,
    pub(super) canvas_state: Rc<RefCell<PreviewCanvasState>>,
    pub(super) storage: StorageService,
    pub(super) describe_settings: DescribeSettings,
    pub(super) api_key: Option<ApiKey>,
    pub(super) capture_delay_secs: u32,
}

impl ActionExecutor {
    pub(super) fn new(deps: ActionExecutorDeps) -> Self {
        Self {
            ui: deps.ui,
            style_tokens: deps.style_tokens,
            session: deps.session,
            canvas_state: deps.canvas_state,
            storage: Rc::new(deps.storage),
            describe_settings: Rc::new(deps.describe_settings),
            api_key: Rc::new(RefCell::new(deps.api_key)),
            analysis_token: Rc::new(RefCell::new(None)),
            capture_delay_secs: deps.capture_delay_secs,
        }
    }

    pub(super) fn has_api_key(&self) -> bool {
        self.api_key.borrow().is_some()
    }

    fn state(&self) -> AppState {
        self.session.borrow().state()
    }

    pub(super) fn render(&self) {
        self.ui.sync_with_state(self.state());
    }

    pub(super) fn take_screenshot(&self) {
        if let Err(err) = self.session.borrow_mut().begin_capture() {
            tracing::warn!(?err, "capture request ignored");
            self.ui.set_status(&err.to_string());
            return;
        }
        self.render();
        self.run_countdown(self.capture_delay_secs);
    }

    fn run_countdown(&self, remaining: u32) {
        if remaining == 0 {
            self.ui.capture_button.set_label("Capturing...");
            self.ui.set_status("Capturing...");
            let executor = self.clone();
            gtk4::glib::timeout_add_local_once(CAPTURE_SETTLE_DELAY, move || {
                executor.capture_now();
            });
            return;
        }

        let message = format!("Taking screenshot in {remaining}...");
        self.ui.capture_button.set_label(&message);
        self.ui.set_status(&message);
        let executor = self.clone();
        gtk4::glib::timeout_add_local_once(COUNTDOWN_TICK, move || {
            executor.run_countdown(remaining - 1);
        });
    }

    fn capture_now(&self) {
        let executor = self.clone();
        spawn_worker_action(capture::capture_full_screen, move |result| {
            executor.on_capture_finished(result);
        });
    }

    fn on_capture_finished(&self, result: Result<DynamicImage, CaptureError>) {
        self.ui.capture_button.set_label(CAPTURE_BUTTON_LABEL);
        let outcome = self.session.borrow_mut().finish_capture(result);
        match outcome {
            Ok(mapping) => {
                self.refresh_preview();
                self.ui.set_status(&format!(
                    "Captured {}x{}",
                    mapping.original.width, mapping.original.height
                ));
            }
            Err(err) => {
                self.ui.set_status(&format!("Screenshot failed: {err}"));
            }
        }
        self.render();
    }

    fn refresh_preview(&self) {
        let preview = {
            let session = self.session.borrow();
            session
                .preview_image()
                .map(|image| (image, session.mapping().map(|m| m.offset)))
        };
        match preview {
            Ok((image, offset)) => {
                self.canvas_state
                    .borrow_mut()
                    .show_image(&image, offset.unwrap_or_default());
            }
            Err(err) => {
                tracing::warn!(?err, "preview refresh skipped");
            }
        }
        self.ui.canvas.queue_draw();
    }

    pub(super) fn start_crop(&self) {
        match self.session.borrow_mut().begin_crop() {
            Ok(()) => self
                .ui
                .set_status("Drag on the preview to select the area to keep (Esc cancels)"),
            Err(err) => self.ui.set_status(&err.to_string()),
        }
        self.render();
    }

    pub(super) fn cancel_crop(&self) -> bool {
        if self.state() != AppState::Cropping {
            return false;
        }
        if let Err(err) = self.session.borrow_mut().cancel_crop() {
            tracing::warn!(?err, "crop cancel ignored");
            return false;
        }
        self.canvas_state.borrow_mut().clear_selection();
        self.ui.canvas.queue_draw();
        self.ui.set_status("Crop cancelled");
        self.render();
        true
    }

    pub(super) fn crop_drag_begin(&self, point: Point) {
        if self.state() != AppState::Cropping {
            return;
        }
        self.canvas_state.borrow_mut().begin_selection(point);
        self.ui.canvas.queue_draw();
    }

    pub(super) fn crop_drag_update(&self, point: Point) {
        if self.state() != AppState::Cropping {
            return;
        }
        self.canvas_state.borrow_mut().update_selection(point);
        self.ui.canvas.queue_draw();
    }

    pub(super) fn crop_drag_end(&self, point: Point) {
        if self.state() != AppState::Cropping {
            return;
        }
        let selection = {
            let mut canvas_state = self.canvas_state.borrow_mut();
            canvas_state.update_selection(point);
            canvas_state.take_selection()
        };
        let Some(canvas_rect) = selection else {
            return;
        };

        let outcome = self.session.borrow_mut().finish_crop(canvas_rect);
        match outcome {
            Ok(mapping) => {
                self.refresh_preview();
                self.ui.set_status(&format!(
                    "Cropped to {}x{}",
                    mapping.original.width, mapping.original.height
                ));
            }
            Err(err) => {
                self.ui.canvas.queue_draw();
                self.ui.set_status(&format!("Crop rejected: {err}"));
            }
        }
        self.render();
    }

    pub(super) fn save(&self) {
        let outcome = self.session.borrow().save(&self.storage);
        match outcome {
            Ok(path) => {
                let message = format!("Screenshot saved to {}", path.display());
                self.ui.set_status(&message);
                notification::send(message);
            }
            Err(err) => {
                tracing::error!(?err, "screenshot save failed");
                self.ui.set_status(&err.to_string());
            }
        }
    }

    pub(super) fn analyze(&self) {
        let prompt_text = self.ui.prompt_entry.text();
        let api_key = self.api_key.borrow().clone();
        let outcome = self
            .session
            .borrow_mut()
            .begin_analysis(api_key.as_ref(), Some(prompt_text.as_str()));
        let request = match outcome {
            Ok(request) => request,
            Err(err) => {
                self.ui.append_chat_line("Error", &err.to_string());
                return;
            }
        };

        self.ui.prompt_entry.set_text("");
        self.ui
            .append_chat_line(ChatRole::User.label(), &request.prompt);
        self.ui.analyze_button.set_label("Analyzing...");
        self.ui.set_status("Waiting for description...");
        self.render();

        let token = CancelToken::new();
        *self.analysis_token.borrow_mut() = Some(token.clone());
        let prompt = request.prompt.clone();
        let settings = DescribeSettings::clone(&self.describe_settings);
        let executor = self.clone();
        spawn_cancellable_worker_action(
            token,
            move |token| run_analysis(settings, request, token),
            move |result| executor.on_analysis_finished(&prompt, result),
        );
    }

    fn on_analysis_finished(&self, prompt: &str, result: Result<String, DescribeError>) {
        self.analysis_token.borrow_mut().take();
        self.ui.analyze_button.set_label(ANALYZE_BUTTON_LABEL);
        let outcome = self.session.borrow_mut().finish_analysis(prompt, result);
        match outcome {
            Ok(reply @ AnalysisReply::Reply(_)) => {
                self.ui
                    .append_chat_line(ChatRole::Assistant.label(), &reply.display_text());
                self.ui.set_status("Description received");
            }
            Ok(AnalysisReply::Failed(message)) => {
                self.ui.append_chat_line("Error", &message);
                self.ui.set_status("Description failed");
            }
            Err(err) => {
                tracing::warn!(?err, "late analysis result ignored");
            }
        }
        self.render();
    }

    /// Drops any outstanding analysis result. Called when the window closes.
    pub(super) fn cancel_pending_work(&self) {
        if let Some(token) = self.analysis_token.borrow_mut().take() {
            tracing::info!("cancelling in-flight analysis");
            token.cancel();
        }
    }

    pub(super) fn open_api_key_dialog(&self) {
        let executor = self.clone();
        present_api_key_dialog(
            &self.ui.window,
            self.style_tokens,
            Rc::new(move |key: ApiKey| {
                *executor.api_key.borrow_mut() = Some(key);
                tracing::info!("api key configured from dialog");
                executor.ui.set_status("API key configured");
            }),
        );
    }
}

fn run_analysis(
    settings: DescribeSettings,
    request: AnalysisRequest,
    token: &CancelToken,
) -> Result<String, DescribeError> {
    if token.is_cancelled() {
        return Err(DescribeError::Cancelled);
    }
    let describer = AnthropicDescriber::new(settings, request.api_key)?;
    describer.describe(&request.image, &request.prompt)
}

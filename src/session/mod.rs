//! The capture/crop/save workflow around the currently held image.

pub mod crop;

use std::path::PathBuf;

use image::imageops::FilterType;
use image::DynamicImage;
use thiserror::Error;

pub use crop::{crop_image, CropError};

use crate::capture::CaptureError;
use crate::describe::{resolve_prompt, ApiKey, ChatHistory, DescribeError};
use crate::geometry::{GeometryError, ImageSize, PreviewMapping, Rect};
use crate::state::{AppEvent, AppState, StateError, StateMachine};
use crate::storage::{StorageError, StorageService};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no image captured yet")]
    NoImage,
    #[error("current image is not ready while {state:?}")]
    NotReady { state: AppState },
    #[error(transparent)]
    State(#[from] StateError),
    #[error("capture failed: {0}")]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    #[error(transparent)]
    Crop(#[from] CropError),
    #[error("save failed: {0}")]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Describe(#[from] DescribeError),
}

pub type SessionResult<T> = std::result::Result<T, SessionError>;

/// Owned input for a background description call.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub image: DynamicImage,
    pub prompt: String,
    pub api_key: ApiKey,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisReply {
    Reply(String),
    Failed(String),
}

impl AnalysisReply {
    pub fn display_text(&self) -> String {
        match self {
            Self::Reply(text) => text.clone(),
            Self::Failed(message) => format!("Error: {message}"),
        }
    }
}

/// Holds the current image and drives the state machine.
///
/// Crops always apply to the current image, so successive crops compound.
#[derive(Debug)]
pub struct CaptureSession {
    machine: StateMachine,
    preview_bounds: ImageSize,
    current: Option<DynamicImage>,
    mapping: Option<PreviewMapping>,
    chat: ChatHistory,
}

impl CaptureSession {
    pub fn new(preview_bounds: ImageSize) -> Self {
        Self {
            machine: StateMachine::new(),
            preview_bounds,
            current: None,
            mapping: None,
            chat: ChatHistory::default(),
        }
    }

    pub fn state(&self) -> AppState {
        self.machine.state()
    }

    pub fn machine(&self) -> &StateMachine {
        &self.machine
    }

    pub fn preview_bounds(&self) -> ImageSize {
        self.preview_bounds
    }

    pub fn current_image(&self) -> Option<&DynamicImage> {
        self.current.as_ref()
    }

    pub fn mapping(&self) -> Option<&PreviewMapping> {
        self.mapping.as_ref()
    }

    pub fn chat(&self) -> &ChatHistory {
        &self.chat
    }

    pub fn begin_capture(&mut self) -> SessionResult<()> {
        self.machine.transition(AppEvent::CaptureRequested)?;
        Ok(())
    }

    pub fn finish_capture(
        &mut self,
        result: Result<DynamicImage, CaptureError>,
    ) -> SessionResult<PreviewMapping> {
        let image = match result {
            Ok(image) => image,
            Err(err) => {
                tracing::error!(?err, "screenshot capture failed");
                self.machine.transition(AppEvent::CaptureFailed)?;
                return Err(err.into());
            }
        };

        match self.replace_current(image) {
            Ok(mapping) => {
                self.machine.transition(AppEvent::CaptureSucceeded)?;
                Ok(mapping)
            }
            Err(err) => {
                self.machine.transition(AppEvent::CaptureFailed)?;
                Err(err)
            }
        }
    }

    pub fn begin_crop(&mut self) -> SessionResult<()> {
        self.require_image()?;
        self.machine.transition(AppEvent::CropRequested)?;
        Ok(())
    }

    pub fn cancel_crop(&mut self) -> SessionResult<()> {
        self.machine.transition(AppEvent::CropCancelled)?;
        Ok(())
    }

    /// Applies a drag drawn in canvas coordinates to the current image.
    ///
    /// On failure the current image is kept and the session returns to
    /// previewing.
    pub fn finish_crop(&mut self, canvas_rect: Rect) -> SessionResult<PreviewMapping> {
        if self.state() != AppState::Cropping {
            return Err(StateError::InvalidStateTransition {
                from: self.state(),
                event: AppEvent::CropApplied,
            }
            .into());
        }

        match self.crop_current(canvas_rect) {
            Ok(mapping) => {
                self.machine.transition(AppEvent::CropApplied)?;
                Ok(mapping)
            }
            Err(err) => {
                tracing::warn!(?err, ?canvas_rect, "crop rejected");
                self.machine.transition(AppEvent::CropRejected)?;
                Err(err)
            }
        }
    }

    pub fn preview_image(&self) -> SessionResult<DynamicImage> {
        let image = self.require_image()?;
        let mapping = self.mapping.as_ref().ok_or(SessionError::NoImage)?;
        Ok(image.resize_exact(
            mapping.preview.width,
            mapping.preview.height,
            FilterType::Triangle,
        ))
    }

    pub fn save(&self, storage: &StorageService) -> SessionResult<PathBuf> {
        if !self.state().has_ready_image() {
            return Err(SessionError::NotReady {
                state: self.state(),
            });
        }
        let image = self.require_image()?;
        Ok(storage.save_image(image)?)
    }

    /// Starts an analysis. Without a credential nothing changes and no work
    /// should be scheduled.
    pub fn begin_analysis(
        &mut self,
        credential: Option<&ApiKey>,
        prompt: Option<&str>,
    ) -> SessionResult<AnalysisRequest> {
        let Some(api_key) = credential.cloned() else {
            tracing::error!("analysis requested without an API key");
            return Err(DescribeError::MissingCredential.into());
        };
        let image = self.require_image()?.clone();
        self.machine.transition(AppEvent::AnalyzeRequested)?;

        Ok(AnalysisRequest {
            image,
            prompt: resolve_prompt(prompt).to_string(),
            api_key,
        })
    }

    /// Failures are not fatal: they come back as [`AnalysisReply::Failed`]
    /// for inline display.
    pub fn finish_analysis(
        &mut self,
        prompt: &str,
        result: Result<String, DescribeError>,
    ) -> SessionResult<AnalysisReply> {
        self.machine.transition(AppEvent::AnalyzeFinished)?;
        match result {
            Ok(reply) => {
                self.chat.record_exchange(prompt, reply.clone());
                Ok(AnalysisReply::Reply(reply))
            }
            Err(err) => {
                tracing::error!(?err, "image analysis failed");
                Ok(AnalysisReply::Failed(err.to_string()))
            }
        }
    }

    fn require_image(&self) -> SessionResult<&DynamicImage> {
        self.current.as_ref().ok_or(SessionError::NoImage)
    }

    fn crop_current(&mut self, canvas_rect: Rect) -> SessionResult<PreviewMapping> {
        let mapping = self.mapping.ok_or(SessionError::NoImage)?;
        let original_rect = mapping.map_to_original(canvas_rect)?;
        tracing::debug!(?canvas_rect, ?original_rect, "mapped crop rectangle");

        let cropped = crop_image(self.require_image()?, original_rect)?;
        self.replace_current(cropped)
    }

    fn replace_current(&mut self, image: DynamicImage) -> SessionResult<PreviewMapping> {
        let mapping = PreviewMapping::new(
            ImageSize::new(image.width(), image.height()),
            self.preview_bounds,
        )?;
        tracing::debug!(
            preview_width = mapping.preview.width,
            preview_height = mapping.preview.height,
            "preview size calculated"
        );
        self.current = Some(image);
        self.mapping = Some(mapping);
        Ok(mapping)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::describe::{Describer, DescribeResult, DEFAULT_PROMPT};
    use image::{Rgba, RgbaImage};

    struct SizeReportingDescriber;

    impl Describer for SizeReportingDescriber {
        fn describe(&self, image: &DynamicImage, prompt: &str) -> DescribeResult<String> {
            Ok(format!("{prompt} -> {}x{}", image.width(), image.height()))
        }
    }

    const BOUNDS: ImageSize = ImageSize::new(500, 400);

    fn screen(width: u32, height: u32) -> DynamicImage {
        let mut image = RgbaImage::new(width, height);
        for (x, y, pixel) in image.enumerate_pixels_mut() {
            *pixel = Rgba([(x % 256) as u8, (y % 256) as u8, 0, 255]);
        }
        DynamicImage::ImageRgba8(image)
    }

    fn previewing_session(width: u32, height: u32) -> CaptureSession {
        let mut session = CaptureSession::new(BOUNDS);
        session.begin_capture().unwrap();
        session.finish_capture(Ok(screen(width, height))).unwrap();
        session
    }

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "snapsight-session-{name}-{}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn capture_produces_preview_mapping() {
        let session = previewing_session(1920, 1080);
        assert_eq!(session.state(), AppState::Previewing);
        let mapping = session.mapping().unwrap();
        assert_eq!(mapping.preview, ImageSize::new(500, 281));

        let preview = session.preview_image().unwrap();
        assert_eq!((preview.width(), preview.height()), (500, 281));
    }

    #[test]
    fn capture_failure_returns_to_idle_without_image() {
        let mut session = CaptureSession::new(BOUNDS);
        session.begin_capture().unwrap();
        let err = session
            .finish_capture(Err(CaptureError::ImageReadFailed {
                message: "no display".to_string(),
            }))
            .unwrap_err();

        assert!(matches!(err, SessionError::Capture(_)));
        assert_eq!(session.state(), AppState::Idle);
        assert!(session.current_image().is_none());
    }

    #[test]
    fn crop_maps_canvas_rect_onto_original_pixels() {
        let mut session = previewing_session(1920, 1080);
        let offset = session.mapping().unwrap().offset;
        session.begin_crop().unwrap();

        let mapping = session
            .finish_crop(Rect::new(50, 50 + offset.y, 450, 250 + offset.y))
            .unwrap();

        let current = session.current_image().unwrap();
        // (50,50)-(450,250) in preview space at scale 3.84 x 1080/281
        assert_eq!((current.width(), current.height()), (1536, 768));
        assert_eq!(current.to_rgba8().get_pixel(0, 0), &Rgba([192, 192, 0, 255]));
        assert_eq!(mapping.original, ImageSize::new(1536, 768));
        assert_eq!(session.state(), AppState::Previewing);
    }

    #[test]
    fn repeated_crops_compound_on_current_image() {
        let mut session = previewing_session(1000, 800);
        // 1000x800 fills the 500x400 box exactly at scale 2
        session.begin_crop().unwrap();
        session.finish_crop(Rect::new(0, 0, 250, 200)).unwrap();
        assert_eq!(
            session
                .current_image()
                .map(|image| (image.width(), image.height())),
            Some((500, 400))
        );

        // now scale 1: the same drag halves the image again
        session.begin_crop().unwrap();
        session.finish_crop(Rect::new(0, 0, 250, 200)).unwrap();
        assert_eq!(
            session
                .current_image()
                .map(|image| (image.width(), image.height())),
            Some((250, 200))
        );
    }

    #[test]
    fn zero_area_drag_is_rejected_and_keeps_current_image() {
        let mut session = previewing_session(1920, 1080);
        session.begin_crop().unwrap();

        let err = session.finish_crop(Rect::new(120, 140, 120, 140)).unwrap_err();

        assert!(matches!(
            err,
            SessionError::Crop(CropError::EmptyRegion { .. })
        ));
        assert_eq!(session.state(), AppState::Previewing);
        assert_eq!(
            session
                .current_image()
                .map(|image| (image.width(), image.height())),
            Some((1920, 1080))
        );
        assert!(session.begin_crop().is_ok());
    }

    #[test]
    fn finish_crop_outside_crop_mode_is_rejected() {
        let mut session = previewing_session(640, 480);
        assert!(matches!(
            session.finish_crop(Rect::new(0, 0, 10, 10)),
            Err(SessionError::State(_))
        ));
        assert_eq!(session.state(), AppState::Previewing);
    }

    #[test]
    fn cancel_crop_returns_to_previewing() {
        let mut session = previewing_session(640, 480);
        session.begin_crop().unwrap();
        session.cancel_crop().unwrap();
        assert_eq!(session.state(), AppState::Previewing);
    }

    #[test]
    fn crop_requires_a_captured_image() {
        let mut session = CaptureSession::new(BOUNDS);
        assert!(matches!(session.begin_crop(), Err(SessionError::NoImage)));
        assert_eq!(session.state(), AppState::Idle);
    }

    #[test]
    fn save_writes_current_image() {
        let dir = scratch_dir("save");
        let storage = StorageService::new(&dir);
        let mut session = previewing_session(64, 48);
        session.begin_crop().unwrap();
        session.finish_crop(Rect::new(0, 0, 250, 200)).unwrap();

        let path = session.save(&storage).unwrap();
        let saved = image::open(&path).unwrap();
        assert_eq!((saved.width(), saved.height()), (32, 24));

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn save_is_refused_while_cropping() {
        let dir = scratch_dir("save-cropping");
        let storage = StorageService::new(&dir);
        let mut session = previewing_session(64, 48);
        session.begin_crop().unwrap();

        assert!(matches!(
            session.save(&storage),
            Err(SessionError::NotReady {
                state: AppState::Cropping
            })
        ));
        assert!(!dir.exists());
    }

    #[test]
    fn analysis_without_credential_fails_and_stays_previewing() {
        let mut session = previewing_session(64, 48);
        let err = session.begin_analysis(None, None).unwrap_err();

        assert!(matches!(
            err,
            SessionError::Describe(DescribeError::MissingCredential)
        ));
        assert_eq!(err.to_string(), "Please configure API key first");
        assert_eq!(session.state(), AppState::Previewing);
    }

    #[test]
    fn analysis_round_trip_records_chat() {
        let key = ApiKey::new("sk-test").unwrap();
        let mut session = previewing_session(64, 48);

        let request = session.begin_analysis(Some(&key), None).unwrap();
        assert_eq!(request.prompt, DEFAULT_PROMPT);
        assert_eq!((request.image.width(), request.image.height()), (64, 48));
        assert_eq!(session.state(), AppState::Analyzing);
        assert!(session.begin_analysis(Some(&key), None).is_err());

        let shown = session
            .finish_analysis(&request.prompt, Ok("A gradient.".to_string()))
            .unwrap();
        assert_eq!(shown, AnalysisReply::Reply("A gradient.".to_string()));
        assert_eq!(shown.display_text(), "A gradient.");
        assert_eq!(session.state(), AppState::Previewing);
        assert_eq!(session.chat().messages().len(), 2);
    }

    #[test]
    fn failed_analysis_is_shown_inline_and_not_recorded() {
        let key = ApiKey::new("sk-test").unwrap();
        let mut session = previewing_session(64, 48);
        let request = session
            .begin_analysis(Some(&key), Some("what is this?"))
            .unwrap();
        assert_eq!(request.prompt, "what is this?");

        let shown = session
            .finish_analysis(
                &request.prompt,
                Err(DescribeError::Api {
                    status: 401,
                    body: "invalid x-api-key".to_string(),
                }),
            )
            .unwrap();

        assert_eq!(
            shown.display_text(),
            "Error: API returned 401: invalid x-api-key"
        );
        assert!(session.chat().is_empty());
        assert_eq!(session.state(), AppState::Previewing);
    }

    #[test]
    fn analysis_sees_the_cropped_image() {
        let key = ApiKey::new("sk-test").unwrap();
        let mut session = previewing_session(1920, 1080);
        let offset = session.mapping().unwrap().offset;
        session.begin_crop().unwrap();
        session
            .finish_crop(Rect::new(100, 50 + offset.y, 400, 250 + offset.y))
            .unwrap();

        let request = session.begin_analysis(Some(&key), Some("what?")).unwrap();
        let result = SizeReportingDescriber.describe(&request.image, &request.prompt);
        let shown = session.finish_analysis(&request.prompt, result).unwrap();

        assert_eq!(shown, AnalysisReply::Reply("what? -> 1152x768".to_string()));
        assert_eq!(session.chat().messages()[0].content, "what?");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppState {
    #[default]
    Idle,
    Capturing,
    Previewing,
    Cropping,
    Analyzing,
}

impl AppState {
    pub const fn can_capture(self) -> bool {
        matches!(self, Self::Idle | Self::Previewing)
    }

    /// Crop, save and analyze all operate on a displayed image.
    pub const fn has_ready_image(self) -> bool {
        matches!(self, Self::Previewing)
    }
}

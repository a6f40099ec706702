/// Preview sizing and preview-to-original coordinate mapping.
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GeometryError {
    #[error("invalid image dimensions {width}x{height}")]
    InvalidImage { width: u32, height: u32 },
    #[error("invalid preview bounds {width}x{height}")]
    InvalidBounds { width: u32, height: u32 },
}

pub type GeometryResult<T> = std::result::Result<T, GeometryError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Two corners in some coordinate space. Not necessarily normalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl Rect {
    pub const fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub const fn from_points(start: Point, end: Point) -> Self {
        Self::new(start.x, start.y, end.x, end.y)
    }

    /// Orders each axis independently so that `x1 <= x2` and `y1 <= y2`.
    pub fn normalized(self) -> Self {
        Self {
            x1: self.x1.min(self.x2),
            y1: self.y1.min(self.y2),
            x2: self.x1.max(self.x2),
            y2: self.y1.max(self.y2),
        }
    }

    pub fn translated(self, dx: i32, dy: i32) -> Self {
        Self {
            x1: self.x1.saturating_add(dx),
            y1: self.y1.saturating_add(dy),
            x2: self.x2.saturating_add(dx),
            y2: self.y2.saturating_add(dy),
        }
    }

    pub fn width(self) -> u32 {
        self.x1.abs_diff(self.x2)
    }

    pub fn height(self) -> u32 {
        self.y1.abs_diff(self.y2)
    }

    pub fn is_empty(self) -> bool {
        self.width() == 0 || self.height() == 0
    }
}

/// Scaled preview of one image placed centered inside a fixed display box.
///
/// Recomputed whenever a new current image is shown; it is never updated in
/// place.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreviewMapping {
    pub bounds: ImageSize,
    pub original: ImageSize,
    pub preview: ImageSize,
    pub offset: Point,
    pub scale_x: f64,
    pub scale_y: f64,
}

impl PreviewMapping {
    pub fn new(original: ImageSize, bounds: ImageSize) -> GeometryResult<Self> {
        let preview = compute_preview_size(original, bounds)?;
        let offset = Point::new(
            centered_offset(bounds.width, preview.width),
            centered_offset(bounds.height, preview.height),
        );

        Ok(Self {
            bounds,
            original,
            preview,
            offset,
            scale_x: f64::from(original.width) / f64::from(preview.width),
            scale_y: f64::from(original.height) / f64::from(preview.height),
        })
    }

    /// Converts a rectangle in canvas coordinates (preview plus centering
    /// offset) into original-image coordinates.
    pub fn map_to_original(&self, canvas_rect: Rect) -> GeometryResult<Rect> {
        map_preview_rect_to_original(canvas_rect, self.preview, self.offset, self.original)
    }

    /// The canvas rectangle covering the whole drawn preview.
    pub fn full_preview_rect(&self) -> Rect {
        Rect::new(
            self.offset.x,
            self.offset.y,
            self.offset.x + preview_axis(self.preview.width),
            self.offset.y + preview_axis(self.preview.height),
        )
    }
}

/// Fits `original` inside `bounds` while keeping its aspect ratio.
///
/// Width is tried first; if the resulting height overflows, height is pinned
/// to the bound instead. Both results are at least one pixel.
pub fn compute_preview_size(original: ImageSize, bounds: ImageSize) -> GeometryResult<ImageSize> {
    if original.is_empty() {
        return Err(GeometryError::InvalidImage {
            width: original.width,
            height: original.height,
        });
    }
    if bounds.is_empty() {
        return Err(GeometryError::InvalidBounds {
            width: bounds.width,
            height: bounds.height,
        });
    }

    let aspect = f64::from(original.width) / f64::from(original.height);
    let width = bounds.width;
    let height = (f64::from(width) / aspect).round();

    if height > f64::from(bounds.height) {
        let height = bounds.height;
        let width = round_to_pixels(f64::from(height) * aspect, bounds.width);
        return Ok(ImageSize::new(width, height));
    }

    Ok(ImageSize::new(
        width,
        round_to_pixels(height, bounds.height),
    ))
}

/// Maps a rectangle drawn on the centered preview back to original pixels.
///
/// The offset is removed, the rectangle normalized and clamped to the drawn
/// preview, then each axis is scaled by `original / preview` and truncated.
pub fn map_preview_rect_to_original(
    canvas_rect: Rect,
    preview: ImageSize,
    offset: Point,
    original: ImageSize,
) -> GeometryResult<Rect> {
    if preview.is_empty() {
        return Err(GeometryError::InvalidBounds {
            width: preview.width,
            height: preview.height,
        });
    }
    if original.is_empty() {
        return Err(GeometryError::InvalidImage {
            width: original.width,
            height: original.height,
        });
    }

    let local = canvas_rect.translated(-offset.x, -offset.y).normalized();
    let max_x = preview_axis(preview.width);
    let max_y = preview_axis(preview.height);

    let x1 = scale_axis(local.x1.clamp(0, max_x), preview.width, original.width);
    let y1 = scale_axis(local.y1.clamp(0, max_y), preview.height, original.height);
    let x2 = scale_axis(local.x2.clamp(0, max_x), preview.width, original.width);
    let y2 = scale_axis(local.y2.clamp(0, max_y), preview.height, original.height);

    Ok(Rect::new(x1, y1, x2, y2))
}

fn round_to_pixels(value: f64, max: u32) -> u32 {
    let rounded = value.round();
    if rounded < 1.0 {
        1
    } else if rounded >= f64::from(max) {
        max
    } else {
        rounded as u32
    }
}

fn centered_offset(outer: u32, inner: u32) -> i32 {
    preview_axis(outer.saturating_sub(inner) / 2)
}

fn preview_axis(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

// Integer math keeps the full-preview edge landing exactly on the original edge.
fn scale_axis(value: i32, preview: u32, original: u32) -> i32 {
    let value = u64::try_from(value).unwrap_or(0);
    let scaled = value * u64::from(original) / u64::from(preview);
    i32::try_from(scaled.min(u64::from(original))).unwrap_or(i32::MAX)
}

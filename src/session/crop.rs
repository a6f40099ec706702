//! Cropping of the held image to an original-space rectangle.

use image::DynamicImage;
use thiserror::Error;

use crate::geometry::Rect;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CropError {
    #[error("crop rectangle has zero width or height: {rect:?}")]
    EmptyRegion { rect: Rect },

    #[error(
        "crop rectangle ({},{})-({},{}) exceeds image bounds ({}x{})",
        rect.x1, rect.y1, rect.x2, rect.y2, image_size.0, image_size.1
    )]
    InvalidRegion {
        rect: Rect,
        image_size: (u32, u32),
    },
}

/// Returns a new image holding `rect` of `image`. The input is left untouched.
///
/// Zero-area rectangles are rejected rather than widened to a single pixel.
pub fn crop_image(image: &DynamicImage, rect: Rect) -> Result<DynamicImage, CropError> {
    let rect = rect.normalized();
    let image_size = (image.width(), image.height());

    if rect.x1 < 0 || rect.y1 < 0 {
        return Err(CropError::InvalidRegion { rect, image_size });
    }
    // Both corners are non-negative past this point.
    let (x, y) = (rect.x1 as u32, rect.y1 as u32);
    let (x2, y2) = (rect.x2 as u32, rect.y2 as u32);
    if x2 > image_size.0 || y2 > image_size.1 {
        return Err(CropError::InvalidRegion { rect, image_size });
    }
    if rect.is_empty() {
        return Err(CropError::EmptyRegion { rect });
    }

    let cropped = image.crop_imm(x, y, rect.width(), rect.height());
    tracing::debug!(
        x,
        y,
        width = cropped.width(),
        height = cropped.height(),
        "cropped current image"
    );
    Ok(cropped)
}

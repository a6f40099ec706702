use std::cell::RefCell;
use std::rc::Rc;

use gtk4::gdk::prelude::GdkCairoContextExt;
use gtk4::gdk_pixbuf::{Colorspace, Pixbuf};
use gtk4::prelude::*;
use gtk4::DrawingArea;
use image::DynamicImage;

use crate::geometry::{Point, Rect};

/// What the preview area paints: the scaled image at its centering offset
/// and the in-progress crop selection.
#[derive(Debug, Default)]
pub(super) struct PreviewCanvasState {
    pixbuf: Option<Pixbuf>,
    offset: Point,
    selection: Option<(Point, Point)>,
}

impl PreviewCanvasState {
    pub(super) fn show_image(&mut self, preview: &DynamicImage, offset: Point) {
        self.pixbuf = Some(dynamic_image_to_pixbuf(preview));
        self.offset = offset;
        self.selection = None;
    }

    pub(super) fn begin_selection(&mut self, point: Point) {
        self.selection = Some((point, point));
    }

    pub(super) fn update_selection(&mut self, point: Point) {
        if let Some((start, _)) = self.selection {
            self.selection = Some((start, point));
        }
    }

    pub(super) fn take_selection(&mut self) -> Option<Rect> {
        self.selection
            .take()
            .map(|(start, end)| Rect::from_points(start, end))
    }

    pub(super) fn clear_selection(&mut self) {
        self.selection = None;
    }

    fn selection_rect(&self) -> Option<Rect> {
        self.selection
            .map(|(start, end)| Rect::from_points(start, end).normalized())
    }
}

/// Canvas coordinates arrive as doubles; crop math works on whole pixels.
pub(super) fn pointer_point(x: f64, y: f64) -> Point {
    Point::new(x.round() as i32, y.round() as i32)
}

fn dynamic_image_to_pixbuf(image: &DynamicImage) -> Pixbuf {
    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    let width = i32::try_from(width).unwrap_or(i32::MAX);
    let height = i32::try_from(height).unwrap_or(i32::MAX);
    let bytes = gtk4::glib::Bytes::from_owned(rgba.into_raw());
    Pixbuf::from_bytes(
        &bytes,
        Colorspace::Rgb,
        true,
        8,
        width,
        height,
        width.saturating_mul(4),
    )
}

pub(super) fn connect_preview_draw(
    canvas: &DrawingArea,
    state: Rc<RefCell<PreviewCanvasState>>,
    outline_width: f64,
) {
    canvas.set_draw_func(move |_, context, width, height| {
        if width <= 0 || height <= 0 {
            return;
        }
        context.set_source_rgb(1.0, 1.0, 1.0);
        context.paint().ok();

        let state = state.borrow();
        if let Some(pixbuf) = state.pixbuf.as_ref() {
            context.set_source_pixbuf(
                pixbuf,
                f64::from(state.offset.x),
                f64::from(state.offset.y),
            );
            context.paint().ok();
        }

        if let Some(rect) = state.selection_rect() {
            context.set_source_rgb(1.0, 0.0, 0.0);
            context.set_line_width(outline_width);
            context.rectangle(
                f64::from(rect.x1),
                f64::from(rect.y1),
                f64::from(rect.width()),
                f64::from(rect.height()),
            );
            context.stroke().ok();
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pointer_point_rounds_to_nearest_pixel() {
        assert_eq!(pointer_point(10.4, 19.6), Point::new(10, 20));
        assert_eq!(pointer_point(-0.6, 0.0), Point::new(-1, 0));
    }

    #[test]
    fn selection_tracks_start_and_latest_point() {
        let mut state = PreviewCanvasState::default();
        state.update_selection(Point::new(5, 5));
        assert!(state.take_selection().is_none());

        state.begin_selection(Point::new(300, 200));
        state.update_selection(Point::new(100, 50));
        assert_eq!(
            state.selection_rect(),
            Some(Rect::new(100, 50, 300, 200))
        );
        assert_eq!(state.take_selection(), Some(Rect::new(300, 200, 100, 50)));
        assert!(state.take_selection().is_none());
    }
}

use gtk4::prelude::*;
use gtk4::{
    Align, Application, ApplicationWindow, Box as GtkBox, Button, DrawingArea, Entry, Label,
    Orientation, ScrolledWindow, TextView, WrapMode,
};

use crate::geometry::ImageSize;
use crate::state::AppState;
use crate::ui::StyleTokens;

pub(super) const CAPTURE_BUTTON_LABEL: &str = "Take Screenshot";
pub(super) const ANALYZE_BUTTON_LABEL: &str = "Analyze";

fn pixel_dimension(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

/// Widgets the action layer reads from or updates.
#[derive(Clone)]
pub(super) struct MainWindowUi {
    pub(super) window: ApplicationWindow,
    pub(super) canvas: DrawingArea,
    pub(super) capture_button: Button,
    pub(super) crop_button: Button,
    pub(super) save_button: Button,
    pub(super) analyze_button: Button,
    pub(super) api_key_button: Button,
    pub(super) prompt_entry: Entry,
    pub(super) chat_view: TextView,
    pub(super) status_label: Label,
}

impl MainWindowUi {
    pub(super) fn sync_with_state(&self, state: AppState) {
        let image_ready = state.has_ready_image();
        self.capture_button.set_sensitive(state.can_capture());
        self.crop_button.set_sensitive(image_ready);
        self.save_button.set_sensitive(image_ready);
        self.analyze_button.set_sensitive(image_ready);
        self.prompt_entry.set_sensitive(image_ready);
        self.api_key_button
            .set_sensitive(!matches!(state, AppState::Analyzing));
    }

    pub(super) fn set_status(&self, text: &str) {
        self.status_label.set_text(text);
    }

    pub(super) fn append_chat_line(&self, speaker: &str, text: &str) {
        let buffer = self.chat_view.buffer();
        let mut end = buffer.end_iter();
        buffer.insert(&mut end, &format!("{speaker}: {text}\n\n"));
        let mut end = buffer.end_iter();
        self.chat_view
            .scroll_to_iter(&mut end, 0.0, false, 0.0, 1.0);
    }
}

pub(super) fn build_main_window(
    app: &Application,
    style_tokens: StyleTokens,
    preview_bounds: ImageSize,
) -> MainWindowUi {
    let window = ApplicationWindow::new(app);
    window.set_title(Some("Snapsight"));
    window.set_default_size(
        style_tokens.window_default_width,
        style_tokens.window_default_height,
    );

    let root = GtkBox::new(Orientation::Vertical, style_tokens.spacing_8);
    root.set_margin_top(style_tokens.spacing_12);
    root.set_margin_bottom(style_tokens.spacing_12);
    root.set_margin_start(style_tokens.spacing_12);
    root.set_margin_end(style_tokens.spacing_12);

    let panels = GtkBox::new(Orientation::Horizontal, style_tokens.spacing_20);
    panels.set_vexpand(true);

    let left = GtkBox::new(Orientation::Vertical, style_tokens.spacing_8);
    left.set_hexpand(true);
    let capture_button = Button::with_label(CAPTURE_BUTTON_LABEL);
    capture_button.set_halign(Align::Start);

    let canvas = DrawingArea::new();
    canvas.set_content_width(pixel_dimension(preview_bounds.width));
    canvas.set_content_height(pixel_dimension(preview_bounds.height));
    canvas.set_hexpand(false);
    canvas.set_vexpand(false);
    canvas.set_halign(Align::Start);
    canvas.set_valign(Align::Start);

    let edit_row = GtkBox::new(Orientation::Horizontal, style_tokens.spacing_8);
    let crop_button = Button::with_label("Crop Screenshot");
    let save_button = Button::with_label("Save Screenshot");
    edit_row.append(&crop_button);
    edit_row.append(&save_button);

    left.append(&capture_button);
    left.append(&canvas);
    left.append(&edit_row);

    let right = GtkBox::new(Orientation::Vertical, style_tokens.spacing_8);
    right.set_size_request(style_tokens.chat_panel_width, -1);
    let chat_title = Label::new(Some("Chat"));
    chat_title.set_halign(Align::Start);
    chat_title.add_css_class("heading");

    let chat_view = TextView::new();
    chat_view.set_editable(false);
    chat_view.set_cursor_visible(false);
    chat_view.set_wrap_mode(WrapMode::WordChar);
    let chat_scroller = ScrolledWindow::new();
    chat_scroller.set_child(Some(&chat_view));
    chat_scroller.set_vexpand(true);

    let prompt_entry = Entry::new();
    prompt_entry.set_placeholder_text(Some(crate::describe::DEFAULT_PROMPT));

    let prompt_row = GtkBox::new(Orientation::Horizontal, style_tokens.spacing_4);
    prompt_entry.set_hexpand(true);
    let analyze_button = Button::with_label(ANALYZE_BUTTON_LABEL);
    prompt_row.append(&prompt_entry);
    prompt_row.append(&analyze_button);

    let api_key_button = Button::with_label("API Key");
    api_key_button.set_halign(Align::End);

    right.append(&chat_title);
    right.append(&chat_scroller);
    right.append(&prompt_row);
    right.append(&api_key_button);

    panels.append(&left);
    panels.append(&right);

    let status_label = Label::new(Some("Ready"));
    status_label.set_halign(Align::Start);
    status_label.add_css_class("dim-label");

    root.append(&panels);
    root.append(&status_label);
    window.set_child(Some(&root));

    MainWindowUi {
        window,
        canvas,
        capture_button,
        crop_button,
        save_button,
        analyze_button,
        api_key_button,
        prompt_entry,
        chat_view,
        status_label,
    }
}

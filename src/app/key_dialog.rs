use std::rc::Rc;

use gtk4::prelude::*;
use gtk4::{Align, ApplicationWindow, Box as GtkBox, Button, Label, Orientation, PasswordEntry};

use crate::describe::ApiKey;
use crate::ui::StyleTokens;

const EMPTY_KEY_MESSAGE: &str = "API key cannot be empty";

/// Modal prompt for the Anthropic API key. `on_accept` runs only for a
/// non-empty key; the dialog stays open otherwise.
pub(super) fn present_api_key_dialog(
    parent: &ApplicationWindow,
    style_tokens: StyleTokens,
    on_accept: Rc<dyn Fn(ApiKey)>,
) {
    let dialog = gtk4::Window::new();
    dialog.set_title(Some("API Key"));
    dialog.set_transient_for(Some(parent));
    dialog.set_modal(true);
    dialog.set_resizable(false);
    dialog.set_default_size(style_tokens.key_dialog_width, -1);

    let content = GtkBox::new(Orientation::Vertical, style_tokens.spacing_8);
    content.set_margin_top(style_tokens.spacing_12);
    content.set_margin_bottom(style_tokens.spacing_12);
    content.set_margin_start(style_tokens.spacing_12);
    content.set_margin_end(style_tokens.spacing_12);

    let prompt = Label::new(Some("Enter your Anthropic API key:"));
    prompt.set_halign(Align::Start);
    let entry = PasswordEntry::new();
    entry.set_show_peek_icon(true);
    let error_label = Label::new(None);
    error_label.set_halign(Align::Start);
    error_label.add_css_class("error");

    let buttons = GtkBox::new(Orientation::Horizontal, style_tokens.spacing_8);
    buttons.set_halign(Align::End);
    let cancel_button = Button::with_label("Cancel");
    let save_button = Button::with_label("Save");
    save_button.add_css_class("suggested-action");
    buttons.append(&cancel_button);
    buttons.append(&save_button);

    content.append(&prompt);
    content.append(&entry);
    content.append(&error_label);
    content.append(&buttons);
    dialog.set_child(Some(&content));

    let submit: Rc<dyn Fn()> = {
        let dialog = dialog.clone();
        let entry = entry.clone();
        Rc::new(move || match ApiKey::new(entry.text()) {
            Some(key) => {
                on_accept(key);
                dialog.close();
            }
            None => {
                tracing::debug!("rejected empty api key input");
                error_label.set_text(EMPTY_KEY_MESSAGE);
            }
        })
    };

    {
        let submit = submit.clone();
        save_button.connect_clicked(move |_| submit());
    }
    entry.connect_activate(move |_| submit());
    {
        let dialog = dialog.clone();
        cancel_button.connect_clicked(move |_| dialog.close());
    }

    dialog.present();
    entry.grab_focus();
}

mod actions;
mod canvas;
mod key_dialog;
mod layout;
mod worker;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use gtk4::prelude::*;
use gtk4::Application;

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::session::CaptureSession;
use crate::state::AppState;
use crate::storage::StorageService;
use crate::ui::LAYOUT_TOKENS;

use actions::{ActionExecutor, ActionExecutorDeps};
use canvas::{connect_preview_draw, pointer_point, PreviewCanvasState};
use layout::{build_main_window, MainWindowUi};

const APPLICATION_ID: &str = "io.github.snapsight";

pub struct App {
    config: AppConfig,
    session: Rc<RefCell<CaptureSession>>,
}

impl App {
    pub fn new(config: AppConfig) -> Self {
        let session = CaptureSession::new(config.preview_bounds);
        Self {
            config,
            session: Rc::new(RefCell::new(session)),
        }
    }

    pub fn state(&self) -> AppState {
        self.session.borrow().state()
    }

    pub fn start(&mut self) -> AppResult<()> {
        gtk4::init().map_err(|err| AppError::GtkInit {
            message: err.to_string(),
        })?;

        tracing::info!("starting gtk runtime");
        let application =
            Application::new(Some(APPLICATION_ID), gtk4::gio::ApplicationFlags::NON_UNIQUE);

        let config = self.config.clone();
        let session = self.session.clone();
        let activate_once = Rc::new(Cell::new(false));
        application.connect_activate(move |app| {
            if activate_once.replace(true) {
                tracing::debug!("ignoring duplicate gtk activate signal");
                return;
            }

            let ui = build_main_window(app, LAYOUT_TOKENS, config.preview_bounds);
            let canvas_state = Rc::new(RefCell::new(PreviewCanvasState::default()));
            connect_preview_draw(
                &ui.canvas,
                canvas_state.clone(),
                LAYOUT_TOKENS.crop_outline_width,
            );

            let executor = ActionExecutor::new(ActionExecutorDeps {
                ui: ui.clone(),
                style_tokens: LAYOUT_TOKENS,
                session: session.clone(),
                canvas_state,
                storage: StorageService::new(config.save_dir.clone()),
                describe_settings: config.describe.clone(),
                api_key: config.api_key.clone(),
                capture_delay_secs: config.capture_delay_secs,
            });
            connect_main_window(&ui, &executor);
            executor.render();
            ui.window.present();

            if !executor.has_api_key() {
                ui.set_status("No API key configured");
                executor.open_api_key_dialog();
            }
        });

        let gtk_args = gtk_launch_args();
        application.run_with_args(&gtk_args);
        tracing::info!(
            chat_messages = self.session.borrow().chat().messages().len(),
            "gtk runtime exited"
        );
        Ok(())
    }
}

/// GTK only sees the program name; the app takes no command-line options.
fn gtk_launch_args() -> Vec<String> {
    std::env::args().take(1).collect()
}

fn connect_main_window(ui: &MainWindowUi, executor: &ActionExecutor) {
    {
        let executor = executor.clone();
        ui.capture_button
            .connect_clicked(move |_| executor.take_screenshot());
    }
    {
        let executor = executor.clone();
        ui.crop_button.connect_clicked(move |_| executor.start_crop());
    }
    {
        let executor = executor.clone();
        ui.save_button.connect_clicked(move |_| executor.save());
    }
    {
        let executor = executor.clone();
        ui.analyze_button.connect_clicked(move |_| executor.analyze());
    }
    {
        let executor = executor.clone();
        ui.prompt_entry.connect_activate(move |_| executor.analyze());
    }
    {
        let executor = executor.clone();
        ui.api_key_button
            .connect_clicked(move |_| executor.open_api_key_dialog());
    }

    connect_crop_gesture(ui, executor);

    {
        let executor = executor.clone();
        let key_controller = gtk4::EventControllerKey::new();
        key_controller.connect_key_pressed(move |_, key, _, _| {
            if key == gtk4::gdk::Key::Escape && executor.cancel_crop() {
                return gtk4::glib::Propagation::Stop;
            }
            gtk4::glib::Propagation::Proceed
        });
        ui.window.add_controller(key_controller);
    }
    {
        let executor = executor.clone();
        ui.window.connect_close_request(move |_| {
            executor.cancel_pending_work();
            gtk4::glib::Propagation::Proceed
        });
    }
}

fn connect_crop_gesture(ui: &MainWindowUi, executor: &ActionExecutor) {
    let drag = gtk4::GestureDrag::new();
    drag.set_button(gtk4::gdk::BUTTON_PRIMARY);

    {
        let executor = executor.clone();
        drag.connect_drag_begin(move |_, start_x, start_y| {
            executor.crop_drag_begin(pointer_point(start_x, start_y));
        });
    }
    {
        let executor = executor.clone();
        drag.connect_drag_update(move |gesture, offset_x, offset_y| {
            if let Some((start_x, start_y)) = gesture.start_point() {
                executor.crop_drag_update(pointer_point(start_x + offset_x, start_y + offset_y));
            }
        });
    }
    {
        let executor = executor.clone();
        drag.connect_drag_end(move |gesture, offset_x, offset_y| {
            if let Some((start_x, start_y)) = gesture.start_point() {
                executor.crop_drag_end(pointer_point(start_x + offset_x, start_y + offset_y));
            }
        });
    }

    ui.canvas.add_controller(drag);
}

pub mod app;
pub mod capture;
pub mod config;
pub mod describe;
pub mod error;
pub mod geometry;
pub mod logging;
pub mod notification;
pub mod session;
pub mod state;
pub mod storage;
pub mod ui;
pub use error::{AppError, AppResult};

/// Loads configuration, installs logging and runs the GTK window until it
/// is closed.
pub fn run() -> AppResult<()> {
    let (config, warnings) = config::AppConfig::load();
    logging::init(&config.log_filter);
    for warning in &warnings {
        tracing::warn!("{warning}");
    }
    tracing::info!(
        save_dir = %config.save_dir.display(),
        model = %config.describe.model,
        has_api_key = config.api_key.is_some(),
        "starting Snapsight"
    );

    let mut app = app::App::new(config);
    app.start()?;

    tracing::info!("shutdown complete with state={:?}", app.state());
    Ok(())
}

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::describe::{ApiKey, DescribeSettings};
use crate::geometry::ImageSize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConfigPathError {
    MissingHomeDirectory,
}

const APP_DIR: &str = "snapsight";
const APP_CONFIG_FILE: &str = "config.json";
pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";
pub const LOG_FILTER_ENV: &str = "SNAPSIGHT_LOG";

const DEFAULT_SAVE_DIR: &str = "screenshots";
const DEFAULT_PREVIEW_WIDTH: u32 = 500;
const DEFAULT_PREVIEW_HEIGHT: u32 = 400;
const DEFAULT_CAPTURE_DELAY_SECS: u32 = 1;
const DEFAULT_MODEL: &str = "claude-3-opus-20240229";
const DEFAULT_MAX_TOKENS: u32 = 1024;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
const DEFAULT_API_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_LOG_FILTER: &str = "info";

/// Optional overrides from `config.json`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    save_dir: Option<PathBuf>,
    preview_width: Option<u32>,
    preview_height: Option<u32>,
    capture_delay_secs: Option<u32>,
    model: Option<String>,
    max_tokens: Option<u32>,
    request_timeout_secs: Option<u64>,
    api_base_url: Option<String>,
    log_filter: Option<String>,
}

/// Everything the app needs, resolved once at startup and handed to each
/// component.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub save_dir: PathBuf,
    pub preview_bounds: ImageSize,
    pub capture_delay_secs: u32,
    pub describe: DescribeSettings,
    pub api_key: Option<ApiKey>,
    pub log_filter: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            save_dir: PathBuf::from(DEFAULT_SAVE_DIR),
            preview_bounds: ImageSize::new(DEFAULT_PREVIEW_WIDTH, DEFAULT_PREVIEW_HEIGHT),
            capture_delay_secs: DEFAULT_CAPTURE_DELAY_SECS,
            describe: DescribeSettings {
                base_url: DEFAULT_API_BASE_URL.to_string(),
                model: DEFAULT_MODEL.to_string(),
                max_tokens: DEFAULT_MAX_TOKENS,
                timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            },
            api_key: None,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl AppConfig {
    /// Reads `config.json`, `.env` and the process environment.
    ///
    /// Runs before logging is initialised, so problems are returned as
    /// warnings for the caller to log.
    pub fn load() -> (Self, Vec<String>) {
        let mut warnings = Vec::new();
        if let Err(err) = dotenvy::dotenv() {
            if !err.not_found() {
                warnings.push(format!("failed to load .env: {err}"));
            }
        }

        let (xdg_config_home, home) = config_env_dirs();
        let file = load_file_config(xdg_config_home.as_deref(), home.as_deref(), &mut warnings);
        let mut config = Self::default();
        config.apply_file(file, &mut warnings);
        config.apply_env(
            std::env::var(API_KEY_ENV).ok().as_deref(),
            std::env::var(LOG_FILTER_ENV).ok().as_deref(),
        );
        (config, warnings)
    }

    fn apply_file(&mut self, file: FileConfig, warnings: &mut Vec<String>) {
        if let Some(save_dir) = file.save_dir.filter(|dir| !dir.as_os_str().is_empty()) {
            self.save_dir = save_dir;
        }

        let width = file.preview_width.unwrap_or(self.preview_bounds.width);
        let height = file.preview_height.unwrap_or(self.preview_bounds.height);
        if width == 0 || height == 0 {
            warnings.push(format!(
                "ignoring preview bounds {width}x{height}; using {}x{}",
                self.preview_bounds.width, self.preview_bounds.height
            ));
        } else {
            self.preview_bounds = ImageSize::new(width, height);
        }

        if let Some(delay) = file.capture_delay_secs {
            self.capture_delay_secs = delay;
        }
        if let Some(model) = file.model.filter(|model| !model.trim().is_empty()) {
            self.describe.model = model;
        }
        match file.max_tokens {
            Some(0) => warnings.push("ignoring max_tokens 0".to_string()),
            Some(max_tokens) => self.describe.max_tokens = max_tokens,
            None => {}
        }
        match file.request_timeout_secs {
            Some(0) => warnings.push("ignoring request_timeout_secs 0".to_string()),
            Some(secs) => self.describe.timeout = Duration::from_secs(secs),
            None => {}
        }
        if let Some(base_url) = file.api_base_url.filter(|url| !url.trim().is_empty()) {
            self.describe.base_url = base_url;
        }
        if let Some(filter) = file.log_filter.filter(|filter| !filter.trim().is_empty()) {
            self.log_filter = filter;
        }
    }

    fn apply_env(&mut self, api_key: Option<&str>, log_filter: Option<&str>) {
        self.api_key = api_key.and_then(ApiKey::new);
        if let Some(filter) = log_filter.filter(|filter| !filter.trim().is_empty()) {
            self.log_filter = filter.to_string();
        }
    }
}

fn load_file_config(
    xdg_config_home: Option<&Path>,
    home: Option<&Path>,
    warnings: &mut Vec<String>,
) -> FileConfig {
    let path = match app_config_path(APP_DIR, APP_CONFIG_FILE, xdg_config_home, home) {
        Ok(p) => p,
        Err(_) => return FileConfig::default(),
    };
    if !path.exists() {
        return FileConfig::default();
    }
    match std::fs::read_to_string(&path) {
        Ok(contents) => parse_file_config(&contents).unwrap_or_else(|err| {
            warnings.push(format!(
                "failed to parse {}; using defaults: {err}",
                path.display()
            ));
            FileConfig::default()
        }),
        Err(err) => {
            warnings.push(format!(
                "failed to read {}; using defaults: {err}",
                path.display()
            ));
            FileConfig::default()
        }
    }
}

fn parse_file_config(contents: &str) -> serde_json::Result<FileConfig> {
    serde_json::from_str(contents)
}

pub(crate) fn config_env_dirs() -> (Option<PathBuf>, Option<PathBuf>) {
    (
        std::env::var_os("XDG_CONFIG_HOME").map(PathBuf::from),
        std::env::var_os("HOME").map(PathBuf::from),
    )
}

pub(crate) fn app_config_path(
    app_dir: &str,
    file_name: &str,
    xdg_config_home: Option<&Path>,
    home: Option<&Path>,
) -> Result<PathBuf, ConfigPathError> {
    let mut path = config_root(xdg_config_home, home)?;
    path.push(app_dir);
    path.push(file_name);
    Ok(path)
}

fn config_root(
    xdg_config_home: Option<&Path>,
    home: Option<&Path>,
) -> Result<PathBuf, ConfigPathError> {
    if let Some(xdg) = xdg_config_home.filter(|path| !path.as_os_str().is_empty()) {
        return Ok(xdg.to_path_buf());
    }

    let home = home.ok_or(ConfigPathError::MissingHomeDirectory)?;
    Ok(home.join(".config"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_config_path_prefers_xdg_config_home() {
        let path = app_config_path(
            "snapsight",
            "config.json",
            Some(Path::new("/tmp/config-root")),
            Some(Path::new("/tmp/home")),
        )
        .expect("path should resolve");

        assert_eq!(path, PathBuf::from("/tmp/config-root/snapsight/config.json"));
    }

    #[test]
    fn app_config_path_falls_back_to_home_dot_config() {
        let path = app_config_path("snapsight", "config.json", None, Some(Path::new("/tmp/home")))
            .expect("path should resolve");

        assert_eq!(path, PathBuf::from("/tmp/home/.config/snapsight/config.json"));
    }

    #[test]
    fn app_config_path_errors_when_home_missing_and_xdg_unset() {
        let error = app_config_path("snapsight", "config.json", None, None).unwrap_err();
        assert_eq!(error, ConfigPathError::MissingHomeDirectory);
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = AppConfig::default();
        assert_eq!(config.save_dir, PathBuf::from("screenshots"));
        assert_eq!(config.preview_bounds, ImageSize::new(500, 400));
        assert_eq!(config.capture_delay_secs, 1);
        assert_eq!(config.describe.max_tokens, 1024);
        assert_eq!(config.describe.timeout, Duration::from_secs(60));
        assert!(config.api_key.is_none());
    }

    #[test]
    fn file_config_overrides_selected_fields() {
        let file = parse_file_config(
            r#"{"save_dir": "/tmp/shots", "preview_width": 700, "model": "vision-x", "request_timeout_secs": 15}"#,
        )
        .unwrap();
        let mut config = AppConfig::default();
        let mut warnings = Vec::new();
        config.apply_file(file, &mut warnings);

        assert!(warnings.is_empty());
        assert_eq!(config.save_dir, PathBuf::from("/tmp/shots"));
        assert_eq!(config.preview_bounds, ImageSize::new(700, 400));
        assert_eq!(config.describe.model, "vision-x");
        assert_eq!(config.describe.timeout, Duration::from_secs(15));
        assert_eq!(config.describe.max_tokens, 1024);
    }

    #[test]
    fn zero_sized_values_fall_back_with_warnings() {
        let file = parse_file_config(
            r#"{"preview_height": 0, "request_timeout_secs": 0, "max_tokens": 0}"#,
        )
        .unwrap();
        let mut config = AppConfig::default();
        let mut warnings = Vec::new();
        config.apply_file(file, &mut warnings);

        assert_eq!(warnings.len(), 3);
        assert_eq!(config.preview_bounds, ImageSize::new(500, 400));
        assert_eq!(config.describe.timeout, Duration::from_secs(60));
        assert_eq!(config.describe.max_tokens, 1024);
    }

    #[test]
    fn malformed_file_config_is_an_error() {
        assert!(parse_file_config("{ not json").is_err());
        assert!(parse_file_config(r#"{"preview_width": "wide"}"#).is_err());
    }

    #[test]
    fn unreadable_config_file_falls_back_to_defaults() {
        let root = std::env::temp_dir().join(format!("snapsight-config-{}", std::process::id()));
        let dir = root.join(APP_DIR);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(APP_CONFIG_FILE), "{ broken").unwrap();

        let mut warnings = Vec::new();
        let file = load_file_config(Some(&root), None, &mut warnings);

        assert_eq!(warnings.len(), 1);
        assert!(file.save_dir.is_none());
        let _ = std::fs::remove_dir_all(root);
    }

    #[test]
    fn env_credential_must_be_non_empty() {
        let mut config = AppConfig::default();
        config.apply_env(Some("   "), None);
        assert!(config.api_key.is_none());

        config.apply_env(Some("sk-ant-1"), Some("snapsight=debug"));
        assert_eq!(config.api_key.as_ref().map(ApiKey::expose), Some("sk-ant-1"));
        assert_eq!(config.log_filter, "snapsight=debug");
    }
}

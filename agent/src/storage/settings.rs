//! Settings file management
//!
//! Settings come from an optional JSON file; command line flags override
//! individual fields.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::app::options::AppOptions;
use crate::errors::AgentError;
use crate::filesys::file::File;
use crate::hardware::camera::{BackendKind, CameraMethod, CaptureOptions};
use crate::hardware::power::IdleMode;
use crate::logs::LogLevel;
use crate::storage::layout::StorageLayout;
use crate::workers::capture;

/// Agent settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Emit JSON log lines on stdout
    #[serde(default)]
    pub log_json: bool,

    /// Directory for rolling log files
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Seconds between captures
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Forced capture backend name
    #[serde(default)]
    pub backend: Option<String>,

    /// Restrict backends to executables or the Python binding
    #[serde(default)]
    pub camera_method: CameraMethod,

    /// Show the camera preview (uses more power)
    #[serde(default)]
    pub show_preview: bool,

    /// `WIDTHxHEIGHT` for webcam captures
    #[serde(default = "default_resolution")]
    pub resolution: String,

    /// Python interpreter for the camera binding
    #[serde(default = "default_python")]
    pub python: String,

    /// Idle mode between captures
    #[serde(default)]
    pub idle_mode: IdleMode,

    /// Pause after waking from suspend
    #[serde(default = "default_wake_buffer")]
    pub wake_buffer_secs: u64,

    /// Root of the image tree
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Stop after this many cycles
    #[serde(default)]
    pub max_cycles: Option<u64>,

    /// Turn off HDMI and set the powersave governor at startup
    #[serde(default)]
    pub power_save: bool,
}

fn default_interval() -> u64 {
    60
}

fn default_resolution() -> String {
    "1280x720".to_string()
}

fn default_python() -> String {
    "python3".to_string()
}

fn default_wake_buffer() -> u64 {
    2
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./images")
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_json: false,
            log_dir: None,
            interval_secs: default_interval(),
            backend: None,
            camera_method: CameraMethod::Auto,
            show_preview: false,
            resolution: default_resolution(),
            python: default_python(),
            idle_mode: IdleMode::Auto,
            wake_buffer_secs: default_wake_buffer(),
            output_dir: default_output_dir(),
            max_cycles: None,
            power_save: false,
        }
    }
}

impl Settings {
    /// Read settings from a JSON file
    pub async fn load(file: &File) -> Result<Self, AgentError> {
        let settings = file
            .read_json::<Settings>()
            .await
            .with_context(|| format!("reading settings from {}", file.path().display()))?;
        Ok(settings)
    }

    /// Settings from `--config=<path>` if given, defaults otherwise, then
    /// command line overrides
    pub async fn resolve(cli_args: &HashMap<String, String>) -> Result<Self, AgentError> {
        let mut settings = match cli_args.get("config") {
            Some(path) => Self::load(&File::new(path)).await?,
            None => Self::default(),
        };
        settings.apply_cli(cli_args)?;
        Ok(settings)
    }

    /// Override fields from `--key=value` / `--flag` arguments
    pub fn apply_cli(&mut self, cli_args: &HashMap<String, String>) -> Result<(), AgentError> {
        if let Some(level) = cli_args.get("log-level") {
            self.log_level = level.parse().map_err(AgentError::ConfigError)?;
        }
        if let Some(value) = cli_args.get("log-json") {
            self.log_json = parse_flag("log-json", value)?;
        }
        if let Some(dir) = cli_args.get("log-dir") {
            self.log_dir = Some(PathBuf::from(dir));
        }
        if let Some(interval) = cli_args.get("interval") {
            self.interval_secs = parse_number("interval", interval)?;
        }
        if let Some(backend) = cli_args.get("backend") {
            self.backend = Some(backend.clone());
        }
        if let Some(value) = cli_args.get("use-libcamera") {
            if parse_flag("use-libcamera", value)? {
                self.backend = Some(BackendKind::LibcameraStill.name().to_string());
            }
        }
        if let Some(method) = cli_args.get("method") {
            self.camera_method = method.parse()?;
        }
        if let Some(value) = cli_args.get("show-preview") {
            self.show_preview = parse_flag("show-preview", value)?;
        }
        if let Some(resolution) = cli_args.get("resolution") {
            self.resolution = resolution.clone();
        }
        if let Some(python) = cli_args.get("python") {
            self.python = python.clone();
        }
        if let Some(mode) = cli_args.get("idle") {
            self.idle_mode = mode.parse()?;
        }
        if let Some(buffer) = cli_args.get("wake-buffer") {
            self.wake_buffer_secs = parse_number("wake-buffer", buffer)?;
        }
        if let Some(dir) = cli_args.get("output-dir") {
            self.output_dir = PathBuf::from(dir);
        }
        if let Some(cycles) = cli_args.get("cycles") {
            self.max_cycles = Some(parse_number("cycles", cycles)?);
        }
        if let Some(value) = cli_args.get("power-save") {
            self.power_save = parse_flag("power-save", value)?;
        }
        Ok(())
    }

    /// Validate and convert into run options
    pub fn to_options(&self) -> Result<AppOptions, AgentError> {
        if self.interval_secs == 0 {
            return Err(AgentError::ConfigError("interval must be at least 1 second".to_string()));
        }
        if self.max_cycles == Some(0) {
            return Err(AgentError::ConfigError("cycles must be at least 1".to_string()));
        }

        let backend = self
            .backend
            .as_deref()
            .map(str::parse::<BackendKind>)
            .transpose()?;

        Ok(AppOptions {
            backend,
            camera_method: self.camera_method,
            capture: CaptureOptions {
                preview: self.show_preview,
                resolution: parse_resolution(&self.resolution)?,
                python: self.python.clone(),
            },
            idle_mode: self.idle_mode,
            wake_buffer: Duration::from_secs(self.wake_buffer_secs),
            storage: StorageLayout::new(&self.output_dir),
            capture_worker: capture::Options {
                interval: Duration::from_secs(self.interval_secs),
                max_cycles: self.max_cycles,
            },
            power_save: self.power_save,
        })
    }
}

fn parse_number(key: &str, value: &str) -> Result<u64, AgentError> {
    value
        .trim()
        .parse()
        .map_err(|_| AgentError::ConfigError(format!("--{} expects a whole number, got '{}'", key, value)))
}

fn parse_flag(key: &str, value: &str) -> Result<bool, AgentError> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(AgentError::ConfigError(format!("--{} expects true or false, got '{}'", key, value))),
    }
}

fn parse_resolution(value: &str) -> Result<(u32, u32), AgentError> {
    let invalid = || AgentError::ConfigError(format!("Invalid resolution '{}', expected WIDTHxHEIGHT", value));

    let lowered = value.to_lowercase();
    let (width, height) = lowered.split_once('x').ok_or_else(invalid)?;
    let width: u32 = width.trim().parse().map_err(|_| invalid())?;
    let height: u32 = height.trim().parse().map_err(|_| invalid())?;
    if width == 0 || height == 0 {
        return Err(invalid());
    }
    Ok((width, height))
}

//! Application configuration options

use std::time::Duration;

use crate::hardware::camera::{BackendKind, CameraMethod, CaptureOptions};
use crate::hardware::power::IdleMode;
use crate::storage::layout::StorageLayout;
use crate::workers::capture;

/// Main application options
#[derive(Debug, Clone)]
pub struct AppOptions {
    /// Backend forced by the user, tried before the preference order
    pub backend: Option<BackendKind>,

    /// Restricts which backends the selector may fall back to
    pub camera_method: CameraMethod,

    /// Options handed to the capture backend
    pub capture: CaptureOptions,

    /// How to idle between captures
    pub idle_mode: IdleMode,

    /// Pause after waking from suspend so I/O can settle
    pub wake_buffer: Duration,

    /// Where images are written
    pub storage: StorageLayout,

    /// Capture worker options
    pub capture_worker: capture::Options,

    /// Apply best-effort power saving at startup
    pub power_save: bool,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            backend: None,
            camera_method: CameraMethod::Auto,
            capture: CaptureOptions::default(),
            idle_mode: IdleMode::Auto,
            wake_buffer: Duration::from_secs(2),
            storage: StorageLayout::default(),
            capture_worker: capture::Options::default(),
            power_save: false,
        }
    }
}

//! Camera capture backends
//!
//! Every backend is an external program that writes a JPEG to an exact path.
//! The agent only looks at the exit status; file writes belong to the tool.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::debug;

use crate::errors::AgentError;
use crate::models::capture::{CaptureRequest, CaptureResult};

/// Python modules that provide the camera binding, newest first
pub const PYTHON_CAMERA_MODULES: [&str; 2] = ["picamera2", "picamera"];

const PYTHON_CAPTURE_SCRIPT: &str = "\
import sys
path = sys.argv[1]
try:
    from picamera2 import Picamera2
except ImportError:
    Picamera2 = None
if Picamera2 is not None:
    cam = Picamera2()
    cam.start()
    cam.capture_file(path)
    cam.stop()
    cam.close()
else:
    from picamera import PiCamera
    with PiCamera() as cam:
        cam.capture(path)
";

/// How a backend talks to the camera
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraMethod {
    /// Any backend
    #[default]
    Auto,
    /// Standalone capture executables only
    Command,
    /// The Python camera binding only
    Python,
}

impl std::str::FromStr for CameraMethod {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(CameraMethod::Auto),
            "command" | "cmd" | "cli" => Ok(CameraMethod::Command),
            "python" | "module" => Ok(CameraMethod::Python),
            _ => Err(AgentError::ConfigError(format!("Invalid camera method: {}", s))),
        }
    }
}

/// Known capture backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    LibcameraStill,
    Raspistill,
    Fswebcam,
    Picamera,
}

impl BackendKind {
    /// Selection order when nothing is forced
    pub const PREFERENCE: [BackendKind; 4] = [
        BackendKind::LibcameraStill,
        BackendKind::Raspistill,
        BackendKind::Fswebcam,
        BackendKind::Picamera,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            BackendKind::LibcameraStill => "libcamera-still",
            BackendKind::Raspistill => "raspistill",
            BackendKind::Fswebcam => "fswebcam",
            BackendKind::Picamera => "picamera",
        }
    }

    /// Executable to look up on `PATH`; `None` for the Python binding
    pub fn executable(&self) -> Option<&'static str> {
        match self {
            BackendKind::Picamera => None,
            other => Some(other.name()),
        }
    }

    pub fn method(&self) -> CameraMethod {
        match self {
            BackendKind::Picamera => CameraMethod::Python,
            _ => CameraMethod::Command,
        }
    }

    /// Whether `method` allows this backend
    pub fn allowed_by(&self, method: CameraMethod) -> bool {
        method == CameraMethod::Auto || method == self.method()
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for BackendKind {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "libcamera" | "libcamera-still" => Ok(BackendKind::LibcameraStill),
            "raspistill" => Ok(BackendKind::Raspistill),
            "fswebcam" | "webcam" => Ok(BackendKind::Fswebcam),
            "picamera" | "picamera2" | "python" => Ok(BackendKind::Picamera),
            _ => Err(AgentError::ConfigError(format!("Unknown capture backend: {}", s))),
        }
    }
}

/// Options shared by every backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureOptions {
    /// Show the camera preview window (costs power)
    pub preview: bool,

    /// Frame size requested from `fswebcam`
    pub resolution: (u32, u32),

    /// Interpreter used for the Python binding
    pub python: String,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            preview: false,
            resolution: (1280, 720),
            python: "python3".to_string(),
        }
    }
}

/// Anything that can turn a capture request into a JPEG on disk
#[async_trait]
pub trait CaptureBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn invoke(&self, request: &CaptureRequest) -> CaptureResult;
}

/// Backend that shells out to a capture tool
#[derive(Debug, Clone)]
pub struct CommandBackend {
    kind: BackendKind,
    options: CaptureOptions,
}

impl CommandBackend {
    pub fn new(kind: BackendKind, options: CaptureOptions) -> Self {
        Self { kind, options }
    }

    /// Build the capture command for `path`
    pub fn command(&self, path: &Path) -> Command {
        let mut command = match self.kind {
            BackendKind::LibcameraStill | BackendKind::Raspistill => {
                let mut command = Command::new(self.kind.name());
                if !self.options.preview {
                    command.arg("-n");
                }
                command.arg("-o").arg(path);
                command
            }
            BackendKind::Fswebcam => {
                let (width, height) = self.options.resolution;
                let mut command = Command::new(self.kind.name());
                command
                    .arg("--no-banner")
                    .arg("-r")
                    .arg(format!("{}x{}", width, height))
                    .arg(path);
                command
            }
            BackendKind::Picamera => {
                let mut command = Command::new(&self.options.python);
                command.arg("-c").arg(PYTHON_CAPTURE_SCRIPT).arg(path);
                command
            }
        };

        command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

#[async_trait]
impl CaptureBackend for CommandBackend {
    fn name(&self) -> &str {
        self.kind.name()
    }

    async fn invoke(&self, request: &CaptureRequest) -> CaptureResult {
        debug!("Running {} for {}", self.kind, request.target_path().display());

        let output = match self.command(request.target_path()).output().await {
            Ok(output) => output,
            Err(e) => return CaptureResult::failed(format!("failed to run {}: {}", self.kind, e)),
        };

        if output.status.success() {
            return CaptureResult::ok();
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr = stderr.trim();
        if stderr.is_empty() {
            CaptureResult::failed(format!("{} exited with {}", self.kind, output.status))
        } else {
            CaptureResult::failed(format!("{} exited with {}: {}", self.kind, output.status, stderr))
        }
    }
}

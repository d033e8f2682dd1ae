//! Startup selection of the capture backend and idle strategy

use tracing::{debug, info, warn};

use crate::app::options::AppOptions;
use crate::errors::AgentError;
use crate::hardware::camera::{
    BackendKind, CameraMethod, CaptureBackend, CommandBackend, PYTHON_CAMERA_MODULES,
};
use crate::hardware::power::{select_idle_strategy, IdleStrategy, Suspender};
use crate::hardware::probe::HostProbe;

/// Whether `kind` can run on the probed host
pub async fn is_available(probe: &dyn HostProbe, kind: BackendKind) -> bool {
    match kind.executable() {
        Some(executable) => probe.has_executable(executable).await,
        None => {
            for module in PYTHON_CAMERA_MODULES {
                if probe.has_python_module(module).await {
                    return true;
                }
            }
            false
        }
    }
}

/// Every usable backend allowed by `method`, in preference order
pub async fn discover_backends(probe: &dyn HostProbe, method: CameraMethod) -> Vec<BackendKind> {
    let mut found = Vec::new();
    for kind in BackendKind::PREFERENCE {
        if kind.allowed_by(method) && is_available(probe, kind).await {
            found.push(kind);
        }
    }
    found
}

/// Resolve exactly one backend.
///
/// A forced backend wins when it is present. Otherwise the first discoverable
/// backend in preference order is used. Nothing discoverable is fatal.
pub async fn select_backend(
    probe: &dyn HostProbe,
    forced: Option<BackendKind>,
    method: CameraMethod,
) -> Result<BackendKind, AgentError> {
    if let Some(kind) = forced {
        if is_available(probe, kind).await {
            debug!("Using forced backend {}", kind);
            return Ok(kind);
        }
        warn!("Requested backend {} is not available, probing for another", kind);
    }

    for kind in BackendKind::PREFERENCE {
        if kind.allowed_by(method) && is_available(probe, kind).await {
            return Ok(kind);
        }
    }

    Err(AgentError::NoBackendAvailable(format!(
        "none of {} found (camera method: {:?})",
        BackendKind::PREFERENCE
            .iter()
            .filter(|kind| kind.allowed_by(method))
            .map(|kind| kind.name())
            .collect::<Vec<_>>()
            .join(", "),
        method
    )))
}

/// The concrete pair the capture worker runs with
pub struct Selection {
    pub backend: Box<dyn CaptureBackend>,
    pub idle: Box<dyn IdleStrategy>,
}

/// Probe the host once and build the backend and idle strategy
pub async fn select(
    probe: &dyn HostProbe,
    options: &AppOptions,
    suspender: Box<dyn Suspender>,
) -> Result<Selection, AgentError> {
    let kind = select_backend(probe, options.backend, options.camera_method).await?;
    info!("Selected capture backend: {}", kind);

    let sleep_states = probe.sleep_states().await;
    debug!("Available sleep states: {:?}", sleep_states);
    let idle = select_idle_strategy(options.idle_mode, &sleep_states, suspender, options.wake_buffer);
    info!("Selected idle strategy: {}", idle.describe());

    Ok(Selection {
        backend: Box::new(CommandBackend::new(kind, options.capture.clone())),
        idle,
    })
}

//! Host diagnostic: which capture backends and sleep states this machine offers

use std::collections::HashMap;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use crate::app::options::AppOptions;
use crate::app::select::{discover_backends, select_backend};
use crate::errors::AgentError;
use crate::hardware::camera::BackendKind;
use crate::hardware::power::{recognized_states, SleepState, Suspender};
use crate::hardware::probe::HostProbe;
use crate::utils::{version_info, VersionInfo};

/// Length of the confirmation suspend of the recommended state
pub const FINAL_TEST_DURATION: Duration = Duration::from_secs(30);

/// What `--diagnostic` was asked to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiagnosticRequest {
    /// Exercise every recognized sleep state for this long
    pub test_duration: Option<Duration>,
}

impl DiagnosticRequest {
    /// `None` unless `--diagnostic` (or `--diag`) is present
    pub fn from_cli(cli_args: &HashMap<String, String>) -> Result<Option<Self>, AgentError> {
        let requested = cli_args.contains_key("diagnostic") || cli_args.contains_key("diag");

        let test_duration = match cli_args.get("test-suspend") {
            None => None,
            Some(_) if !requested => {
                warn!("--test-suspend only applies with --diagnostic, ignoring it");
                None
            }
            Some(value) => {
                let secs = value.parse::<u64>().map_err(|_| {
                    AgentError::ConfigError(format!(
                        "--test-suspend expects a number of seconds, got '{}'",
                        value
                    ))
                })?;
                Some(Duration::from_secs(secs.max(1)))
            }
        };

        Ok(requested.then_some(Self { test_duration }))
    }
}

/// Result of exercising one sleep state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuspendTest {
    pub state: SleepState,
    pub works: bool,
    pub error: Option<String>,
}

/// Everything the diagnostic found
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticReport {
    pub version: VersionInfo,
    pub host_name: Option<String>,
    pub sleep_states: Vec<String>,
    pub recognized_states: Vec<SleepState>,
    pub available_backends: Vec<BackendKind>,
    pub selected_backend: Option<BackendKind>,
    pub selection_error: Option<String>,
    pub suspend_tests: Vec<SuspendTest>,
    pub recommended_state: Option<SleepState>,
    pub final_test: Option<SuspendTest>,
}

impl DiagnosticReport {
    /// A host can run the agent with hardware suspend
    pub fn is_healthy(&self) -> bool {
        self.selected_backend.is_some()
            && self.recommended_state.is_some()
            && self.final_test.as_ref().map_or(true, |t| t.works)
    }
}

async fn test_state(suspender: &dyn Suspender, state: SleepState, duration: Duration) -> SuspendTest {
    info!("Testing '{}' sleep state for {:?}...", state, duration);
    match suspender.suspend(state, duration).await {
        Ok(()) => {
            info!("'{}' sleep state works", state);
            SuspendTest {
                state,
                works: true,
                error: None,
            }
        }
        Err(e) => {
            warn!("Failed to use '{}' sleep state: {}", state, e);
            SuspendTest {
                state,
                works: false,
                error: Some(e.to_string()),
            }
        }
    }
}

/// Probe the host. With `test_duration`, every recognized sleep state is
/// exercised through `suspender` and the recommended one is confirmed with a
/// longer suspend of `FINAL_TEST_DURATION`; the machine really sleeps each time.
pub async fn run_diagnostic(
    probe: &dyn HostProbe,
    options: &AppOptions,
    suspender: &dyn Suspender,
    test_duration: Option<Duration>,
) -> DiagnosticReport {
    let sleep_states = probe.sleep_states().await;
    if sleep_states.is_empty() {
        warn!("No sleep states found. This system may not support any low-power modes.");
    }
    let recognized = recognized_states(&sleep_states);
    if !sleep_states.is_empty() && recognized.is_empty() {
        warn!(
            "None of the known low-power states are available: {:?}",
            sleep_states
        );
    }

    let available_backends = discover_backends(probe, options.camera_method).await;
    let (selected_backend, selection_error) =
        match select_backend(probe, options.backend, options.camera_method).await {
            Ok(kind) => (Some(kind), None),
            Err(e) => (None, Some(e.to_string())),
        };

    let mut suspend_tests = Vec::new();
    if let Some(duration) = test_duration {
        for state in &recognized {
            suspend_tests.push(test_state(suspender, *state, duration).await);
        }
    }

    let recommended_state = if test_duration.is_some() {
        suspend_tests.iter().find(|t| t.works).map(|t| t.state)
    } else {
        recognized.first().copied()
    };

    let final_test = match (test_duration, recommended_state) {
        (Some(_), Some(state)) => {
            info!("Running final test with '{}'", state);
            Some(test_state(suspender, state, FINAL_TEST_DURATION).await)
        }
        _ => None,
    };

    DiagnosticReport {
        version: version_info(),
        host_name: sysinfo::System::host_name(),
        sleep_states,
        recognized_states: recognized,
        available_backends,
        selected_backend,
        selection_error,
        suspend_tests,
        recommended_state,
        final_test,
    }
}

//! Capture worker: capture, idle, repeat

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use chrono::NaiveDateTime;
use futures::FutureExt;
use tracing::{info, warn};

use crate::hardware::camera::CaptureBackend;
use crate::hardware::power::{IdleOutcome, IdleStrategy};
use crate::models::capture::{CaptureResult, IdleState, LoopState, LoopSummary};
use crate::storage::layout::StorageLayout;

/// Capture worker options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Time spent idling between two captures
    pub interval: Duration,

    /// Stop after this many captures; runs until interrupted when `None`
    pub max_cycles: Option<u64>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            max_cycles: None,
        }
    }
}

/// Run the capture worker.
///
/// A capture in progress always finishes; the shutdown signal is checked
/// between steps and cuts an idle wait short.
pub async fn run<C>(
    options: &Options,
    layout: &StorageLayout,
    backend: &dyn CaptureBackend,
    idle: &dyn IdleStrategy,
    clock: C,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) -> LoopSummary
where
    C: Fn() -> NaiveDateTime,
{
    info!("Capture worker starting...");

    let mut state = LoopState::default();
    let mut summary = LoopSummary::default();

    loop {
        if (&mut shutdown_signal).now_or_never().is_some() {
            info!("Capture worker shutting down...");
            break;
        }

        let (next, result) = run_cycle(state, layout, backend, clock()).await;
        state = next;
        summary.cycles = state.cycle;
        if result.success {
            summary.captured += 1;
        } else {
            summary.failed += 1;
        }

        if options.max_cycles.is_some_and(|max| state.cycle >= max) {
            info!("Completed {} cycle(s), stopping", state.cycle);
            break;
        }

        if (&mut shutdown_signal).now_or_never().is_some() {
            info!("Capture worker shutting down...");
            break;
        }

        state = enter_low_power(state);
        info!("Waiting {} seconds until next capture...", options.interval.as_secs());

        tokio::select! {
            biased;
            _ = &mut shutdown_signal => {
                info!("Capture worker shutting down...");
                break;
            }
            outcome = idle.idle(options.interval) => {
                match outcome {
                    IdleOutcome::Slept => {}
                    IdleOutcome::Suspended(sleep_state) => info!("Woke from '{}' suspend", sleep_state),
                    IdleOutcome::Degraded(reason) => warn!("Idle fell back to a timed wait: {}", reason),
                }
            }
        }
    }

    exit_low_power(state);
    info!(
        "Capture worker stopped after {} cycle(s): {} captured, {} failed",
        summary.cycles, summary.captured, summary.failed
    );
    summary
}

async fn run_cycle(
    state: LoopState,
    layout: &StorageLayout,
    backend: &dyn CaptureBackend,
    now: NaiveDateTime,
) -> (LoopState, CaptureResult) {
    let mut state = exit_low_power(state);
    state.cycle += 1;

    info!("--- Cycle #{} ---", state.cycle);
    info!("Current time: {}", now.format("%Y-%m-%d %H:%M:%S"));

    let result = match layout.prepare(now).await {
        Ok(request) => {
            info!("Capturing image to: {}", request.target_path().display());
            backend.invoke(&request).await
        }
        Err(e) => CaptureResult::failed(format!("unable to create image directory: {}", e)),
    };

    if result.success {
        info!("Image captured successfully");
    } else {
        warn!(
            cycle = state.cycle,
            "Error capturing image with {}: {}",
            backend.name(),
            result.diagnostic.as_deref().unwrap_or("unknown error")
        );
    }

    (state, result)
}

fn enter_low_power(mut state: LoopState) -> LoopState {
    if state.idle_state == IdleState::Active {
        info!("Entering low power mode...");
        state.idle_state = IdleState::Suspended;
    }
    state
}

fn exit_low_power(mut state: LoopState) -> LoopState {
    if state.idle_state == IdleState::Suspended {
        info!("Exiting low power mode...");
        state.idle_state = IdleState::Active;
    }
    state
}

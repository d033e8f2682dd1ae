//! Main application run loop

use std::future::Future;

use chrono::Local;
use tracing::info;

use crate::app::options::AppOptions;
use crate::app::select::select;
use crate::errors::AgentError;
use crate::hardware::power::{apply_power_saving, Suspender};
use crate::hardware::probe::HostProbe;
use crate::models::capture::LoopSummary;
use crate::workers::capture;

/// Run the capture agent until `shutdown_signal` fires or the cycle limit is
/// reached. Fails before the first capture when no backend can be selected.
pub async fn run(
    options: &AppOptions,
    probe: &dyn HostProbe,
    suspender: Box<dyn Suspender>,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<LoopSummary, AgentError> {
    info!("Initializing camera system...");

    let selection = select(probe, options, suspender).await?;
    options.storage.setup().await?;

    if options.power_save {
        apply_power_saving().await;
        info!("Power-saving mode activated");
    }

    info!(
        "Camera system initialized. Using {} for captures.",
        selection.backend.name()
    );
    info!(
        "Images will be captured every {} seconds into {}",
        options.capture_worker.interval.as_secs(),
        options.storage.base_dir().display()
    );

    let summary = capture::run(
        &options.capture_worker,
        &options.storage,
        selection.backend.as_ref(),
        selection.idle.as_ref(),
        || Local::now().naive_local(),
        Box::pin(shutdown_signal),
    )
    .await;

    info!("Camera system shut down");
    Ok(summary)
}

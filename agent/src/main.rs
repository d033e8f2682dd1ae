//! Picam Agent - Entry Point
//!
//! Captures a still image every interval into `./images/<YYYYMMDD>/` and
//! idles (timed sleep or RTC suspend) in between.

use std::env;
use std::process::ExitCode;
use picam::app::diagnostic::{run_diagnostic, DiagnosticRequest};
use picam::app::run::run;
use picam::hardware::power::RtcWake;
use picam::hardware::probe::SystemProbe;
use picam::logs::{init_logging, LogOptions};
use picam::storage::settings::Settings;
use picam::utils::{parse_cli_args, version_info};

use tracing::{error, info};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli_args = parse_cli_args(env::args().skip(1));

    // Print version and exit
    if cli_args.contains_key("version") {
        match serde_json::to_string_pretty(&version_info()) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Failed to render version info: {}", e),
        }
        return ExitCode::SUCCESS;
    }

    let settings = match Settings::resolve(&cli_args).await {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Initialize logging
    let log_options = LogOptions {
        log_level: settings.log_level.clone(),
        json_format: settings.log_json,
        log_dir: settings.log_dir.clone(),
        ..Default::default()
    };
    let _log_guard = match init_logging(log_options) {
        Ok(guard) => guard,
        Err(e) => {
            println!("Failed to initialize logging: {e}");
            None
        }
    };

    let options = match settings.to_options() {
        Ok(options) => options,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let probe = SystemProbe::new(options.capture.python.clone());

    let diagnostic = match DiagnosticRequest::from_cli(&cli_args) {
        Ok(diagnostic) => diagnostic,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Run diagnostics
    if let Some(request) = diagnostic {
        let report =
            run_diagnostic(&probe, &options, &RtcWake::default(), request.test_duration).await;
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{}", json),
            Err(e) => error!("Failed to render diagnostic report: {}", e),
        }
        return if report.is_healthy() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        };
    }

    info!("Running picam agent with options: {:?}", options);
    match run(&options, &probe, Box::new(RtcWake::default()), await_shutdown_signal()).await {
        Ok(summary) => {
            info!(
                "Finished: {} cycle(s), {} captured, {} failed",
                summary.cycles, summary.captured, summary.failed
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            if e.is_fatal() {
                error!("Cannot start capture loop: {}", e);
            } else {
                error!("Failed to run the agent: {}", e);
            }
            ExitCode::FAILURE
        }
    }
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
                _ => {
                    error!("Failed to install signal handlers, falling back to Ctrl+C");
                    let _ = tokio::signal::ctrl_c().await;
                    info!("Ctrl+C received, shutting down...");
                    return;
                }
            };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down...");
            }
            _ = sigint.recv() => {
                info!("SIGINT received, shutting down...");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl+C received, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Ctrl+C received, shutting down...");
    }
}

//! Startup wiring: selection, storage setup and the capture loop together

use picam::app::options::AppOptions;
use picam::app::run::run;
use picam::filesys::dir::Dir;
use picam::hardware::camera::{CameraMethod, CaptureOptions};
use picam::hardware::probe::StaticProbe;
use picam::storage::layout::StorageLayout;
use picam::workers::capture;

use crate::support::FailingSuspender;

fn one_shot(images: &Dir, python: &str) -> AppOptions {
    AppOptions {
        camera_method: CameraMethod::Python,
        capture: CaptureOptions {
            python: python.to_string(),
            ..Default::default()
        },
        storage: StorageLayout::new(images.path()),
        capture_worker: capture::Options {
            max_cycles: Some(1),
            ..Default::default()
        },
        ..Default::default()
    }
}

// `true` accepts and ignores the capture script arguments
#[cfg(unix)]
#[tokio::test]
async fn test_one_shot_run_captures_once() {
    let root = Dir::create_temp_dir("picam-run").await.unwrap();
    let images = root.subdir("images");
    let probe = StaticProbe::new().with_python_module("picamera2");

    let summary = run(
        &one_shot(&images, "true"),
        &probe,
        Box::new(FailingSuspender),
        std::future::pending::<()>(),
    )
    .await
    .unwrap();

    assert_eq!(summary.cycles, 1);
    assert_eq!(summary.captured, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(images.list_dirs().await.unwrap().len(), 1);

    root.delete().await.unwrap();
}

#[tokio::test]
async fn test_one_shot_run_with_broken_tool_still_returns() {
    let root = Dir::create_temp_dir("picam-run-broken").await.unwrap();
    let images = root.subdir("images");
    let probe = StaticProbe::new().with_python_module("picamera");

    let summary = run(
        &one_shot(&images, "picam-no-such-python"),
        &probe,
        Box::new(FailingSuspender),
        std::future::pending::<()>(),
    )
    .await
    .unwrap();

    assert_eq!(summary.cycles, 1);
    assert_eq!(summary.captured, 0);
    assert_eq!(summary.failed, 1);
    assert!(images.exists().await);

    root.delete().await.unwrap();
}

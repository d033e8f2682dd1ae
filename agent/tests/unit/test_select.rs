//! Backend and idle strategy selection tests

use std::time::Duration;

use picam::app::options::AppOptions;
use picam::app::run::run;
use picam::app::select::{discover_backends, select, select_backend};
use picam::errors::AgentError;
use picam::filesys::dir::Dir;
use picam::hardware::camera::{BackendKind, CameraMethod};
use picam::hardware::power::IdleMode;
use picam::hardware::probe::StaticProbe;
use picam::storage::layout::StorageLayout;

use crate::support::{FailingSuspender, SleepingSuspender};

#[tokio::test]
async fn test_libcamera_preferred_over_webcam() {
    let probe = StaticProbe::new()
        .with_executable("fswebcam")
        .with_executable("libcamera-still");

    let kind = select_backend(&probe, None, CameraMethod::Auto).await.unwrap();
    assert_eq!(kind, BackendKind::LibcameraStill);
}

#[tokio::test]
async fn test_selection_is_deterministic() {
    let probe = StaticProbe::new()
        .with_executable("raspistill")
        .with_executable("fswebcam")
        .with_python_module("picamera2");

    let first = select_backend(&probe, None, CameraMethod::Auto).await.unwrap();
    for _ in 0..5 {
        assert_eq!(select_backend(&probe, None, CameraMethod::Auto).await.unwrap(), first);
    }
    assert_eq!(first, BackendKind::Raspistill);
}

#[tokio::test]
async fn test_full_preference_order() {
    let probe = StaticProbe::new().with_python_module("picamera");
    assert_eq!(
        select_backend(&probe, None, CameraMethod::Auto).await.unwrap(),
        BackendKind::Picamera
    );

    let probe = probe.with_executable("fswebcam");
    assert_eq!(
        select_backend(&probe, None, CameraMethod::Auto).await.unwrap(),
        BackendKind::Fswebcam
    );

    let probe = probe.with_executable("raspistill");
    assert_eq!(
        select_backend(&probe, None, CameraMethod::Auto).await.unwrap(),
        BackendKind::Raspistill
    );

    let probe = probe.with_executable("libcamera-still");
    assert_eq!(
        discover_backends(&probe, CameraMethod::Auto).await,
        BackendKind::PREFERENCE.to_vec()
    );
}

#[tokio::test]
async fn test_forced_backend_wins_when_present() {
    let probe = StaticProbe::new()
        .with_executable("libcamera-still")
        .with_executable("fswebcam");

    let kind = select_backend(&probe, Some(BackendKind::Fswebcam), CameraMethod::Auto)
        .await
        .unwrap();
    assert_eq!(kind, BackendKind::Fswebcam);
}

#[tokio::test]
async fn test_forced_backend_missing_falls_back() {
    let probe = StaticProbe::new().with_executable("fswebcam");

    let kind = select_backend(&probe, Some(BackendKind::LibcameraStill), CameraMethod::Auto)
        .await
        .unwrap();
    assert_eq!(kind, BackendKind::Fswebcam);
}

#[tokio::test]
async fn test_camera_method_restricts_candidates() {
    let probe = StaticProbe::new()
        .with_executable("libcamera-still")
        .with_python_module("picamera2");

    assert_eq!(
        select_backend(&probe, None, CameraMethod::Python).await.unwrap(),
        BackendKind::Picamera
    );
    assert_eq!(
        select_backend(&probe, None, CameraMethod::Command).await.unwrap(),
        BackendKind::LibcameraStill
    );

    let probe = StaticProbe::new().with_executable("fswebcam");
    let err = select_backend(&probe, None, CameraMethod::Python).await.unwrap_err();
    assert!(matches!(err, AgentError::NoBackendAvailable(_)));
}

#[tokio::test]
async fn test_python_binding_needs_importable_module() {
    // an interpreter without camera modules does not count as a backend
    let probe = StaticProbe::new().with_python_module("numpy");
    let err = select_backend(&probe, None, CameraMethod::Auto).await.unwrap_err();
    assert!(matches!(err, AgentError::NoBackendAvailable(_)));
}

#[tokio::test]
async fn test_no_backend_is_fatal() {
    let probe = StaticProbe::new().with_sleep_states(&["mem"]);
    let err = select_backend(&probe, None, CameraMethod::Auto).await.unwrap_err();
    assert!(matches!(err, AgentError::NoBackendAvailable(_)));
    assert!(err.is_fatal());
}

#[tokio::test]
async fn test_no_backend_never_starts_loop() {
    let root = Dir::create_temp_dir("picam-nobackend").await.unwrap();
    let images = root.subdir("images");
    let options = AppOptions {
        storage: StorageLayout::new(images.path()),
        ..Default::default()
    };

    let result = run(
        &options,
        &StaticProbe::new(),
        Box::new(FailingSuspender),
        std::future::pending::<()>(),
    )
    .await;

    assert!(matches!(result, Err(AgentError::NoBackendAvailable(_))));
    assert!(!images.exists().await);

    root.delete().await.unwrap();
}

#[tokio::test]
async fn test_idle_prefers_mem_suspend() {
    let probe = StaticProbe::new()
        .with_executable("libcamera-still")
        .with_sleep_states(&["mem", "disk"]);

    let selection = select(&probe, &AppOptions::default(), Box::new(SleepingSuspender::default()))
        .await
        .unwrap();
    assert_eq!(selection.backend.name(), "libcamera-still");
    assert_eq!(selection.idle.describe(), "rtc suspend (mem)");
}

#[tokio::test]
async fn test_idle_falls_back_to_timer() {
    for states in [&[][..], &["s2idle", "shallow"][..]] {
        let probe = StaticProbe::new()
            .with_executable("raspistill")
            .with_sleep_states(states);

        let selection = select(&probe, &AppOptions::default(), Box::new(FailingSuspender))
            .await
            .unwrap();
        assert_eq!(selection.idle.describe(), "timed sleep");
    }
}

#[tokio::test]
async fn test_idle_mode_sleep_ignores_states() {
    let probe = StaticProbe::new()
        .with_executable("raspistill")
        .with_sleep_states(&["mem"]);
    let options = AppOptions {
        idle_mode: IdleMode::Sleep,
        wake_buffer: Duration::from_secs(1),
        ..Default::default()
    };

    let selection = select(&probe, &options, Box::new(FailingSuspender)).await.unwrap();
    assert_eq!(selection.idle.describe(), "timed sleep");
}

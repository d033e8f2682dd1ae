//! Stubs shared by the integration tests

use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use tokio::sync::oneshot;

use picam::errors::AgentError;
use picam::hardware::camera::CaptureBackend;
use picam::hardware::power::{IdleOutcome, IdleStrategy, SleepState, Suspender};
use picam::models::capture::{CaptureRequest, CaptureResult};

/// Backend that records every path it is asked to write.
/// `fail_every` makes every n-th invocation (1-based) fail.
pub struct RecordingBackend {
    pub paths: Mutex<Vec<PathBuf>>,
    fail_every: Option<usize>,
}

impl RecordingBackend {
    pub fn succeeding() -> Self {
        Self {
            paths: Mutex::new(Vec::new()),
            fail_every: None,
        }
    }

    pub fn failing_every(n: usize) -> Self {
        Self {
            paths: Mutex::new(Vec::new()),
            fail_every: Some(n),
        }
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.paths.lock().unwrap().clone()
    }
}

#[async_trait]
impl CaptureBackend for RecordingBackend {
    fn name(&self) -> &str {
        "recording"
    }

    async fn invoke(&self, request: &CaptureRequest) -> CaptureResult {
        let mut paths = self.paths.lock().unwrap();
        paths.push(request.target_path().to_path_buf());
        match self.fail_every {
            Some(n) if paths.len() % n == 0 => CaptureResult::failed("camera not detected"),
            _ => CaptureResult::ok(),
        }
    }
}

/// Backend that requests shutdown as soon as a capture starts, then takes
/// `duration` to finish it
pub struct StoppingBackend {
    pub finished: AtomicU64,
    duration: Duration,
    shutdown_tx: Mutex<Option<oneshot::Sender<()>>>,
}

impl StoppingBackend {
    pub fn new(duration: Duration) -> (Self, Pin<Box<dyn Future<Output = ()> + Send>>) {
        let (tx, rx) = oneshot::channel();
        let backend = Self {
            finished: AtomicU64::new(0),
            duration,
            shutdown_tx: Mutex::new(Some(tx)),
        };
        let shutdown = Box::pin(async move {
            let _ = rx.await;
        });
        (backend, shutdown)
    }

    pub fn finished(&self) -> u64 {
        self.finished.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CaptureBackend for StoppingBackend {
    fn name(&self) -> &str {
        "stopping"
    }

    async fn invoke(&self, _request: &CaptureRequest) -> CaptureResult {
        let tx = self.shutdown_tx.lock().unwrap().take();
        if let Some(tx) = tx {
            let _ = tx.send(());
        }
        tokio::time::sleep(self.duration).await;
        self.finished.fetch_add(1, Ordering::SeqCst);
        CaptureResult::ok()
    }
}

/// Idle strategy that records requested durations without waiting and fires
/// the shutdown signal after `stop_after` waits
pub struct RecordingIdle {
    pub waits: Mutex<Vec<Duration>>,
    stop_after: usize,
    shutdown_tx: Mutex<Option<oneshot::Sender<()>>>,
}

impl RecordingIdle {
    pub fn stopping_after(
        stop_after: usize,
    ) -> (Self, Pin<Box<dyn Future<Output = ()> + Send>>) {
        let (tx, rx) = oneshot::channel();
        let idle = Self {
            waits: Mutex::new(Vec::new()),
            stop_after,
            shutdown_tx: Mutex::new(Some(tx)),
        };
        let shutdown = Box::pin(async move {
            let _ = rx.await;
        });
        (idle, shutdown)
    }

    pub fn waits(&self) -> Vec<Duration> {
        self.waits.lock().unwrap().clone()
    }
}

#[async_trait]
impl IdleStrategy for RecordingIdle {
    fn describe(&self) -> String {
        "recording".to_string()
    }

    async fn idle(&self, duration: Duration) -> IdleOutcome {
        let mut waits = self.waits.lock().unwrap();
        waits.push(duration);
        if waits.len() >= self.stop_after {
            if let Some(tx) = self.shutdown_tx.lock().unwrap().take() {
                let _ = tx.send(());
            }
        }
        IdleOutcome::Slept
    }
}

/// Suspender that pretends the machine slept for the whole duration
#[derive(Default)]
pub struct SleepingSuspender {
    pub calls: Arc<Mutex<Vec<(SleepState, Duration)>>>,
}

#[async_trait]
impl Suspender for SleepingSuspender {
    async fn suspend(&self, state: SleepState, duration: Duration) -> Result<(), AgentError> {
        self.calls.lock().unwrap().push((state, duration));
        tokio::time::sleep(duration).await;
        Ok(())
    }
}

/// Suspender whose privileged call always fails
pub struct FailingSuspender;

#[async_trait]
impl Suspender for FailingSuspender {
    async fn suspend(&self, _state: SleepState, _duration: Duration) -> Result<(), AgentError> {
        Err(AgentError::SuspendError("sudo: a password is required".to_string()))
    }
}

/// Clock that starts at `start` and moves `step` forward on every call
pub fn stepping_clock(start: NaiveDateTime, step: Duration) -> impl Fn() -> NaiveDateTime {
    let ticks = AtomicU64::new(0);
    let step = chrono::Duration::from_std(step).unwrap();
    move || start + step * ticks.fetch_add(1, Ordering::SeqCst) as i32
}

pub fn at(y: i32, m: u32, d: u32, hh: u32, mm: u32, ss: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(hh, mm, ss)
        .unwrap()
}

/// Log sink for asserting on emitted log lines
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }

    pub fn count(&self, needle: &str) -> usize {
        self.contents().lines().filter(|line| line.contains(needle)).count()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Paused-clock timers fire on millisecond ticks, so allow a little slack
pub fn assert_elapsed(started: tokio::time::Instant, expected: Duration) {
    let elapsed = started.elapsed();
    assert!(
        elapsed >= expected && elapsed < expected + Duration::from_millis(50),
        "expected ~{:?}, waited {:?}",
        expected,
        elapsed
    );
}

//! Per-cycle capture data

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;

/// A single capture attempt: where the image goes and when it was requested
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureRequest {
    target_path: PathBuf,
    timestamp: NaiveDateTime,
}

impl CaptureRequest {
    pub fn new(target_path: impl Into<PathBuf>, timestamp: NaiveDateTime) -> Self {
        Self {
            target_path: target_path.into(),
            timestamp,
        }
    }

    pub fn target_path(&self) -> &Path {
        &self.target_path
    }

    pub fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }
}

/// Outcome of a backend invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureResult {
    pub success: bool,
    pub diagnostic: Option<String>,
}

impl CaptureResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            diagnostic: None,
        }
    }

    pub fn failed(diagnostic: impl Into<String>) -> Self {
        Self {
            success: false,
            diagnostic: Some(diagnostic.into()),
        }
    }
}

/// Power state of the loop between captures
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IdleState {
    #[default]
    Active,
    Suspended,
}

/// State threaded from one cycle into the next
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopState {
    /// Number of cycles started so far (display only)
    pub cycle: u64,

    /// Whether the previous idle step left the loop in low-power mode
    pub idle_state: IdleState,
}

/// Counters reported when the loop stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopSummary {
    pub cycles: u64,
    pub captured: u64,
    pub failed: u64,
}

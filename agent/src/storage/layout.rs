//! Image storage layout
//!
//! Images land in `<root>/<YYYYMMDD>/image_<YYYYMMDD_HHMMSS>.jpg`, one
//! subdirectory per calendar day.

use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use tracing::info;

use crate::errors::AgentError;
use crate::filesys::dir::Dir;
use crate::models::capture::CaptureRequest;

const DAY_FORMAT: &str = "%Y%m%d";
const STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Storage layout for captured images
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLayout {
    /// Base directory for all images
    pub base_dir: PathBuf,
}

impl StorageLayout {
    /// Create a new storage layout
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Get the root image directory
    pub fn root_dir(&self) -> Dir {
        Dir::new(&self.base_dir)
    }

    /// Get the directory holding every capture of `date`
    pub fn day_dir(&self, date: NaiveDate) -> Dir {
        self.root_dir().subdir(&date.format(DAY_FORMAT).to_string())
    }

    /// Get the image path for a capture taken at `timestamp`
    pub fn image_path(&self, timestamp: NaiveDateTime) -> PathBuf {
        let name = format!("image_{}.jpg", timestamp.format(STAMP_FORMAT));
        self.day_dir(timestamp.date()).path().join(name)
    }

    /// Create today's directory if needed and build the request for `timestamp`
    pub async fn prepare(&self, timestamp: NaiveDateTime) -> Result<CaptureRequest, AgentError> {
        let day_dir = self.day_dir(timestamp.date());
        if !day_dir.exists().await {
            info!("Creating new directory for today: {}", day_dir.path().display());
        }
        day_dir.create().await?;
        Ok(CaptureRequest::new(self.image_path(timestamp), timestamp))
    }

    /// Setup the storage layout (create the root directory)
    pub async fn setup(&self) -> Result<(), AgentError> {
        self.root_dir().create().await
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }
}

impl Default for StorageLayout {
    fn default() -> Self {
        Self::new("./images")
    }
}

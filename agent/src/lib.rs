//! Picam Agent Library
//!
//! Interval still-image capture for Raspberry Pi cameras: pick a capture
//! backend and an idle strategy once, then capture, idle, repeat.

pub mod app;
pub mod errors;
pub mod filesys;
pub mod hardware;
pub mod logs;
pub mod models;
pub mod storage;
pub mod utils;
pub mod workers;

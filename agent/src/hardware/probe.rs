//! Host discovery: capture tools, Python camera modules and kernel sleep states

use std::collections::HashSet;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

/// Kernel file listing the supported sleep states
pub const POWER_STATE_FILE: &str = "/sys/power/state";

/// What the selector needs to know about the host
#[async_trait]
pub trait HostProbe: Send + Sync {
    /// Whether `name` resolves to an executable on `PATH`
    async fn has_executable(&self, name: &str) -> bool;

    /// Whether the Python interpreter can import `module`
    async fn has_python_module(&self, module: &str) -> bool;

    /// Sleep states advertised by the kernel, in the kernel's order.
    /// Empty when the list cannot be read.
    async fn sleep_states(&self) -> Vec<String>;
}

/// Probe backed by the real host
#[derive(Debug, Clone)]
pub struct SystemProbe {
    pub power_state_file: PathBuf,
    pub python: String,
}

impl SystemProbe {
    pub fn new(python: impl Into<String>) -> Self {
        Self {
            power_state_file: PathBuf::from(POWER_STATE_FILE),
            python: python.into(),
        }
    }
}

impl Default for SystemProbe {
    fn default() -> Self {
        Self::new("python3")
    }
}

#[async_trait]
impl HostProbe for SystemProbe {
    async fn has_executable(&self, name: &str) -> bool {
        let found = which::which(name).is_ok();
        debug!("Executable {}: {}", name, if found { "found" } else { "missing" });
        found
    }

    async fn has_python_module(&self, module: &str) -> bool {
        let status = Command::new(&self.python)
            .args(["-c", &format!("import {}", module)])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        match status {
            Ok(status) => {
                debug!("Python module {}: import exited with {}", module, status);
                status.success()
            }
            Err(e) => {
                debug!("Unable to run {} to probe {}: {}", self.python, module, e);
                false
            }
        }
    }

    async fn sleep_states(&self) -> Vec<String> {
        match tokio::fs::read_to_string(&self.power_state_file).await {
            Ok(contents) => parse_sleep_states(&contents),
            Err(e) => {
                warn!(
                    "Error reading sleep states from {}: {}",
                    self.power_state_file.display(),
                    e
                );
                Vec::new()
            }
        }
    }
}

/// Split the kernel's whitespace separated state list
pub fn parse_sleep_states(contents: &str) -> Vec<String> {
    contents.split_whitespace().map(str::to_string).collect()
}

/// Fixed answers for tests
#[derive(Debug, Clone, Default)]
pub struct StaticProbe {
    executables: HashSet<String>,
    modules: HashSet<String>,
    sleep_states: Vec<String>,
}

impl StaticProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_executable(mut self, name: &str) -> Self {
        self.executables.insert(name.to_string());
        self
    }

    pub fn with_python_module(mut self, module: &str) -> Self {
        self.modules.insert(module.to_string());
        self
    }

    pub fn with_sleep_states(mut self, states: &[&str]) -> Self {
        self.sleep_states = states.iter().map(|s| s.to_string()).collect();
        self
    }
}

#[async_trait]
impl HostProbe for StaticProbe {
    async fn has_executable(&self, name: &str) -> bool {
        self.executables.contains(name)
    }

    async fn has_python_module(&self, module: &str) -> bool {
        self.modules.contains(module)
    }

    async fn sleep_states(&self) -> Vec<String> {
        self.sleep_states.clone()
    }
}

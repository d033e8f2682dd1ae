//! Idle strategies between captures
//!
//! Hardware suspend goes through `rtcwake`, which programs the RTC alarm and
//! puts the machine to sleep. When that fails the strategy degrades to a timed
//! wait for whatever is left of the interval.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::errors::AgentError;

/// Kernel sleep states the agent knows how to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SleepState {
    Mem,
    Standby,
    Freeze,
    Disk,
}

impl SleepState {
    /// Most power saving first
    pub const PREFERENCE: [SleepState; 4] = [
        SleepState::Mem,
        SleepState::Standby,
        SleepState::Freeze,
        SleepState::Disk,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SleepState::Mem => "mem",
            SleepState::Standby => "standby",
            SleepState::Freeze => "freeze",
            SleepState::Disk => "disk",
        }
    }
}

impl std::fmt::Display for SleepState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Known states present in `available`, in preference order
pub fn recognized_states(available: &[String]) -> Vec<SleepState> {
    SleepState::PREFERENCE
        .into_iter()
        .filter(|state| available.iter().any(|a| a == state.as_str()))
        .collect()
}

/// First preferred state present in `available`
pub fn select_sleep_state(available: &[String]) -> Option<SleepState> {
    recognized_states(available).into_iter().next()
}

/// How the idle mode is chosen
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdleMode {
    /// Suspend when the kernel offers a usable state, otherwise sleep
    #[default]
    Auto,
    /// Always use a timed wait
    Sleep,
    /// Ask for hardware suspend; still degrades to a timed wait
    Suspend,
}

impl std::str::FromStr for IdleMode {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(IdleMode::Auto),
            "sleep" | "timer" => Ok(IdleMode::Sleep),
            "suspend" | "rtcwake" => Ok(IdleMode::Suspend),
            _ => Err(AgentError::ConfigError(format!("Invalid idle mode: {}", s))),
        }
    }
}

/// Privileged "pause the whole machine" directive
#[async_trait]
pub trait Suspender: Send + Sync {
    async fn suspend(&self, state: SleepState, duration: Duration) -> Result<(), AgentError>;
}

/// `rtcwake -m <state> -s <secs>`, through `sudo` unless disabled
#[derive(Debug, Clone)]
pub struct RtcWake {
    pub program: String,
    pub use_sudo: bool,
}

impl RtcWake {
    pub fn command(&self, state: SleepState, duration: Duration) -> Command {
        // rtcwake only takes whole seconds and rejects 0
        let secs = duration.as_secs_f64().ceil().max(1.0) as u64;

        let mut command = if self.use_sudo {
            let mut command = Command::new("sudo");
            command.arg(&self.program);
            command
        } else {
            Command::new(&self.program)
        };
        command
            .args(["-m", state.as_str(), "-s"])
            .arg(secs.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        command
    }
}

impl Default for RtcWake {
    fn default() -> Self {
        Self {
            program: "rtcwake".to_string(),
            use_sudo: true,
        }
    }
}

#[async_trait]
impl Suspender for RtcWake {
    async fn suspend(&self, state: SleepState, duration: Duration) -> Result<(), AgentError> {
        let output = self
            .command(state, duration)
            .output()
            .await
            .map_err(|e| AgentError::SuspendError(format!("failed to run {}: {}", self.program, e)))?;

        if !output.status.success() {
            return Err(AgentError::SuspendError(format!(
                "{} -m {} exited with {}: {}",
                self.program,
                state,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }
}

/// What actually happened during an idle step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdleOutcome {
    /// Plain timed wait
    Slept,
    /// The machine was suspended and woke up
    Suspended(SleepState),
    /// Suspend failed; the rest of the interval was a timed wait
    Degraded(String),
}

/// Waits out the time between two captures
#[async_trait]
pub trait IdleStrategy: Send + Sync {
    fn describe(&self) -> String;

    async fn idle(&self, duration: Duration) -> IdleOutcome;
}

/// Plain countdown timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TimedSleep;

#[async_trait]
impl IdleStrategy for TimedSleep {
    fn describe(&self) -> String {
        "timed sleep".to_string()
    }

    async fn idle(&self, duration: Duration) -> IdleOutcome {
        tokio::time::sleep(duration).await;
        IdleOutcome::Slept
    }
}

/// Hardware suspend with RTC wake-up
pub struct RtcSuspend {
    state: SleepState,
    suspender: Box<dyn Suspender>,
    wake_buffer: Duration,
}

impl RtcSuspend {
    pub fn new(state: SleepState, suspender: Box<dyn Suspender>, wake_buffer: Duration) -> Self {
        Self {
            state,
            suspender,
            wake_buffer,
        }
    }
}

#[async_trait]
impl IdleStrategy for RtcSuspend {
    fn describe(&self) -> String {
        format!("rtc suspend ({})", self.state)
    }

    async fn idle(&self, duration: Duration) -> IdleOutcome {
        let started = Instant::now();
        debug!("Suspending to '{}' for {:?}", self.state, duration);

        match self.suspender.suspend(self.state, duration).await {
            Ok(()) => {
                // the monotonic clock stops while suspended, so trust the RTC
                // alarm instead of topping up from `started`
                tokio::time::sleep(self.wake_buffer).await;
                IdleOutcome::Suspended(self.state)
            }
            Err(e) => {
                warn!("Suspend to '{}' failed, waiting instead: {}", self.state, e);
                let remaining = duration.saturating_sub(started.elapsed());
                tokio::time::sleep(remaining).await;
                IdleOutcome::Degraded(e.to_string())
            }
        }
    }
}

/// Pick the idle strategy from the mode and the kernel's sleep-state list.
/// Never fails: without a usable state the result is a timed sleep.
pub fn select_idle_strategy(
    mode: IdleMode,
    available: &[String],
    suspender: Box<dyn Suspender>,
    wake_buffer: Duration,
) -> Box<dyn IdleStrategy> {
    if mode == IdleMode::Sleep {
        return Box::new(TimedSleep);
    }

    match select_sleep_state(available) {
        Some(state) => Box::new(RtcSuspend::new(state, suspender, wake_buffer)),
        None => {
            if mode == IdleMode::Suspend {
                warn!(
                    "Suspend requested but no usable sleep state in {:?}, using timed sleep",
                    available
                );
            } else {
                info!("No usable sleep state in {:?}, using timed sleep", available);
            }
            Box::new(TimedSleep)
        }
    }
}

/// Best-effort power saving: HDMI off and the `powersave` CPU governor.
/// Nothing here can fail startup.
pub async fn apply_power_saving() {
    match run_privileged(&["tvservice", "-o"]).await {
        Ok(()) => info!("HDMI output disabled"),
        Err(e) => warn!("Could not disable HDMI output: {}", e),
    }

    let mut governed = 0;
    for cpu in 0..4 {
        let governor = format!("/sys/devices/system/cpu/cpu{}/cpufreq/scaling_governor", cpu);
        if !Path::new(&governor).exists() {
            continue;
        }
        let script = format!("echo powersave > {}", governor);
        match run_privileged(&["sh", "-c", &script]).await {
            Ok(()) => governed += 1,
            Err(e) => warn!("Could not set CPU governor for cpu{}: {}", cpu, e),
        }
    }

    if governed > 0 {
        info!("CPU governor set to powersave on {} core(s)", governed);
    } else {
        warn!("Could not set CPU governor");
    }
}

async fn run_privileged(args: &[&str]) -> Result<(), AgentError> {
    let status = Command::new("sudo")
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await?;

    if status.success() {
        Ok(())
    } else {
        Err(AgentError::HardwareError(format!("{} exited with {}", args.join(" "), status)))
    }
}

//! Idle strategy timing tests (tokio paused clock)

use std::time::Duration;

use tokio::time::Instant;

use picam::hardware::power::{
    select_idle_strategy, IdleMode, IdleOutcome, IdleStrategy, RtcSuspend, SleepState, TimedSleep,
};

use crate::support::{assert_elapsed, FailingSuspender, SleepingSuspender};

#[tokio::test(start_paused = true)]
async fn test_timed_sleep_waits_full_duration() {
    let started = Instant::now();
    let outcome = TimedSleep.idle(Duration::from_secs(5)).await;

    assert_eq!(outcome, IdleOutcome::Slept);
    assert_elapsed(started, Duration::from_secs(5));
}

#[tokio::test(start_paused = true)]
async fn test_suspend_adds_wake_buffer() {
    let suspender = SleepingSuspender::default();
    let calls = suspender.calls.clone();
    let idle = RtcSuspend::new(SleepState::Mem, Box::new(suspender), Duration::from_secs(2));

    let started = Instant::now();
    let outcome = idle.idle(Duration::from_secs(5)).await;

    assert_eq!(outcome, IdleOutcome::Suspended(SleepState::Mem));
    assert_elapsed(started, Duration::from_secs(7));
    assert_eq!(
        calls.lock().unwrap().as_slice(),
        &[(SleepState::Mem, Duration::from_secs(5))]
    );
}

#[tokio::test(start_paused = true)]
async fn test_failed_suspend_degrades_to_timed_wait() {
    let idle = RtcSuspend::new(SleepState::Freeze, Box::new(FailingSuspender), Duration::from_secs(2));

    let started = Instant::now();
    let outcome = idle.idle(Duration::from_secs(5)).await;

    match outcome {
        IdleOutcome::Degraded(reason) => assert!(reason.contains("password is required")),
        other => panic!("expected degraded idle, got {:?}", other),
    }
    // no wake buffer: the machine never went down
    assert_elapsed(started, Duration::from_secs(5));
}

#[tokio::test(start_paused = true)]
async fn test_selected_strategy_degrades_every_cycle() {
    let states = vec!["mem".to_string(), "disk".to_string()];
    let idle = select_idle_strategy(
        IdleMode::Auto,
        &states,
        Box::new(FailingSuspender),
        Duration::from_secs(2),
    );
    assert_eq!(idle.describe(), "rtc suspend (mem)");

    let started = Instant::now();
    for _ in 0..3 {
        assert!(matches!(
            idle.idle(Duration::from_secs(5)).await,
            IdleOutcome::Degraded(_)
        ));
    }
    assert_elapsed(started, Duration::from_secs(15));
}

#[test]
fn test_suspend_mode_without_states_is_not_an_error() {
    let idle = select_idle_strategy(
        IdleMode::Suspend,
        &[],
        Box::new(FailingSuspender),
        Duration::from_secs(2),
    );
    assert_eq!(idle.describe(), "timed sleep");
}

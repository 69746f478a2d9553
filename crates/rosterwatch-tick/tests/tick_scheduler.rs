//! Integration tests for the fixed-period tick scheduler.
//!
//! Uses `start_paused = true` to control time deterministically:
//! `sleep_until` resolves as soon as the runtime auto-advances the clock.

use std::time::Duration;

use rosterwatch_tick::{TickConfig, TickScheduler};
use tokio::time::Instant;

// =========================================================================
// Helpers
// =========================================================================

fn every_10s() -> TickConfig {
    TickConfig::every(Duration::from_secs(10))
}

/// The paused clock rounds deadlines up to the next millisecond.
#[track_caller]
fn assert_elapsed(start: Instant, expected: Duration) {
    let elapsed = start.elapsed();
    assert!(
        elapsed >= expected && elapsed <= expected + Duration::from_millis(1),
        "elapsed {elapsed:?}, expected {expected:?}"
    );
}

// =========================================================================
// TickConfig
// =========================================================================

#[test]
fn test_default_config_is_disabled() {
    let cfg = TickConfig::default();
    assert!(!cfg.is_enabled());
    assert_eq!(cfg.initial_delay, None);
}

#[test]
fn test_immediate_sets_zero_initial_delay() {
    let cfg = every_10s().immediate();
    assert_eq!(cfg.initial_delay, Some(Duration::ZERO));
}

#[test]
fn test_scheduler_initial_state() {
    let s = TickScheduler::new(every_10s());
    assert_eq!(s.tick_count(), 0);
    assert_eq!(s.period(), Duration::from_secs(10));
    assert!(!s.is_disabled());
}

// =========================================================================
// Tick firing
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_first_tick_after_one_period() {
    let start = Instant::now();
    let mut s = TickScheduler::new(every_10s());

    let info = s.wait_for_tick().await;

    assert_eq!(info.tick, 1);
    assert!(!info.overrun);
    assert_elapsed(start, Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn test_immediate_first_tick_fires_at_once() {
    let start = Instant::now();
    let mut s = TickScheduler::new(every_10s().immediate());

    s.wait_for_tick().await;

    assert_elapsed(start, Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_multiple_ticks_increment_monotonically() {
    let start = Instant::now();
    let mut s = TickScheduler::new(every_10s());

    for expected in 1..=5 {
        let info = s.wait_for_tick().await;
        assert_eq!(info.tick, expected);
    }
    assert_eq!(s.tick_count(), 5);
    assert_elapsed(start, Duration::from_secs(50));
}

#[tokio::test(start_paused = true)]
async fn test_jitter_stays_within_bound() {
    let start = Instant::now();
    let mut s = TickScheduler::new(TickConfig {
        initial_jitter: Duration::from_secs(2),
        ..every_10s()
    });

    s.wait_for_tick().await;

    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_secs(10));
    assert!(elapsed < Duration::from_secs(12));
}

// =========================================================================
// Disabled mode pends forever
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_zero_period_never_fires() {
    let mut s = TickScheduler::new(TickConfig::default());
    assert!(s.is_disabled());

    let result = tokio::time::timeout(Duration::from_secs(3600), s.wait_for_tick()).await;
    assert!(result.is_err(), "disabled scheduler should pend forever");
}

// =========================================================================
// Overruns
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_wait_for_tick_after_stall_skips_missed_periods() {
    let mut s = TickScheduler::new(every_10s());
    s.wait_for_tick().await;

    // A 25 s stall: the tick due at 20 s fires at 35 s.
    tokio::time::advance(Duration::from_secs(25)).await;
    let info = s.wait_for_tick().await;

    assert!(info.overrun);
    assert_eq!(info.ticks_skipped, 1);
    assert_eq!(info.tick, 2);

    // The schedule restarts from now rather than bursting.
    let before = Instant::now();
    s.wait_for_tick().await;
    assert_elapsed(before, Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn test_small_delay_is_not_an_overrun() {
    let mut s = TickScheduler::new(every_10s());
    s.wait_for_tick().await;

    tokio::time::advance(Duration::from_millis(10_500)).await;
    let info = s.wait_for_tick().await;

    assert!(!info.overrun);
    assert_eq!(info.ticks_skipped, 0);
}

// =========================================================================
// Integration: select! loop pattern (mirrors the poll scheduler)
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_select_loop_with_two_timers() {
    let mut query = TickScheduler::new(TickConfig::every(Duration::from_secs(10)));
    let mut render = TickScheduler::new(TickConfig::every(Duration::from_secs(20)));
    let (tx, mut rx) = tokio::sync::mpsc::channel::<&str>(1);

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(65)).await;
        tx.send("stop").await.ok();
    });

    let (mut queries, mut renders) = (0u64, 0u64);
    loop {
        tokio::select! {
            Some(cmd) = rx.recv() => {
                assert_eq!(cmd, "stop");
                break;
            }
            info = query.wait_for_tick() => {
                queries += 1;
                assert_eq!(info.tick, queries);
            }
            info = render.wait_for_tick() => {
                renders += 1;
                assert_eq!(info.tick, renders);
            }
        }
    }

    assert_eq!(queries, 6);
    assert_eq!(renders, 3);
}

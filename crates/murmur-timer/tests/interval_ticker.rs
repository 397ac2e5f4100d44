//! Integration tests for the interval ticker.
//!
//! Uses `tokio::time::pause()` to control time deterministically.
//! All tests run with auto-advanced time so `sleep_until` resolves
//! instantly when the clock advances.

use std::time::Duration;

use murmur_timer::{Ticker, TickerConfig};

// =========================================================================
// Helpers
// =========================================================================

fn config_100ms() -> TickerConfig {
    TickerConfig {
        initial_jitter_us: 0,
        ..TickerConfig::every(Duration::from_millis(100))
    }
}

// =========================================================================
// TickerConfig
// =========================================================================

#[test]
fn test_default_config_is_disabled() {
    let cfg = TickerConfig::default();
    assert_eq!(cfg.period, None);
}

#[test]
fn test_every_sets_period() {
    let cfg = TickerConfig::every(Duration::from_secs(1));
    assert_eq!(cfg.period, Some(Duration::from_secs(1)));
}

// =========================================================================
// Ticker creation and accessors
// =========================================================================

#[test]
fn test_ticker_initial_state() {
    let t = Ticker::new(config_100ms());
    assert_eq!(t.count(), 0);
    assert_eq!(t.period(), Some(Duration::from_millis(100)));
    assert!(!t.is_disabled());
}

#[test]
fn test_disabled_ticker_state() {
    let t = Ticker::disabled();
    assert!(t.is_disabled());
    assert_eq!(t.period(), None);
}

// =========================================================================
// Tick firing
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_tick_fires_and_increments() {
    let mut t = Ticker::new(config_100ms());

    let tick = t.tick().await;
    assert_eq!(tick.number, 1);
    assert!(!tick.late);
    assert_eq!(tick.missed, 0);
    assert_eq!(t.count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_multiple_ticks_increment_monotonically() {
    let mut t = Ticker::new(config_100ms());

    for expected in 1..=5 {
        let tick = t.tick().await;
        assert_eq!(tick.number, expected);
    }
    assert_eq!(t.count(), 5);
}

// =========================================================================
// Disabled mode pends forever
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_disabled_ticker_never_fires() {
    let mut t = Ticker::disabled();

    let result = tokio::time::timeout(Duration::from_secs(5), t.tick()).await;
    assert!(result.is_err(), "disabled ticker should pend forever");
}

// =========================================================================
// Integration: select! loop pattern (mirrors heartbeat loop usage)
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_select_loop_pattern() {
    let mut t = Ticker::new(config_100ms());

    let (tx, mut rx) = tokio::sync::mpsc::channel::<&str>(10);

    // Three ticks fire, then a "stop" command arrives.
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(320)).await;
        tx.send("stop").await.ok();
    });

    let mut fired = 0u64;
    loop {
        tokio::select! {
            Some(cmd) = rx.recv() => {
                assert_eq!(cmd, "stop");
                break;
            }
            tick = t.tick() => {
                fired += 1;
                assert_eq!(tick.number, fired);
            }
        }
    }

    assert!(fired >= 3, "expected at least 3 ticks, got {fired}");
}

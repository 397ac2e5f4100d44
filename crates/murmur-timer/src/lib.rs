//! Interval ticker for Murmur.
//!
//! Drives the periodic work in the system: the client's heartbeat
//! transmit loop and the server's liveness sweep. One [`Ticker`] per
//! loop.
//!
//! # Disabled mode
//!
//! A ticker built with [`Ticker::disabled`] pends forever. Tests use
//! this to switch heartbeats off for a client so eviction paths can be
//! exercised without racing a real timer.
//!
//! # Integration
//!
//! The ticker is designed to sit inside a `tokio::select!` loop:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         result = socket.recv_segment() => { /* handle segment */ }
//!         tick = ticker.tick() => { /* heartbeat or sweep */ }
//!     }
//! }
//! ```

use std::time::Duration;

use rand::Rng;
use tokio::time::{self, Instant as TokioInstant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for a [`Ticker`].
#[derive(Debug, Clone)]
pub struct TickerConfig {
    /// Time between ticks. `None` disables the ticker entirely.
    pub period: Option<Duration>,
    /// Random jitter (0–max µs) added before the *first* tick so that
    /// many clients started at the same instant do not heartbeat in
    /// lockstep.
    pub initial_jitter_us: u64,
}

impl Default for TickerConfig {
    fn default() -> Self {
        Self {
            period: None,
            initial_jitter_us: 2_000, // 0–2 ms default jitter
        }
    }
}

impl TickerConfig {
    /// A config that fires every `period`.
    pub fn every(period: Duration) -> Self {
        Self {
            period: Some(period),
            ..Default::default()
        }
    }

    /// A config whose ticker never fires.
    pub fn disabled() -> Self {
        Self {
            period: None,
            ..Default::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Tick info
// ---------------------------------------------------------------------------

/// Information about a fired tick, returned by [`Ticker::tick`].
#[derive(Debug, Clone)]
pub struct Tick {
    /// Monotonically increasing tick number (starts at 1).
    pub number: u64,
    /// `true` if this tick fired noticeably late.
    pub late: bool,
    /// How many whole periods were missed before this tick (0 in
    /// normal operation).
    pub missed: u64,
}

// ---------------------------------------------------------------------------
// Ticker
// ---------------------------------------------------------------------------

/// Fires at a fixed period inside a `select!` loop.
///
/// When a tick fires late (the task was busy past the deadline), the
/// missed periods are skipped and the next tick is scheduled from now.
/// Periodic maintenance work like heartbeats has no use for catch-up
/// bursts.
pub struct Ticker {
    period: Option<Duration>,
    count: u64,
    /// When the next tick should fire.
    next: Option<TokioInstant>,
}

impl Ticker {
    /// Creates a ticker from config. The first tick is scheduled with
    /// optional jitter.
    pub fn new(config: TickerConfig) -> Self {
        let next = config.period.map(|p| {
            let jitter = if config.initial_jitter_us > 0 {
                let us = rand::rng().random_range(0..config.initial_jitter_us);
                Duration::from_micros(us)
            } else {
                Duration::ZERO
            };
            TokioInstant::now() + p + jitter
        });

        match config.period {
            None => debug!("ticker created disabled"),
            Some(p) => debug!(period_ms = p.as_millis() as u64, "ticker created"),
        }

        Self {
            period: config.period,
            count: 0,
            next,
        }
    }

    /// Creates a ticker that fires every `period` with default jitter.
    pub fn every(period: Duration) -> Self {
        Self::new(TickerConfig::every(period))
    }

    /// Creates a ticker that never fires.
    pub fn disabled() -> Self {
        Self::new(TickerConfig::disabled())
    }

    /// Waits until the next tick is due.
    ///
    /// On a disabled ticker this future pends forever — it will never
    /// resolve on its own, but `tokio::select!` will still process
    /// other branches.
    pub async fn tick(&mut self) -> Tick {
        let (next, period) = match (self.next, self.period) {
            (Some(next), Some(period)) => (next, period),
            _ => {
                // Never completes — select! handles other branches.
                std::future::pending::<()>().await;
                unreachable!()
            }
        };

        time::sleep_until(next).await;

        let now = TokioInstant::now();
        self.count += 1;

        let late_by = now.saturating_duration_since(next);
        let late = late_by > period / 10; // >10% past the deadline
        let mut missed = 0u64;
        if late {
            missed = late_by.as_nanos() as u64 / period.as_nanos() as u64;
            if missed > 0 {
                warn!(
                    tick = self.count,
                    missed,
                    late_ms = late_by.as_secs_f64() * 1000.0,
                    "tick fired late, skipping ahead"
                );
            }
        }

        // Schedule from now, not from the missed deadline.
        self.next = Some(now + period);

        trace!(tick = self.count, late, "tick fired");

        Tick {
            number: self.count,
            late,
            missed,
        }
    }

    /// How many ticks have fired.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// The configured period, or `None` when disabled.
    pub fn period(&self) -> Option<Duration> {
        self.period
    }

    /// Whether this ticker will never fire.
    pub fn is_disabled(&self) -> bool {
        self.period.is_none()
    }
}

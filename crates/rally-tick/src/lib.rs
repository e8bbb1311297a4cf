//! Fixed-timestep tick clock for Rally.
//!
//! Paces one match loop at a fixed rate (1–128 Hz, 20 Hz by default) with
//! overrun handling and budget monitoring. The clock only decides *when* a
//! tick fires; the `dt` it reports is always the configured interval, never
//! measured wall-clock time, so the simulation stays reproducible.
//!
//! # Integration
//!
//! The clock sits inside a room's `tokio::select!` loop next to its stop
//! signal:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         _ = stop.changed() => break,
//!         info = clock.wait_for_tick() => {
//!             let snapshot = room.advance(info.dt);
//!             clock.record_tick_end();
//!         }
//!     }
//! }
//! ```

use std::time::{Duration, Instant};

use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::time::{self, Instant as TokioInstant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// What to do when the loop wakes up late.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum TickPolicy {
    /// Forget the missed deadlines and schedule the next tick from now.
    #[default]
    Skip,
    /// Fire up to `max_catchup` missed ticks back-to-back, then fall back
    /// to skipping. Keeps the number of simulated ticks closer to wall time.
    CatchUp { max_catchup: u32 },
}

/// Configuration for a [`TickClock`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TickConfig {
    /// Tick rate in Hz.
    pub tick_rate_hz: u32,
    /// Overrun handling policy.
    pub policy: TickPolicy,
    /// Fraction of the tick budget (0.0–1.0) above which a warning is logged.
    pub budget_warn_threshold: f64,
    /// Fraction of the tick budget above which a critical warning is logged.
    pub budget_critical_threshold: f64,
    /// Collect per-tick timing metrics.
    pub metrics_enabled: bool,
    /// Random delay (0–max µs) added to the first tick so rooms activated
    /// at the same instant don't all wake on the same deadline.
    pub initial_jitter_us: u64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: TickConfig::DEFAULT_TICK_RATE_HZ,
            policy: TickPolicy::default(),
            budget_warn_threshold: 0.80,
            budget_critical_threshold: 1.0,
            metrics_enabled: true,
            initial_jitter_us: 2_000,
        }
    }
}

impl TickConfig {
    /// Reference match rate.
    pub const DEFAULT_TICK_RATE_HZ: u32 = 20;
    /// Maximum supported tick rate.
    pub const MAX_TICK_RATE_HZ: u32 = 128;

    /// Config for a specific rate with default everything else.
    pub fn with_rate(tick_rate_hz: u32) -> Self {
        Self {
            tick_rate_hz,
            ..Default::default()
        }
    }

    /// Clamp out-of-range values so the config is safe to use.
    ///
    /// Called by [`TickClock::new`]. Rules:
    /// - `tick_rate_hz` clamped to `1..=MAX_TICK_RATE_HZ`.
    /// - Thresholds clamped to `0.0..=1.0`, warn ≤ critical.
    pub fn validated(mut self) -> Self {
        if self.tick_rate_hz == 0 {
            warn!("tick_rate_hz is 0; match loops need a fixed clock, using 1 Hz");
            self.tick_rate_hz = 1;
        }
        if self.tick_rate_hz > Self::MAX_TICK_RATE_HZ {
            warn!(
                rate = self.tick_rate_hz,
                max = Self::MAX_TICK_RATE_HZ,
                "tick_rate_hz exceeds maximum, clamping"
            );
            self.tick_rate_hz = Self::MAX_TICK_RATE_HZ;
        }
        self.budget_warn_threshold = self.budget_warn_threshold.clamp(0.0, 1.0);
        self.budget_critical_threshold = self.budget_critical_threshold.clamp(0.0, 1.0);
        if self.budget_warn_threshold > self.budget_critical_threshold {
            self.budget_warn_threshold = self.budget_critical_threshold;
        }
        self
    }

    /// The fixed interval between ticks (and the `dt` handed to the
    /// simulation). A zero rate is treated as 1 Hz.
    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate_hz.max(1) as f64)
    }
}

// ---------------------------------------------------------------------------
// Tick info
// ---------------------------------------------------------------------------

/// Returned by [`TickClock::wait_for_tick`] each time a tick fires.
#[derive(Debug, Clone)]
pub struct TickInfo {
    /// How many ticks this clock has fired, starting at 1.
    pub tick: u64,
    /// Always the configured interval.
    pub dt: Duration,
    /// `true` if this tick fired more than 10% late.
    pub overrun: bool,
    /// Deadlines abandoned because of the overrun (0 normally).
    pub ticks_skipped: u64,
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// Runtime metrics, updated by [`TickClock::record_tick_end`].
#[derive(Debug, Clone, Default)]
pub struct TickMetrics {
    pub total_ticks: u64,
    pub total_overruns: u64,
    pub total_skipped: u64,
    /// Exponential moving average of tick work time (α = 0.1).
    pub avg_tick_time: Duration,
    pub max_tick_time: Duration,
    /// Last tick's work time as a fraction of the budget. >1.0 is an overrun.
    pub budget_utilization: f64,
}

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Fixed-timestep clock. One per match loop.
pub struct TickClock {
    config: TickConfig,
    interval: Duration,
    tick_count: u64,
    /// Deadline of the next tick, on Tokio's clock so tests can pause time.
    next_tick: TokioInstant,
    /// Wall-clock start of the current tick's work.
    tick_start: Option<Instant>,
    metrics: TickMetrics,
}

impl TickClock {
    /// Creates a clock whose first tick is due one interval (plus jitter)
    /// from now.
    pub fn new(config: TickConfig) -> Self {
        let config = config.validated();
        let interval = config.interval();

        let jitter = if config.initial_jitter_us > 0 {
            let us = rand::rng().random_range(0..config.initial_jitter_us);
            Duration::from_micros(us)
        } else {
            Duration::ZERO
        };

        debug!(
            rate_hz = config.tick_rate_hz,
            budget_ms = interval.as_secs_f64() * 1000.0,
            policy = ?config.policy,
            "tick clock created"
        );

        Self {
            next_tick: TokioInstant::now() + interval + jitter,
            config,
            interval,
            tick_count: 0,
            tick_start: None,
            metrics: TickMetrics::default(),
        }
    }

    /// Creates a clock for a specific rate with default settings.
    pub fn with_rate(tick_rate_hz: u32) -> Self {
        Self::new(TickConfig::with_rate(tick_rate_hz))
    }

    /// Waits until the next tick is due.
    ///
    /// Cancel-safe: dropping the future before it resolves (e.g. because
    /// another `select!` branch won) leaves the deadline untouched.
    pub async fn wait_for_tick(&mut self) -> TickInfo {
        let deadline = self.next_tick;
        time::sleep_until(deadline).await;

        let now = TokioInstant::now();
        self.tick_count += 1;
        self.tick_start = Some(Instant::now());

        let late_by = now.saturating_duration_since(deadline);
        let overrun = late_by > self.interval / 10;
        let behind = (late_by.as_nanos() / self.interval.as_nanos().max(1)) as u64;
        let mut ticks_skipped = 0u64;

        self.next_tick = match self.config.policy {
            TickPolicy::Skip => {
                if overrun && behind > 0 {
                    ticks_skipped = behind;
                    warn!(
                        tick = self.tick_count,
                        skipped = ticks_skipped,
                        late_ms = late_by.as_secs_f64() * 1000.0,
                        "tick overrun, skipping ahead"
                    );
                }
                now + self.interval
            }
            TickPolicy::CatchUp { max_catchup } => {
                let cap = u64::from(max_catchup);
                if overrun && behind > 0 {
                    ticks_skipped = behind.saturating_sub(cap);
                    warn!(
                        tick = self.tick_count,
                        behind,
                        catching_up = behind.min(cap),
                        skipping = ticks_skipped,
                        "tick overrun, catching up"
                    );
                }
                if overrun && behind > cap {
                    now + self.interval
                } else {
                    deadline + self.interval
                }
            }
        };

        if overrun {
            self.metrics.total_overruns += 1;
        }
        self.metrics.total_skipped += ticks_skipped;
        self.metrics.total_ticks += 1;

        trace!(tick = self.tick_count, overrun, "tick fired");

        TickInfo {
            tick: self.tick_count,
            dt: self.interval,
            overrun,
            ticks_skipped,
        }
    }

    /// Records that the work for the current tick is done. Drives budget
    /// warnings and the timing metrics; a no-op without a preceding tick.
    pub fn record_tick_end(&mut self) {
        let Some(start) = self.tick_start.take() else {
            return;
        };
        let elapsed = start.elapsed();
        let utilization = elapsed.as_secs_f64() / self.interval.as_secs_f64();
        self.metrics.budget_utilization = utilization;

        if utilization >= self.config.budget_critical_threshold {
            warn!(
                tick = self.tick_count,
                elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                budget_ms = self.interval.as_secs_f64() * 1000.0,
                "tick exceeded budget"
            );
        } else if utilization >= self.config.budget_warn_threshold {
            warn!(
                tick = self.tick_count,
                elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                budget_ms = self.interval.as_secs_f64() * 1000.0,
                "tick approaching budget limit"
            );
        }

        if self.config.metrics_enabled {
            if elapsed > self.metrics.max_tick_time {
                self.metrics.max_tick_time = elapsed;
            }
            let alpha = 0.1;
            let prev = self.metrics.avg_tick_time.as_secs_f64();
            let curr = elapsed.as_secs_f64();
            self.metrics.avg_tick_time =
                Duration::from_secs_f64(prev * (1.0 - alpha) + curr * alpha);
        }
    }

    /// Ticks fired so far.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn metrics(&self) -> &TickMetrics {
        &self.metrics
    }

    pub fn tick_rate_hz(&self) -> u32 {
        self.config.tick_rate_hz
    }

    /// The fixed tick interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

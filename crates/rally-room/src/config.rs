//! Engine configuration and the room state machine.

use std::fmt;
use std::time::Duration;

use rally_sim::SimConfig;
use rally_tick::TickConfig;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// RetryPolicy
// ---------------------------------------------------------------------------

/// How hard the finalizer tries to hand an outcome to the recorder.
///
/// Attempt `n` (1-based) that fails waits
/// `min(initial_backoff_ms · 2^(n-1), max_backoff_ms)` before attempt `n+1`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff_ms: 100,
            max_backoff_ms: 5_000,
        }
    }
}

impl RetryPolicy {
    /// At least one attempt, and a ceiling no lower than the first wait.
    pub fn validated(mut self) -> Self {
        self.max_attempts = self.max_attempts.max(1);
        self.max_backoff_ms = self.max_backoff_ms.max(self.initial_backoff_ms);
        self
    }

    /// Wait after failed attempt `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let doublings = attempt.saturating_sub(1).min(32);
        let ms = self
            .initial_backoff_ms
            .saturating_mul(1u64 << doublings)
            .min(self.max_backoff_ms);
        Duration::from_millis(ms)
    }
}

// ---------------------------------------------------------------------------
// EngineConfig
// ---------------------------------------------------------------------------

/// Everything a [`RoomRegistry`](crate::RoomRegistry) needs to run matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub tick: TickConfig,
    pub sim: SimConfig,
    /// Frames buffered per transport before new ones are dropped.
    pub outbound_queue: usize,
    pub retry: RetryPolicy,
    /// A room whose second participant never connects is abandoned after
    /// this long.
    pub start_timeout_ms: u64,
    /// An active room with no connected transport is abandoned after this
    /// long.
    pub abandon_grace_ms: u64,
    /// How often the reaper scans.
    pub reap_interval_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick: TickConfig::default(),
            sim: SimConfig::default(),
            outbound_queue: 64,
            retry: RetryPolicy::default(),
            start_timeout_ms: 60_000,
            abandon_grace_ms: 30_000,
            reap_interval_ms: 1_000,
        }
    }
}

impl EngineConfig {
    pub fn validated(self) -> Self {
        Self {
            tick: self.tick.validated(),
            sim: self.sim.validated(),
            outbound_queue: self.outbound_queue.max(1),
            retry: self.retry.validated(),
            reap_interval_ms: self.reap_interval_ms.max(1),
            ..self
        }
    }

    pub fn start_timeout(&self) -> Duration {
        Duration::from_millis(self.start_timeout_ms)
    }

    pub fn abandon_grace(&self) -> Duration {
        Duration::from_millis(self.abandon_grace_ms)
    }

    pub fn reap_interval(&self) -> Duration {
        Duration::from_millis(self.reap_interval_ms)
    }
}

// ---------------------------------------------------------------------------
// RoomPhase
// ---------------------------------------------------------------------------

/// Lifecycle of a room. Never moves backward:
///
/// ```text
/// Created ──→ Active ──→ Finished ──→ Removed
///    │           │                       ↑
///    └───────────┴───(abandon/remove)────┘
/// ```
///
/// - **Created**: registered, waiting for both participants to connect.
/// - **Active**: the match loop is ticking.
/// - **Finished**: a score reached the win threshold; awaiting finalization.
/// - **Removed**: gone from the registry. Terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomPhase {
    Created,
    Active,
    Finished,
    Removed,
}

impl RoomPhase {
    /// Returns `true` if moving to `target` is a legal transition.
    pub fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Created, Self::Active)
                | (Self::Active, Self::Finished)
                | (Self::Created | Self::Active | Self::Finished, Self::Removed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Removed)
    }
}

impl fmt::Display for RoomPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "Created"),
            Self::Active => write!(f, "Active"),
            Self::Finished => write!(f, "Finished"),
            Self::Removed => write!(f, "Removed"),
        }
    }
}

//! Deterministic match simulation for Rally.
//!
//! Everything here is pure computation: [`step`] maps a [`MatchState`],
//! the latest paddle intents, and the fixed tick duration to the next
//! state. No clocks, no randomness, no I/O. Two runs fed the same initial
//! state, the same input sequence, and the same `dt` produce identical
//! snapshots, which replay and audit tooling downstream relies on.
//!
//! # Coordinates
//!
//! The playfield spans `x ∈ [0, width]`, `y ∈ [0, height]` with `y`
//! growing downward (screen convention), so [`Direction::Up`] decreases a
//! paddle's `y`. The left paddle defends `x = 0`, the right paddle
//! defends `x = width`.
//!
//! [`Direction::Up`]: rally_protocol::Direction::Up

mod config;
mod state;
mod step;

pub use config::{SimConfig, MAX_LAUNCH_ANGLE};
pub use state::MatchState;
pub use step::{step, Inputs};

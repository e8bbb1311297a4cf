//! Room lifecycle for Rally.
//!
//! Each match lives in a [`Room`] held by the [`RoomRegistry`]. Once both
//! participants have a transport registered, the registry spawns the
//! room's match loop: a Tokio task that ticks the simulation at a fixed
//! rate and pushes one snapshot per tick to both transports. The first
//! finished snapshot removes the room and hands the result to the
//! [`MatchRecorder`].
//!
//! # Key types
//!
//! - [`RoomRegistry`]: creates, finds, and removes rooms; routes transports
//!   and input
//! - [`Room`]: one match's state, input slots, and session directory
//! - [`RoomPhase`]: lifecycle state machine
//! - [`Broadcaster`]: snapshot serialization and fan-out
//! - [`MatchRecorder`] / [`MatchOutcome`]: the persistence handoff
//! - [`EngineConfig`] / [`RetryPolicy`]: tunables

mod broadcast;
mod config;
mod error;
mod finalize;
mod match_loop;
mod recorder;
mod registry;
mod room;

pub use broadcast::Broadcaster;
pub use config::{EngineConfig, RetryPolicy, RoomPhase};
pub use error::{RecordError, RoomError};
pub use recorder::{MatchOutcome, MatchRecorder};
pub use registry::RoomRegistry;
pub use room::Room;

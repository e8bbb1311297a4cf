//! Wire vocabulary shared by the Rally engine and its clients.
//!
//! Identifiers ([`MatchId`], [`ParticipantId`], [`MatchType`], [`Side`]),
//! the state that travels in snapshots ([`Ball`], [`Pair`], [`Snapshot`],
//! [`PaddleIntent`]), the JSON frames themselves ([`ClientMessage`],
//! [`ServerMessage`]) and the [`Codec`] that turns frames into bytes.

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    Ball, ClientMessage, Direction, MatchId, MatchType, PaddleIntent, Pair,
    ParticipantId, ServerMessage, Side, Snapshot,
};

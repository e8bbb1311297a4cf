//! Core protocol types for Rally's wire format.
//!
//! Everything in this module is either an identity used across the engine
//! or a value that gets serialized into a frame. The JSON shapes are part
//! of the public contract with clients; the tests at the bottom pin them.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A participant's identity, as vouched for by the external auth
/// collaborator.
///
/// Newtype over `u64` so a `ParticipantId` can never be passed where some
/// other number is expected. `#[serde(transparent)]` keeps it a plain number
/// on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(pub u64);

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

/// Opaque identifier of one match (one room).
///
/// Random v4 UUID, so ids are unguessable and never collide across engine
/// instances. Serialized as the bare UUID string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchId(pub Uuid);

impl MatchId {
    /// Generates a fresh random match id.
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "M-{}", self.0)
    }
}

/// Free-form tag describing what kind of match this is (`NORMAL`,
/// `RANKED`, ...). The engine only carries it through to logs and the
/// persisted outcome.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchType(pub String);

impl MatchType {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for MatchType {
    fn default() -> Self {
        Self::new("NORMAL")
    }
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which end of the playfield a participant defends.
///
/// Participant A (the first identity handed to room creation) is always
/// `Left`, participant B always `Right`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    /// The other side of the table.
    pub fn opponent(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Left => f.write_str("left"),
            Self::Right => f.write_str("right"),
        }
    }
}

// ---------------------------------------------------------------------------
// Values
// ---------------------------------------------------------------------------

/// A `{left, right}` pair, used for paddle positions and scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Pair<T> {
    pub left: T,
    pub right: T,
}

impl<T> Pair<T> {
    pub fn new(left: T, right: T) -> Self {
        Self { left, right }
    }

    /// Borrow the value belonging to `side`.
    pub fn get(&self, side: Side) -> &T {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }

    /// Mutably borrow the value belonging to `side`.
    pub fn get_mut(&mut self, side: Side) -> &mut T {
        match side {
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
        }
    }
}

/// Ball position and velocity, in playfield units and units per second.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Ball {
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
}

/// Immutable view of a match at one tick. One of these is pushed to every
/// registered transport per tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(rename = "matchId")]
    pub match_id: MatchId,
    pub ball: Ball,
    /// Paddle centers along the vertical axis.
    pub paddles: Pair<f64>,
    pub scores: Pair<u32>,
    pub tick: u64,
    pub finished: bool,
}

/// Which way a participant wants their paddle to go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Up,
    Down,
    #[default]
    Stay,
}

/// The latest intent recorded for one paddle. Last write wins; no history.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PaddleIntent {
    /// Move at full paddle speed in a direction (or hold still).
    Direction(Direction),
    /// Move toward an absolute vertical position, at most paddle speed.
    Target(f64),
}

impl Default for PaddleIntent {
    fn default() -> Self {
        Self::Direction(Direction::Stay)
    }
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// Frames a participant's client sends to the engine.
///
/// Internally tagged: `{"type": "INPUT", "direction": "UP"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    /// First frame on a new connection: bind it to a match.
    /// `token` is resolved to a [`ParticipantId`] by the auth collaborator.
    Join {
        #[serde(rename = "matchId")]
        match_id: MatchId,
        token: String,
    },

    /// Paddle intent. Sent at the client's own cadence, not per tick.
    /// `matchId` is optional; when present it must name the joined match.
    Input {
        #[serde(rename = "matchId", default, skip_serializing_if = "Option::is_none")]
        match_id: Option<MatchId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        direction: Option<Direction>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<f64>,
    },

    /// The client is going away; the connection closes cleanly.
    Leave,
}

impl ClientMessage {
    /// Extracts the paddle intent from an `INPUT` frame.
    ///
    /// A target position wins over a direction when both are present.
    /// Returns `None` for non-input frames and for inputs carrying neither
    /// (or a non-finite target).
    pub fn intent(&self) -> Option<PaddleIntent> {
        match self {
            Self::Input {
                target: Some(y), ..
            } if y.is_finite() => Some(PaddleIntent::Target(*y)),
            Self::Input {
                direction: Some(d),
                ..
            } => Some(PaddleIntent::Direction(*d)),
            _ => None,
        }
    }
}

/// Frames the engine pushes to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerMessage {
    /// Join accepted. Tells the client which paddle it drives and the
    /// current state so it can render before the first tick arrives.
    Ready { side: Side, snapshot: Snapshot },

    /// One per tick.
    State { snapshot: Snapshot },

    /// Something was wrong with the client's request. `code` follows HTTP
    /// conventions (400 bad request, 401 unauthorized, 403 not a member,
    /// 404 unknown match).
    Error { code: u16, message: String },
}

// =========================================================================
// Tests
// =========================================================================

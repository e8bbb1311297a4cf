//! Error types for the room layer.

use rally_protocol::{MatchId, ParticipantId};

/// Errors from room registry operations.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// No room with this id (never existed, finished, or removed).
    #[error("match {0} not found")]
    NotFound(MatchId),

    /// The participant is not one of the room's two members.
    #[error("{0} is not a participant of match {1}")]
    NotMember(ParticipantId, MatchId),

    /// Both seats were given the same identity.
    #[error("{0} cannot play against themselves")]
    SameParticipant(ParticipantId),
}

/// Errors a [`MatchRecorder`](crate::MatchRecorder) reports.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    /// The store could not be reached. Retried with backoff.
    #[error("match recorder unavailable: {0}")]
    Unavailable(String),

    /// The store refused the outcome. Not retried.
    #[error("match recorder rejected outcome: {0}")]
    Rejected(String),
}

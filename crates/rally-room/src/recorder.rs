//! The persistence collaborator a finished match is handed to.

use std::time::SystemTime;

use rally_protocol::{MatchId, MatchType, ParticipantId};
use serde::Serialize;

use crate::RecordError;

/// Final result of one match, as handed to the [`MatchRecorder`].
///
/// `participant_a` is the left side, `participant_b` the right side.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchOutcome {
    pub match_id: MatchId,
    pub participant_a: ParticipantId,
    pub participant_b: ParticipantId,
    pub score_a: u32,
    pub score_b: u32,
    pub started_at: SystemTime,
    pub finished_at: SystemTime,
    pub match_type: MatchType,
}

impl MatchOutcome {
    /// The participant with the higher score, or `None` on a tie.
    pub fn winner(&self) -> Option<ParticipantId> {
        match self.score_a.cmp(&self.score_b) {
            std::cmp::Ordering::Greater => Some(self.participant_a),
            std::cmp::Ordering::Less => Some(self.participant_b),
            std::cmp::Ordering::Equal => None,
        }
    }
}

/// Persists finished matches.
///
/// Called once per finished match from that match's loop task, so the
/// returned future must be `Send`. Implementations should report
/// transient failures as [`RecordError::Unavailable`] so the finalizer
/// retries them.
pub trait MatchRecorder: Send + Sync + 'static {
    fn record(
        &self,
        outcome: &MatchOutcome,
    ) -> impl std::future::Future<Output = Result<(), RecordError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(a: u32, b: u32) -> MatchOutcome {
        let now = SystemTime::now();
        MatchOutcome {
            match_id: MatchId::random(),
            participant_a: ParticipantId(1),
            participant_b: ParticipantId(2),
            score_a: a,
            score_b: b,
            started_at: now,
            finished_at: now,
            match_type: MatchType::default(),
        }
    }

    #[test]
    fn test_winner_is_higher_score() {
        assert_eq!(outcome(5, 3).winner(), Some(ParticipantId(1)));
        assert_eq!(outcome(1, 5).winner(), Some(ParticipantId(2)));
        assert_eq!(outcome(2, 2).winner(), None);
    }
}

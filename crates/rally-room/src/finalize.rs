//! Handing a finished match to the recorder.

use crate::{MatchOutcome, MatchRecorder, RecordError, RetryPolicy, Room};

/// Builds the outcome of `room`, stamping the finish time if nothing has
/// yet.
pub(crate) fn outcome_of(room: &Room) -> MatchOutcome {
    let finished_at = room.mark_finished();
    let snapshot = room.snapshot();
    let participants = room.participants();
    MatchOutcome {
        match_id: room.id(),
        participant_a: participants.left,
        participant_b: participants.right,
        score_a: snapshot.scores.left,
        score_b: snapshot.scores.right,
        started_at: room.started_at(),
        finished_at,
        match_type: room.match_type().clone(),
    }
}

/// Calls the recorder until it succeeds, refuses outright, or the policy
/// runs out of attempts. Returns the number of attempts on success.
pub(crate) async fn deliver<R: MatchRecorder>(
    recorder: &R,
    outcome: &MatchOutcome,
    policy: &RetryPolicy,
) -> Result<u32, RecordError> {
    let max = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match recorder.record(outcome).await {
            Ok(()) => return Ok(attempt),
            Err(e @ RecordError::Rejected(_)) => return Err(e),
            Err(e) if attempt >= max => return Err(e),
            Err(e) => {
                let wait = policy.backoff(attempt);
                tracing::warn!(
                    match_id = %outcome.match_id,
                    attempt,
                    max_attempts = max,
                    retry_in_ms = wait.as_millis() as u64,
                    error = %e,
                    "recording match outcome failed, retrying"
                );
                tokio::time::sleep(wait).await;
                attempt += 1;
            }
        }
    }
}

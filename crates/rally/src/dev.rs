//! Stand-in collaborators for running the server locally.
//!
//! Neither is fit for production: [`NumericTokens`] trusts whatever the
//! client claims, and [`LogRecorder`] only writes outcomes to the log.

use rally_protocol::ParticipantId;
use rally_room::{MatchOutcome, MatchRecorder, RecordError};
use rally_session::{Authenticator, SessionError};

/// Reads the token as the participant number.
#[derive(Debug, Clone, Copy, Default)]
pub struct NumericTokens;

impl Authenticator for NumericTokens {
    async fn authenticate(&self, token: &str) -> Result<ParticipantId, SessionError> {
        token
            .trim()
            .parse()
            .map(ParticipantId)
            .map_err(|_| SessionError::AuthFailed("token must be a participant number".into()))
    }
}

/// Logs each outcome as one JSON line at `info`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogRecorder;

impl MatchRecorder for LogRecorder {
    async fn record(&self, outcome: &MatchOutcome) -> Result<(), RecordError> {
        let json =
            serde_json::to_string(outcome).map_err(|e| RecordError::Rejected(e.to_string()))?;
        tracing::info!(match_id = %outcome.match_id, outcome = %json, "match outcome");
        Ok(())
    }
}

//! Authentication hook for resolving participant identity.
//!
//! Rally does not issue or verify credentials itself. Whoever runs
//! matchmaking also owns identity, and plugs it in through the
//! [`Authenticator`] trait; the server calls it once per connection while
//! handling the `JOIN` frame.

use rally_protocol::ParticipantId;

use crate::SessionError;

/// Resolves a client's token to the participant it belongs to.
///
/// The returned future must be `Send`: the server awaits it inside a
/// spawned per-connection task.
///
/// # Example
///
/// ```rust
/// use rally_protocol::ParticipantId;
/// use rally_session::{Authenticator, SessionError};
///
/// /// Treats the token as the participant number. Development only.
/// struct NumericTokens;
///
/// impl Authenticator for NumericTokens {
///     async fn authenticate(&self, token: &str) -> Result<ParticipantId, SessionError> {
///         token
///             .parse()
///             .map(ParticipantId)
///             .map_err(|_| SessionError::AuthFailed("token must be a number".into()))
///     }
/// }
/// ```
pub trait Authenticator: Send + Sync + 'static {
    /// Validates `token` and returns the participant's identity.
    ///
    /// Return [`SessionError::AuthFailed`] for a token that is malformed,
    /// expired, or unknown.
    fn authenticate(
        &self,
        token: &str,
    ) -> impl std::future::Future<Output = Result<ParticipantId, SessionError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(u64);

    impl Authenticator for Fixed {
        async fn authenticate(&self, token: &str) -> Result<ParticipantId, SessionError> {
            if token == "letmein" {
                Ok(ParticipantId(self.0))
            } else {
                Err(SessionError::AuthFailed(format!("unknown token {token:?}")))
            }
        }
    }

    #[tokio::test]
    async fn test_authenticator_resolves_or_rejects() {
        let auth = Fixed(9);
        assert_eq!(auth.authenticate("letmein").await.unwrap(), ParticipantId(9));
        assert!(matches!(
            auth.authenticate("nope").await,
            Err(SessionError::AuthFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_authenticate_future_can_be_spawned() {
        let auth = std::sync::Arc::new(Fixed(3));
        let id = tokio::spawn(async move { auth.authenticate("letmein").await })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(id, ParticipantId(3));
    }
}

//! Error types for the session layer.

use rally_transport::ConnectionId;

/// Errors from authentication and from pushing frames to a transport.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The [`Authenticator`](crate::Authenticator) rejected the token.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The transport's outbound queue is at capacity; the frame was
    /// dropped. The client is too slow to keep up with the tick rate.
    #[error("outbound queue full for {0}")]
    QueueFull(ConnectionId),

    /// The transport's writer has gone away.
    #[error("transport {0} is closed")]
    Closed(ConnectionId),
}

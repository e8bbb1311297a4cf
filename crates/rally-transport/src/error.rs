use std::io;

/// Failures surfaced by a [`Transport`](crate::Transport) or
/// [`Connection`](crate::Connection).
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Binding the listener, accepting a socket, or the WebSocket upgrade
    /// failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] io::Error),

    #[error("send failed: {0}")]
    SendFailed(#[source] io::Error),

    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] io::Error),

    /// The peer sent a frame over the configured inbound limit.
    #[error("inbound frame of {len} bytes exceeds limit of {max}")]
    FrameTooLarge { len: usize, max: usize },

    /// A bounded operation did not finish in time.
    #[error("{0} timed out")]
    TimedOut(&'static str),
}

impl TransportError {
    /// True when the peer is gone and further I/O on the connection is
    /// pointless.
    pub fn is_disconnect(&self) -> bool {
        match self {
            Self::SendFailed(e) | Self::ReceiveFailed(e) => matches!(
                e.kind(),
                io::ErrorKind::BrokenPipe
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
            ),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_too_large_message() {
        let err = TransportError::FrameTooLarge { len: 20, max: 16 };
        assert_eq!(err.to_string(), "inbound frame of 20 bytes exceeds limit of 16");
    }

    #[test]
    fn test_is_disconnect() {
        let reset = TransportError::ReceiveFailed(io::Error::from(io::ErrorKind::ConnectionReset));
        assert!(reset.is_disconnect());
        assert!(!TransportError::TimedOut("write").is_disconnect());
        let refused = TransportError::AcceptFailed(io::Error::from(io::ErrorKind::BrokenPipe));
        assert!(!refused.is_disconnect());
    }
}

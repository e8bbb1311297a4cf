//! Unified error type for the Rally server.

use std::path::PathBuf;

use rally_protocol::ProtocolError;
use rally_room::RoomError;
use rally_session::SessionError;
use rally_transport::TransportError;

/// Top-level error that wraps every crate-specific error.
///
/// The `#[from]` conversions let `?` lift sub-crate errors into this one,
/// so the server and the binary only ever deal with `RallyError`.
#[derive(Debug, thiserror::Error)]
pub enum RallyError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A frame could not be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Authentication failed or a transport queue rejected a frame.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The room named in a request does not accept it.
    #[error(transparent)]
    Room(#[from] RoomError),

    /// The client did not complete the `JOIN` exchange.
    #[error("join rejected: {0}")]
    Join(String),

    /// The config file could not be read.
    #[error("cannot read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML for [`ServerConfig`](crate::ServerConfig).
    #[error("invalid config: {0}")]
    Config(#[from] toml::de::Error),

    /// A global tracing subscriber was already installed.
    #[error("logging already initialized: {0}")]
    Logging(#[from] tracing_subscriber::util::TryInitError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rally_protocol::{MatchId, ParticipantId};

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::TimedOut("write");
        let rally_err: RallyError = err.into();
        assert!(matches!(rally_err, RallyError::Transport(_)));
        assert_eq!(rally_err.to_string(), "write timed out");
    }

    #[test]
    fn test_from_protocol_error() {
        let err = serde_json::from_slice::<serde_json::Value>(b"{")
            .map_err(ProtocolError::Decode)
            .unwrap_err();
        let rally_err: RallyError = err.into();
        assert!(matches!(rally_err, RallyError::Protocol(_)));
    }

    #[test]
    fn test_from_session_error() {
        let err = SessionError::AuthFailed("nope".into());
        let rally_err: RallyError = err.into();
        assert!(matches!(rally_err, RallyError::Session(_)));
        assert!(rally_err.to_string().contains("nope"));
    }

    #[test]
    fn test_from_room_error() {
        let err = RoomError::NotMember(ParticipantId(3), MatchId::random());
        let rally_err: RallyError = err.into();
        assert!(matches!(rally_err, RallyError::Room(_)));
        assert!(rally_err.to_string().contains("P-3"));
    }

    #[test]
    fn test_from_toml_error() {
        let err = toml::from_str::<toml::Value>("bind = ").unwrap_err();
        let rally_err: RallyError = err.into();
        assert!(matches!(rally_err, RallyError::Config(_)));
        assert!(rally_err.to_string().starts_with("invalid config"));
    }

    #[test]
    fn test_config_read_names_the_path() {
        let err = RallyError::ConfigRead {
            path: PathBuf::from("/nope/rally.toml"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        };
        assert!(err.to_string().contains("/nope/rally.toml"));
    }
}

//! Fan-out of per-tick snapshots to a room's transports.

use rally_protocol::{Codec, ProtocolError, ServerMessage, Snapshot};
use rally_session::{Frame, SessionDirectory, SessionError};

/// Serializes snapshots once and pushes the bytes to every transport.
///
/// Pushing never waits: each transport has a bounded queue drained by its
/// own writer task. A full queue or a closed transport costs that
/// transport this frame and nothing else.
#[derive(Debug, Clone, Default)]
pub struct Broadcaster<C> {
    codec: C,
}

impl<C: Codec> Broadcaster<C> {
    pub fn new(codec: C) -> Self {
        Self { codec }
    }

    /// Encodes `snapshot` as a `STATE` frame.
    pub fn serialize(&self, snapshot: &Snapshot) -> Result<Frame, ProtocolError> {
        let bytes = self.codec.encode(&ServerMessage::State {
            snapshot: snapshot.clone(),
        })?;
        Ok(Frame::from(bytes))
    }

    /// Pushes `frame` to every transport in `sessions`. Returns how many
    /// accepted it.
    pub fn publish(&self, sessions: &SessionDirectory, frame: &Frame) -> usize {
        let mut delivered = 0;
        sessions.for_each(|participant, handle| match handle.push(Frame::clone(frame)) {
            Ok(()) => delivered += 1,
            Err(SessionError::QueueFull(conn_id)) => {
                tracing::debug!(%participant, %conn_id, "outbound queue full, frame dropped");
            }
            Err(e) => {
                tracing::debug!(%participant, error = %e, "skipping transport");
            }
        });
        delivered
    }

    /// [`serialize`](Self::serialize) then [`publish`](Self::publish).
    /// An encoding failure is logged and nothing is sent.
    pub fn broadcast(&self, sessions: &SessionDirectory, snapshot: &Snapshot) -> usize {
        match self.serialize(snapshot) {
            Ok(frame) => self.publish(sessions, &frame),
            Err(e) => {
                tracing::error!(
                    match_id = %snapshot.match_id,
                    tick = snapshot.tick,
                    error = %e,
                    "failed to encode snapshot"
                );
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rally_protocol::{JsonCodec, MatchId, ParticipantId};
    use rally_session::TransportHandle;
    use rally_sim::{MatchState, SimConfig};
    use rally_transport::ConnectionId;

    use super::*;

    fn snapshot() -> Snapshot {
        MatchState::kickoff(&SimConfig::default()).snapshot(MatchId::random())
    }

    #[test]
    fn test_serialize_produces_state_frame() {
        let b = Broadcaster::new(JsonCodec);
        let snap = snapshot();
        let frame = b.serialize(&snap).unwrap();

        let json: serde_json::Value = serde_json::from_slice(&frame).unwrap();
        assert_eq!(json["type"], "STATE");
        assert_eq!(json["snapshot"]["tick"], 0);
        assert_eq!(json["snapshot"]["finished"], false);
        assert_eq!(json["snapshot"]["paddles"]["left"], 300.0);
    }

    #[tokio::test]
    async fn test_publish_reaches_every_transport() {
        let b = Broadcaster::new(JsonCodec);
        let dir = SessionDirectory::new();
        let (h1, mut rx1) = TransportHandle::channel(ConnectionId::new(1), 4);
        let (h2, mut rx2) = TransportHandle::channel(ConnectionId::new(2), 4);
        dir.register(ParticipantId(1), h1);
        dir.register(ParticipantId(2), h2);

        assert_eq!(b.broadcast(&dir, &snapshot()), 2);
        assert!(rx1.recv().await.is_some());
        assert!(rx2.recv().await.is_some());
    }

    #[test]
    fn test_slow_or_gone_transport_does_not_block_others() {
        let b = Broadcaster::new(JsonCodec);
        let dir = SessionDirectory::new();
        let (slow, _slow_rx) = TransportHandle::channel(ConnectionId::new(1), 1);
        let (gone, gone_rx) = TransportHandle::channel(ConnectionId::new(2), 4);
        let (ok, mut ok_rx) = TransportHandle::channel(ConnectionId::new(3), 8);
        drop(gone_rx);
        dir.register(ParticipantId(1), slow);
        dir.register(ParticipantId(2), gone);
        dir.register(ParticipantId(3), ok);

        let snap = snapshot();
        assert_eq!(b.broadcast(&dir, &snap), 2, "slow takes the first frame");
        assert_eq!(b.broadcast(&dir, &snap), 1, "then only the healthy one");
        assert!(ok_rx.try_recv().is_ok());
        assert!(ok_rx.try_recv().is_ok());
    }

    #[test]
    fn test_publish_to_empty_directory_is_noop() {
        let b = Broadcaster::new(JsonCodec);
        let frame = b.serialize(&snapshot()).unwrap();
        assert_eq!(b.publish(&SessionDirectory::new(), &frame), 0);
    }
}

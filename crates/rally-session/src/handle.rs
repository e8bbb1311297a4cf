//! The sending side of one participant's connection.

use std::sync::Arc;

use rally_transport::ConnectionId;
use tokio::sync::mpsc;

use crate::SessionError;

/// An encoded outbound frame. Shared between every transport of a room, so
/// one snapshot is serialized once per tick no matter how many receive it.
pub type Frame = Arc<[u8]>;

/// Handle to a participant's transport, as stored in a room's
/// [`SessionDirectory`](crate::SessionDirectory).
///
/// Pushing never blocks and never touches the socket: frames land in a
/// bounded queue drained by that connection's writer task. Cloning is cheap
/// and every clone feeds the same queue.
#[derive(Debug, Clone)]
pub struct TransportHandle {
    conn_id: ConnectionId,
    tx: mpsc::Sender<Frame>,
}

impl TransportHandle {
    /// Creates a handle and the receiving end the writer task drains.
    /// `capacity` is clamped to at least 1.
    pub fn channel(conn_id: ConnectionId, capacity: usize) -> (Self, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { conn_id, tx }, rx)
    }

    /// The connection this handle writes to.
    pub fn conn_id(&self) -> ConnectionId {
        self.conn_id
    }

    /// Queues `frame` without waiting.
    ///
    /// # Errors
    /// - [`SessionError::QueueFull`]: the writer is behind; frame dropped
    /// - [`SessionError::Closed`]: the writer task is gone
    pub fn push(&self, frame: Frame) -> Result<(), SessionError> {
        self.tx.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SessionError::QueueFull(self.conn_id),
            mpsc::error::TrySendError::Closed(_) => SessionError::Closed(self.conn_id),
        })
    }

    /// `true` once the writer task has dropped its receiver.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

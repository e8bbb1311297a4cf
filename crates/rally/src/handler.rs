//! Per-connection handler: join, then route input until the socket closes.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Receive `JOIN` → authenticate the token → register the transport
//!   2. Send `READY` directly, then hand the socket's write side to a writer
//!      task that drains the room's snapshot queue
//!   3. Loop: receive `INPUT` / `LEAVE` until close, idle timeout, or the
//!      writer giving up

use std::sync::Arc;
use std::time::Duration;

use rally_protocol::{ClientMessage, Codec, MatchId, ParticipantId, ServerMessage};
use rally_room::{MatchRecorder, RoomError, RoomRegistry};
use rally_session::{Authenticator, Frame, TransportHandle};
use rally_transport::{Connection, ConnectionId, TransportError, WebSocketConnection};
use tokio::sync::mpsc;

use crate::server::ServerState;
use crate::RallyError;

/// How long a rejected or finished connection gets to flush its close frame.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Detaches the transport from its room when the handler exits, however it
/// exits. Only removes the entry if it still belongs to this connection.
struct TransportGuard<R: MatchRecorder> {
    registry: RoomRegistry<R>,
    match_id: MatchId,
    participant: ParticipantId,
    conn_id: ConnectionId,
}

impl<R: MatchRecorder> Drop for TransportGuard<R> {
    fn drop(&mut self) {
        self.registry
            .unregister_transport(self.match_id, self.participant, self.conn_id);
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<A, R>(
    conn: WebSocketConnection,
    state: Arc<ServerState<A, R>>,
) -> Result<(), RallyError>
where
    A: Authenticator,
    R: MatchRecorder,
{
    let conn = Arc::new(conn);
    let conn_id = conn.id();
    match conn.peer_addr() {
        Some(peer) => tracing::debug!(%conn_id, %peer, "handling new connection"),
        None => tracing::debug!(%conn_id, "handling new connection"),
    }

    // --- Step 1: JOIN ---
    let (match_id, participant) = match perform_join(&conn, &state).await {
        Ok(joined) => joined,
        Err(e) => {
            close(&conn).await;
            return Err(e);
        }
    };

    let (handle, rx) =
        TransportHandle::channel(conn_id, state.registry.config().outbound_queue);
    let (side, snapshot) = match state.registry.register_transport(match_id, participant, handle)
    {
        Ok(registered) => registered,
        Err(e) => {
            reject(&conn, &state, room_error_code(&e), &e.to_string()).await;
            return Err(e.into());
        }
    };
    let guard = TransportGuard {
        registry: state.registry.clone(),
        match_id,
        participant,
        conn_id,
    };
    tracing::info!(%conn_id, %match_id, %participant, %side, "participant joined");

    // READY goes out before the writer starts, so it precedes every STATE.
    if let Err(e) = send_message(&conn, &state, &ServerMessage::Ready { side, snapshot }).await {
        drop(guard);
        close(&conn).await;
        return Err(e);
    }

    // --- Step 2: Writer ---
    let mut writer = tokio::spawn(write_frames(Arc::clone(&conn), rx, state.timeouts.write));

    // --- Step 3: Message loop ---
    loop {
        let data = tokio::select! {
            received = recv_within(&conn, state.timeouts.idle) => match received {
                Ok(Ok(Some(data))) => data,
                Ok(Ok(None)) => {
                    tracing::info!(%conn_id, %participant, "connection closed cleanly");
                    break;
                }
                Ok(Err(e)) if e.is_disconnect() => {
                    tracing::debug!(%conn_id, %participant, error = %e, "peer dropped");
                    break;
                }
                Ok(Err(e)) => {
                    tracing::warn!(%conn_id, %participant, error = %e, "recv error");
                    break;
                }
                Err(_) => {
                    tracing::info!(%conn_id, %participant, "connection idle, closing");
                    break;
                }
            },
            _ = &mut writer => {
                tracing::debug!(%conn_id, %participant, "writer stopped");
                break;
            }
        };

        let msg: ClientMessage = match state.codec.decode(&data) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::debug!(%conn_id, %participant, error = %e, "failed to decode frame");
                continue;
            }
        };

        match &msg {
            ClientMessage::Input {
                match_id: Some(other),
                ..
            } if *other != match_id => {
                tracing::debug!(%conn_id, %participant, other = %other, "input for another match ignored");
            }
            ClientMessage::Input { .. } => match msg.intent() {
                Some(intent) => state.registry.update_input(match_id, participant, intent),
                None => tracing::debug!(%conn_id, %participant, "input without intent ignored"),
            },
            ClientMessage::Leave => {
                tracing::info!(%conn_id, %participant, "participant left");
                break;
            }
            ClientMessage::Join { .. } => {
                tracing::debug!(%conn_id, %participant, "repeated JOIN ignored");
            }
        }
    }

    drop(guard);
    writer.abort();
    close(&conn).await;
    Ok(())
}

/// Receives `JOIN`, authenticates it, and returns who joined which match.
/// Sends an `ERROR` frame for every rejection.
async fn perform_join<A, R>(
    conn: &WebSocketConnection,
    state: &ServerState<A, R>,
) -> Result<(MatchId, ParticipantId), RallyError>
where
    A: Authenticator,
    R: MatchRecorder,
{
    let data = match tokio::time::timeout(state.timeouts.handshake, conn.recv()).await {
        Ok(Ok(Some(data))) => data,
        Ok(Ok(None)) => {
            return Err(RallyError::Join("connection closed before JOIN".into()));
        }
        Ok(Err(e)) => return Err(RallyError::Transport(e)),
        Err(_) => {
            send_error(conn, state, 400, "JOIN not received in time").await?;
            return Err(RallyError::Join("JOIN timed out".into()));
        }
    };

    let (match_id, token) = match state.codec.decode::<ClientMessage>(&data) {
        Ok(ClientMessage::Join { match_id, token }) => (match_id, token),
        Ok(_) => {
            send_error(conn, state, 400, "first frame must be JOIN").await?;
            return Err(RallyError::Join("first frame was not JOIN".into()));
        }
        Err(e) => {
            send_error(conn, state, 400, &format!("malformed frame: {e}")).await?;
            return Err(e.into());
        }
    };

    match state.auth.authenticate(&token).await {
        Ok(participant) => Ok((match_id, participant)),
        Err(e) => {
            send_error(conn, state, 401, "unauthorized").await?;
            Err(e.into())
        }
    }
}

/// Maps a registration failure to the `ERROR` code the client sees.
fn room_error_code(err: &RoomError) -> u16 {
    match err {
        RoomError::NotFound(_) => 404,
        RoomError::NotMember(..) => 403,
        RoomError::SameParticipant(_) => 400,
    }
}

/// Drains the room's snapshot queue onto the socket. Returns when the
/// queue closes (the room is gone or replaced this transport) or a write
/// fails or stalls.
async fn write_frames(
    conn: Arc<WebSocketConnection>,
    mut rx: mpsc::Receiver<Frame>,
    write_timeout: Duration,
) {
    let conn_id = conn.id();
    while let Some(frame) = rx.recv().await {
        match tokio::time::timeout(write_timeout, conn.send(&frame)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::debug!(%conn_id, error = %e, "write failed");
                break;
            }
            Err(_) => {
                tracing::warn!(%conn_id, timeout_ms = write_timeout.as_millis() as u64, "write timed out");
                break;
            }
        }
    }
    close(&conn).await;
}

/// Receives with an optional deadline. `Err` means the deadline passed.
async fn recv_within(
    conn: &WebSocketConnection,
    limit: Option<Duration>,
) -> Result<Result<Option<Vec<u8>>, TransportError>, tokio::time::error::Elapsed> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, conn.recv()).await,
        None => Ok(conn.recv().await),
    }
}

/// Encodes and sends one message, bounded by the write timeout.
async fn send_message<A, R>(
    conn: &WebSocketConnection,
    state: &ServerState<A, R>,
    msg: &ServerMessage,
) -> Result<(), RallyError> {
    let bytes = state.codec.encode(msg)?;
    match tokio::time::timeout(state.timeouts.write, conn.send(&bytes)).await {
        Ok(result) => result.map_err(RallyError::Transport),
        Err(_) => Err(RallyError::Transport(TransportError::TimedOut("write"))),
    }
}

/// Sends an `ERROR` frame.
async fn send_error<A, R>(
    conn: &WebSocketConnection,
    state: &ServerState<A, R>,
    code: u16,
    message: &str,
) -> Result<(), RallyError> {
    let msg = ServerMessage::Error {
        code,
        message: message.to_string(),
    };
    send_message(conn, state, &msg).await
}

/// Sends an `ERROR` frame and closes, ignoring failures of either.
async fn reject<A, R>(conn: &WebSocketConnection, state: &ServerState<A, R>, code: u16, message: &str) {
    if let Err(e) = send_error(conn, state, code, message).await {
        tracing::debug!(conn_id = %conn.id(), error = %e, "failed to send ERROR");
    }
    close(conn).await;
}

async fn close(conn: &WebSocketConnection) {
    match tokio::time::timeout(CLOSE_TIMEOUT, conn.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::trace!(conn_id = %conn.id(), error = %e, "close failed"),
        Err(_) => tracing::trace!(conn_id = %conn.id(), "close timed out"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_error_codes() {
        let id = MatchId::random();
        assert_eq!(room_error_code(&RoomError::NotFound(id)), 404);
        assert_eq!(room_error_code(&RoomError::NotMember(ParticipantId(9), id)), 403);
        assert_eq!(room_error_code(&RoomError::SameParticipant(ParticipantId(1))), 400);
    }
}

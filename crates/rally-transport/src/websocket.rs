//! WebSocket transport implementation using `tokio-tungstenite`.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::error::CapacityError;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

use crate::{Connection, ConnectionId, PendingConnection, Transport, TransportError};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// How long a client gets to finish the HTTP upgrade.
pub const DEFAULT_UPGRADE_TIMEOUT: Duration = Duration::from_secs(5);

/// Participant frames are a few dozen bytes; anything past this is abuse.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 16 * 1024;

type Sink = SplitSink<WebSocketStream<TcpStream>, Message>;
type Stream = SplitStream<WebSocketStream<TcpStream>>;

fn io_error(
    kind: io::ErrorKind,
    err: impl Into<Box<dyn std::error::Error + Send + Sync>>,
) -> io::Error {
    io::Error::new(kind, err)
}

/// Listens for participant connections.
///
/// `accept` only takes the TCP socket; the WebSocket upgrade happens in
/// [`WebSocketUpgrade::establish`], which callers run on their own task so
/// one slow peer cannot hold up the listener.
pub struct WebSocketTransport {
    listener: TcpListener,
    max_frame_bytes: usize,
    upgrade_timeout: Duration,
}

impl WebSocketTransport {
    /// Binds to `addr` (`"0.0.0.0:8080"`, or port `0` for any free port).
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, "WebSocket transport listening");
        Ok(Self {
            listener,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            upgrade_timeout: DEFAULT_UPGRADE_TIMEOUT,
        })
    }

    /// Inbound messages larger than this are refused while their header is
    /// read, before the payload is buffered.
    pub fn with_max_frame_bytes(mut self, max: usize) -> Self {
        self.max_frame_bytes = max.max(1);
        self
    }

    pub fn with_upgrade_timeout(mut self, timeout: Duration) -> Self {
        self.upgrade_timeout = timeout;
        self
    }
}

impl Transport for WebSocketTransport {
    type Connection = WebSocketConnection;
    type Pending = WebSocketUpgrade;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Pending, Self::Error> {
        let (stream, peer) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;
        // Snapshots are small and latency-bound.
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(%peer, error = %e, "could not disable Nagle");
        }
        Ok(WebSocketUpgrade {
            stream,
            peer,
            max_frame_bytes: self.max_frame_bytes,
            upgrade_timeout: self.upgrade_timeout,
        })
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

/// A TCP peer that has not finished the WebSocket upgrade yet.
pub struct WebSocketUpgrade {
    stream: TcpStream,
    peer: SocketAddr,
    max_frame_bytes: usize,
    upgrade_timeout: Duration,
}

impl PendingConnection for WebSocketUpgrade {
    type Connection = WebSocketConnection;
    type Error = TransportError;

    fn peer_addr(&self) -> Option<SocketAddr> {
        Some(self.peer)
    }

    async fn establish(self) -> Result<Self::Connection, Self::Error> {
        let limits = WebSocketConfig::default()
            .max_message_size(Some(self.max_frame_bytes))
            .max_frame_size(Some(self.max_frame_bytes));
        let upgrade = tokio_tungstenite::accept_async_with_config(self.stream, Some(limits));

        let ws = match tokio::time::timeout(self.upgrade_timeout, upgrade).await {
            Ok(Ok(ws)) => ws,
            Ok(Err(e)) => {
                return Err(TransportError::AcceptFailed(io_error(
                    io::ErrorKind::ConnectionRefused,
                    e,
                )));
            }
            Err(_) => {
                return Err(TransportError::AcceptFailed(io_error(
                    io::ErrorKind::TimedOut,
                    "websocket upgrade timed out",
                )));
            }
        };

        let id = ConnectionId::new(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed));
        tracing::debug!(%id, peer = %self.peer, "accepted WebSocket connection");

        let (sink, stream) = ws.split();
        Ok(WebSocketConnection {
            id,
            peer: self.peer,
            max_frame_bytes: self.max_frame_bytes,
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
        })
    }
}

/// One participant's WebSocket.
///
/// The socket is split so the reader half can wait in `recv` while the
/// writer half keeps pushing snapshots.
#[derive(Debug)]
pub struct WebSocketConnection {
    id: ConnectionId,
    peer: SocketAddr,
    max_frame_bytes: usize,
    sink: Mutex<Sink>,
    stream: Mutex<Stream>,
}

impl WebSocketConnection {
    fn too_large(&self, len: usize) -> TransportError {
        TransportError::FrameTooLarge {
            len,
            max: self.max_frame_bytes,
        }
    }
}

impl Connection for WebSocketConnection {
    type Error = TransportError;

    /// UTF-8 payloads go out as text frames so browser clients can
    /// `JSON.parse(event.data)`; anything else goes out as binary.
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        let msg = match std::str::from_utf8(data) {
            Ok(text) => Message::Text(text.to_owned().into()),
            Err(_) => Message::Binary(data.to_vec().into()),
        };
        self.sink
            .lock()
            .await
            .send(msg)
            .await
            .map_err(|e| TransportError::SendFailed(io_error(io::ErrorKind::BrokenPipe, e)))
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        let mut stream = self.stream.lock().await;
        while let Some(next) = stream.next().await {
            let data: Vec<u8> = match next {
                Ok(Message::Text(text)) => text.as_bytes().to_vec(),
                Ok(Message::Binary(bytes)) => bytes.to_vec(),
                Ok(Message::Close(_)) => return Ok(None),
                // tungstenite answers pings itself.
                Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => continue,
                Err(WsError::Capacity(CapacityError::MessageTooLong { size, .. })) => {
                    return Err(self.too_large(size));
                }
                Err(e) => {
                    return Err(TransportError::ReceiveFailed(io_error(
                        io::ErrorKind::ConnectionReset,
                        e,
                    )));
                }
            };
            if data.len() > self.max_frame_bytes {
                return Err(self.too_large(data.len()));
            }
            return Ok(Some(data));
        }
        Ok(None)
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.sink
            .lock()
            .await
            .close()
            .await
            .map_err(|e| TransportError::SendFailed(io_error(io::ErrorKind::BrokenPipe, e)))
    }

    fn id(&self) -> ConnectionId {
        self.id
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        Some(self.peer)
    }
}

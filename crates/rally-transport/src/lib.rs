//! Network seam for Rally.
//!
//! The server only sees a [`Transport`] that hands out [`Connection`]s and
//! frames as byte vectors. `websocket` (on by default) provides the
//! `tokio-tungstenite` implementation.

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{
    DEFAULT_MAX_FRAME_BYTES, DEFAULT_UPGRADE_TIMEOUT, WebSocketConnection, WebSocketTransport,
    WebSocketUpgrade,
};

use std::fmt;
use std::io;
use std::net::SocketAddr;

/// Process-unique id of one accepted socket.
///
/// A participant that reconnects gets a new id, which is how the session
/// directory tells the live transport from the one it replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Source of inbound participant connections.
pub trait Transport: Send + Sync + 'static {
    type Connection: Connection;
    type Pending: PendingConnection<Connection = Self::Connection, Error = Self::Error>;
    type Error: std::error::Error + Send + Sync;

    /// Resolves once the next peer has connected at the socket level. No
    /// protocol handshake happens here, so an accept loop can call it
    /// back-to-back.
    async fn accept(&mut self) -> Result<Self::Pending, Self::Error>;

    fn local_addr(&self) -> io::Result<SocketAddr>;
}

/// An accepted peer whose protocol handshake is still outstanding.
pub trait PendingConnection: Send + 'static {
    type Connection: Connection;
    type Error: std::error::Error + Send + Sync;

    fn peer_addr(&self) -> Option<SocketAddr>;

    /// Runs the handshake. Call it off the accept loop.
    async fn establish(self) -> Result<Self::Connection, Self::Error>;
}

/// A framed, bidirectional link to one peer.
///
/// `send` and `recv` take `&self` and must not block each other: a reader
/// task parks in `recv` for the whole session while a writer task pushes
/// snapshots through `send`.
pub trait Connection: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync;

    async fn send(&self, data: &[u8]) -> Result<(), Self::Error>;

    /// Next inbound frame, or `Ok(None)` once the peer has closed.
    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error>;

    async fn close(&self) -> Result<(), Self::Error>;

    fn id(&self) -> ConnectionId;

    /// Remote address, when the transport has one.
    fn peer_addr(&self) -> Option<SocketAddr> {
        None
    }
}

//! `RallyServer` builder and accept loop.
//!
//! This is the entry point for running a match engine. It ties the layers
//! together: transport → protocol → session → room.

use std::sync::Arc;
use std::time::Duration;

use rally_protocol::JsonCodec;
use rally_room::{EngineConfig, MatchRecorder, RoomRegistry};
use rally_session::Authenticator;
use rally_transport::{Connection, PendingConnection, Transport, WebSocketTransport};

use crate::handler::handle_connection;
use crate::{RallyError, ServerConfig};

/// Per-connection deadlines, resolved once from [`ServerConfig`].
#[derive(Debug, Clone, Copy)]
pub(crate) struct Timeouts {
    pub(crate) handshake: Duration,
    pub(crate) idle: Option<Duration>,
    pub(crate) write: Duration,
}

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<A, R> {
    pub(crate) registry: RoomRegistry<R>,
    pub(crate) auth: A,
    pub(crate) codec: JsonCodec,
    pub(crate) timeouts: Timeouts,
}

/// Builder for configuring and starting a Rally server.
///
/// # Example
///
/// ```rust,ignore
/// use rally::prelude::*;
///
/// let server = RallyServer::builder()
///     .bind("0.0.0.0:8080")
///     .build(my_auth, my_recorder)
///     .await?;
/// let registry = server.registry();
/// tokio::spawn(server.run());
/// // matchmaking calls registry.create(a, b, match_type)
/// ```
pub struct RallyServerBuilder {
    config: ServerConfig,
}

impl RallyServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
        }
    }

    /// Starts from a loaded config instead of the defaults.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind = addr.to_string();
        self
    }

    /// Sets the match engine configuration.
    pub fn engine(mut self, engine: EngineConfig) -> Self {
        self.config.engine = engine;
        self
    }

    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.config.handshake_timeout_ms = duration_ms(timeout);
        self
    }

    /// `Duration::ZERO` disables the idle check.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.idle_timeout_ms = duration_ms(timeout);
        self
    }

    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.config.write_timeout_ms = duration_ms(timeout);
        self
    }

    pub fn max_frame_bytes(mut self, max: usize) -> Self {
        self.config.max_frame_bytes = max;
        self
    }

    /// Binds the listener and creates the room registry.
    ///
    /// Frames are JSON over WebSocket.
    pub async fn build<A, R>(self, auth: A, recorder: R) -> Result<RallyServer<A, R>, RallyError>
    where
        A: Authenticator,
        R: MatchRecorder,
    {
        let transport = WebSocketTransport::bind(&self.config.bind)
            .await?
            .with_max_frame_bytes(self.config.max_frame_bytes)
            .with_upgrade_timeout(self.config.handshake_timeout());
        let timeouts = Timeouts {
            handshake: self.config.handshake_timeout(),
            idle: self.config.idle_timeout(),
            write: self.config.write_timeout(),
        };

        let state = Arc::new(ServerState {
            registry: RoomRegistry::new(self.config.engine, recorder),
            auth,
            codec: JsonCodec,
            timeouts,
        });

        Ok(RallyServer { transport, state })
    }
}

impl Default for RallyServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// A bound Rally server.
///
/// Grab the [`registry`](Self::registry) before calling
/// [`run()`](Self::run): matchmaking creates rooms through it.
pub struct RallyServer<A, R> {
    transport: WebSocketTransport,
    state: Arc<ServerState<A, R>>,
}

impl<A, R> RallyServer<A, R>
where
    A: Authenticator,
    R: MatchRecorder,
{
    /// Creates a new builder.
    pub fn builder() -> RallyServerBuilder {
        RallyServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// A handle to the room registry shared with every connection.
    pub fn registry(&self) -> RoomRegistry<R> {
        self.state.registry.clone()
    }

    /// Runs the reaper and the accept loop.
    ///
    /// Each accepted socket gets its own task, which performs the WebSocket
    /// upgrade and then serves the participant; the loop itself never waits
    /// on a peer. Runs until the process is terminated or the future is
    /// dropped.
    pub async fn run(mut self) -> Result<(), RallyError> {
        let reaper = self.state.registry.spawn_reaper();
        let _reaper = AbortOnDrop(reaper);
        tracing::info!(addr = ?self.local_addr().ok(), "rally server running");

        loop {
            match self.transport.accept().await {
                Ok(pending) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        let peer = pending.peer_addr();
                        let conn = match pending.establish().await {
                            Ok(conn) => conn,
                            Err(e) => {
                                tracing::debug!(?peer, error = %e, "websocket upgrade failed");
                                return;
                            }
                        };
                        let conn_id = conn.id();
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(%conn_id, error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}

/// Stops the reaper when the accept loop goes away.
struct AbortOnDrop(tokio::task::JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

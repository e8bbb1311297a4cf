//! # Rally
//!
//! Authoritative real-time engine for two-participant paddle-and-ball
//! matches.
//!
//! Matchmaking creates a room for two participants through the
//! [`RoomRegistry`](rally_room::RoomRegistry); both clients then open a
//! WebSocket, send `JOIN`, and receive one `STATE` snapshot per tick until
//! the match finishes. The finished result is handed to a
//! [`MatchRecorder`](rally_room::MatchRecorder) exactly once.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rally::prelude::*;
//! use rally::dev::{LogRecorder, NumericTokens};
//!
//! # async fn run() -> Result<(), RallyError> {
//! let server = RallyServer::<NumericTokens, LogRecorder>::builder()
//!     .bind("0.0.0.0:8080")
//!     .build(NumericTokens, LogRecorder)
//!     .await?;
//!
//! let (match_id, _kickoff) = server
//!     .registry()
//!     .create(ParticipantId(1), ParticipantId(2), MatchType::default())?;
//! println!("join {match_id}");
//!
//! server.run().await
//! # }
//! ```

mod cli;
mod config;
pub mod dev;
mod error;
mod handler;
mod logging;
mod server;

pub use cli::{Cli, CONFIG_ENV};
pub use config::{LoggingConfig, ServerConfig};
pub use error::RallyError;
pub use logging::init_logging;
pub use server::{RallyServer, RallyServerBuilder};

/// Everything needed to embed the engine, in one import.
pub mod prelude {
    pub use crate::{
        init_logging, Cli, LoggingConfig, RallyError, RallyServer, RallyServerBuilder,
        ServerConfig,
    };

    pub use rally_protocol::{
        Ball, ClientMessage, Codec, Direction, JsonCodec, MatchId, MatchType, PaddleIntent,
        Pair, ParticipantId, ProtocolError, ServerMessage, Side, Snapshot,
    };
    pub use rally_room::{
        EngineConfig, MatchOutcome, MatchRecorder, RecordError, RetryPolicy, Room, RoomError,
        RoomPhase, RoomRegistry,
    };
    pub use rally_session::{Authenticator, SessionError};
    pub use rally_sim::SimConfig;
    pub use rally_tick::{TickConfig, TickPolicy};
    pub use rally_transport::TransportError;
}

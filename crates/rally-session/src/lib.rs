//! Participant sessions for Rally.
//!
//! Two concerns live here:
//!
//! 1. **Authentication**: turning the token a client presents into a
//!    [`ParticipantId`](rally_protocol::ParticipantId) ([`Authenticator`]).
//! 2. **Transport directory**: per room, which connection currently carries
//!    each participant's snapshots ([`SessionDirectory`], [`TransportHandle`]).
//!
//! # How it fits in the stack
//!
//! ```text
//! Room Layer (above)      ← publishes snapshots through the directory
//!     ↕
//! Session Layer (this crate)
//!     ↕
//! Transport Layer (below) ← the writer task drains each handle's queue
//! ```

mod auth;
mod directory;
mod error;
mod handle;

pub use auth::Authenticator;
pub use directory::SessionDirectory;
pub use error::SessionError;
pub use handle::{Frame, TransportHandle};

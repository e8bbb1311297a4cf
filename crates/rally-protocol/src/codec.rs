//! Byte encoding of wire messages.
//!
//! Rooms and connection handlers go through a [`Codec`] rather than
//! `serde_json`, so the frame format is swappable in one place.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::ProtocolError;

/// Turns messages into frame payloads and back.
///
/// One instance is shared by every connection and every room.
pub trait Codec: Send + Sync + 'static {
    /// Fails with [`ProtocolError::Encode`] when `value` has no
    /// representation in this format.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Fails with [`ProtocolError::Decode`] on malformed input, missing
    /// fields, or an unknown `type` tag.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

/// JSON frames, which is what browser clients expect.
///
/// ```rust
/// use rally_protocol::{ClientMessage, Codec, Direction, JsonCodec};
///
/// let msg: ClientMessage = JsonCodec
///     .decode(br#"{"type":"INPUT","direction":"UP"}"#)
///     .unwrap();
/// assert!(matches!(
///     msg,
///     ClientMessage::Input { direction: Some(Direction::Up), .. }
/// ));
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

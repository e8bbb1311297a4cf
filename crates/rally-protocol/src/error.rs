/// A frame that could not be turned into (or out of) a message.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// Bad JSON, a missing field, or an unknown `type` tag.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(#[source] serde_json::Error),
}

//! Error types for the protocol layer.
//!
//! Each crate in Handoff defines its own error enum. A `ProtocolError`
//! always means the bytes or the JSON shape were wrong, never that a
//! connection or a peer misbehaved.

/// Errors that can occur while encoding or decoding envelopes.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust value into bytes).
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed.
    ///
    /// Common causes: malformed JSON, an unknown `type` tag, or a
    /// missing required field such as `id` on an `offer`.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The message parsed but is not acceptable at the protocol level,
    /// e.g. a client frame that is a JSON array instead of an object.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}

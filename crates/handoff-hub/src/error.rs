//! Error types for the hub layer.

use handoff_protocol::ProtocolError;
use handoff_transport::ConnectionId;

/// Errors that can occur while the hub processes a connection event.
///
/// Apart from [`Unavailable`](HubError::Unavailable), none of these are
/// fatal: the offending frame is dropped and every other connection is
/// unaffected.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// The frame is not a JSON object with a string `type`.
    #[error("malformed frame: {0}")]
    Malformed(#[from] ProtocolError),

    /// The frame is a hub event, which peers may not originate.
    #[error("{role} may not send `{kind}` frames")]
    NotRoutable {
        role: handoff_protocol::Role,
        kind: String,
    },

    /// A host frame did not name the client it is for.
    #[error("host frame `{0}` has no target id")]
    MissingTarget(String),

    /// The connection sent a frame before (or instead of) joining.
    #[error("{0} has not joined")]
    NotJoined(ConnectionId),

    /// The connection already joined once.
    #[error("{0} already joined")]
    AlreadyJoined(ConnectionId),

    /// The id generator kept producing ids that are already in use.
    #[error("could not generate a unique client id")]
    IdExhausted,

    /// The hub actor has stopped.
    #[error("hub is unavailable")]
    Unavailable,
}

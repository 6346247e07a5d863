//! Core protocol types for the relay wire format.
//!
//! Every frame on a relay connection is a single JSON object whose `type`
//! field selects the schema:
//!
//! | type           | direction              | fields              |
//! |----------------|------------------------|---------------------|
//! | `join`         | peer → hub             | `role`, `id`?       |
//! | `client-id`    | hub → client           | `id`                |
//! | `client-join`  | hub → host             | `id`                |
//! | `client-leave` | hub → host             | `id`                |
//! | `offer`        | host → client          | `id`, `offer`       |
//! | `answer`       | client → host          | `id`, `answer`      |
//! | `ice`          | either way             | `id`, `candidate`   |
//! | `data-open`    | transport level        | `id`?               |
//! | `content-ack`  | transport level        | `id`?               |
//!
//! Negotiation bodies (`offer`, `answer`, `candidate`) are opaque JSON.
//! The relay itself routes [`Frame`](crate::Frame)s and never types them
//! as an `Envelope`; this enum is for the endpoints.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// The hub-assigned identity of one client connection.
///
/// A newtype over `String` so a client id can't be confused with any other
/// string (a role name, an SDP blob). `#[serde(transparent)]` keeps it a
/// plain JSON string on the wire: `ClientId("c1")` is `"c1"`.
///
/// Ids are opaque. A reconnecting client gets a brand-new id; nothing in
/// the system ever resumes an old one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    /// Wraps a raw id string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ClientId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ClientId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Which side of the pairing a connection plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The single producer that owns the delivery state machines.
    Host,
    /// One of many consumers.
    Client,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Host => f.write_str("host"),
            Self::Client => f.write_str("client"),
        }
    }
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// One frame on a relay connection.
///
/// `#[serde(tag = "type", rename_all = "kebab-case")]` gives the internally
/// tagged shape browsers send: `ClientLeave { id }` is
/// `{"type":"client-leave","id":"c1"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Envelope {
    /// Peer → hub: first frame on every connection.
    ///
    /// A client may suggest an `id`, but the hub always assigns a fresh one.
    Join {
        role: Role,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<ClientId>,
    },

    /// Hub → client: "this is your id".
    ClientId { id: ClientId },

    /// Hub → host: a client registered.
    ClientJoin { id: ClientId },

    /// Hub → host: a client's connection closed.
    ClientLeave { id: ClientId },

    /// Host → client: negotiation initiation.
    Offer { id: ClientId, offer: Value },

    /// Client → host: negotiation reply.
    Answer { id: ClientId, answer: Value },

    /// Either direction: auxiliary negotiation data. Order-sensitive per
    /// sender, which the hub preserves.
    Ice { id: ClientId, candidate: Value },

    /// The peer channel became usable.
    DataOpen {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<ClientId>,
    },

    /// The payload arrived at the client.
    ContentAck {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<ClientId>,
    },
}

impl Envelope {
    /// The wire `type` tag, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Join { .. } => "join",
            Self::ClientId { .. } => "client-id",
            Self::ClientJoin { .. } => "client-join",
            Self::ClientLeave { .. } => "client-leave",
            Self::Offer { .. } => "offer",
            Self::Answer { .. } => "answer",
            Self::Ice { .. } => "ice",
            Self::DataOpen { .. } => "data-open",
            Self::ContentAck { .. } => "content-ack",
        }
    }

    /// The client this frame is addressed to or about, if it names one.
    pub fn target(&self) -> Option<&ClientId> {
        match self {
            Self::ClientId { id }
            | Self::ClientJoin { id }
            | Self::ClientLeave { id }
            | Self::Offer { id, .. }
            | Self::Answer { id, .. }
            | Self::Ice { id, .. } => Some(id),
            Self::Join { id, .. } | Self::DataOpen { id } | Self::ContentAck { id } => id.as_ref(),
        }
    }

    /// Interprets an already-parsed JSON object as an envelope.
    ///
    /// # Errors
    /// `ProtocolError::Decode` for an unknown `type` or a missing field.
    pub fn from_value(value: Value) -> Result<Self, ProtocolError> {
        serde_json::from_value(value).map_err(ProtocolError::Decode)
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! The wire table above is the contract with browser code, so these
    //! tests pin exact JSON shapes rather than round-tripping blindly.

    use serde_json::json;

    use super::*;

    fn cid(id: &str) -> ClientId {
        ClientId::from(id)
    }

    // =====================================================================
    // Identity types
    // =====================================================================

    #[test]
    fn test_client_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&cid("c1")).unwrap();
        assert_eq!(json, "\"c1\"");
    }

    #[test]
    fn test_client_id_display_is_raw_id() {
        assert_eq!(cid("a1b2").to_string(), "a1b2");
    }

    #[test]
    fn test_role_serializes_lowercase() {
        assert_eq!(serde_json::to_value(Role::Host).unwrap(), json!("host"));
        assert_eq!(serde_json::to_value(Role::Client).unwrap(), json!("client"));
    }

    // =====================================================================
    // Envelope shapes
    // =====================================================================

    #[test]
    fn test_join_parses_with_and_without_id() {
        let plain: Envelope = serde_json::from_value(json!({"type": "join", "role": "client"})).unwrap();
        assert_eq!(
            plain,
            Envelope::Join {
                role: Role::Client,
                id: None
            }
        );

        let with_id: Envelope =
            serde_json::from_value(json!({"type": "join", "role": "client", "id": "old"})).unwrap();
        assert_eq!(with_id.target(), Some(&cid("old")));
    }

    #[test]
    fn test_hub_events_use_kebab_case_tags() {
        let json = serde_json::to_value(Envelope::ClientLeave { id: cid("c1") }).unwrap();
        assert_eq!(json, json!({"type": "client-leave", "id": "c1"}));

        let json = serde_json::to_value(Envelope::ClientId { id: cid("c2") }).unwrap();
        assert_eq!(json, json!({"type": "client-id", "id": "c2"}));
    }

    #[test]
    fn test_offer_body_is_forwarded_untouched() {
        let frame = json!({
            "type": "offer",
            "id": "c1",
            "offer": {"type": "offer", "sdp": "v=0\r\no=- 1 2 IN IP4 0.0.0.0"}
        });
        let envelope = Envelope::from_value(frame.clone()).unwrap();
        assert_eq!(serde_json::to_value(&envelope).unwrap(), frame);
    }

    #[test]
    fn test_transport_signals_omit_missing_id() {
        let json = serde_json::to_value(Envelope::ContentAck { id: None }).unwrap();
        assert_eq!(json, json!({"type": "content-ack"}));

        let parsed: Envelope = serde_json::from_value(json!({"type": "data-open"})).unwrap();
        assert_eq!(parsed, Envelope::DataOpen { id: None });
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let result = Envelope::from_value(json!({"type": "fly-to-moon", "id": "c1"}));
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_offer_without_id_is_rejected() {
        let result = Envelope::from_value(json!({"type": "offer", "offer": {}}));
        assert!(result.is_err());
    }
}

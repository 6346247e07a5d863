//! Untyped relay frames.
//!
//! The hub never needs the full [`Envelope`](crate::Envelope) schema: it
//! reads `type` and `id`, may overwrite `id`, and forwards everything else
//! byte-for-byte in meaning. [`Frame`] keeps the original JSON object so
//! fields the hub does not know about (sequence numbers, app metadata,
//! message types added later) survive the trip.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::{ClientId, ProtocolError};

/// Message types only the hub may originate.
const HUB_EVENTS: [&str; 4] = ["join", "client-id", "client-join", "client-leave"];

/// One JSON object with a string `type`, forwarded as-is.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Frame(Map<String, Value>);

impl Frame {
    /// Accepts any JSON object that carries a string `type`.
    ///
    /// # Errors
    /// `ProtocolError::InvalidMessage` for non-objects and for objects
    /// without a string `type`.
    pub fn from_value(value: Value) -> Result<Self, ProtocolError> {
        let Value::Object(fields) = value else {
            return Err(ProtocolError::InvalidMessage(
                "frame is not a JSON object".into(),
            ));
        };
        if !fields.get("type").is_some_and(Value::is_string) {
            return Err(ProtocolError::InvalidMessage(
                "frame has no string `type`".into(),
            ));
        }
        Ok(Self(fields))
    }

    /// A hub event such as `client-join` that only carries an id.
    pub fn notice(kind: &str, id: &ClientId) -> Self {
        let mut fields = Map::new();
        fields.insert("type".into(), Value::String(kind.to_string()));
        fields.insert("id".into(), Value::String(id.as_str().to_string()));
        Self(fields)
    }

    /// The `type` tag.
    pub fn kind(&self) -> &str {
        self.0.get("type").and_then(Value::as_str).unwrap_or_default()
    }

    /// The client named by a string `id`, if there is one.
    pub fn target(&self) -> Option<ClientId> {
        self.0.get("id").and_then(Value::as_str).map(ClientId::from)
    }

    /// Whether this is a type the hub generates itself, which no peer may
    /// send through it.
    pub fn is_hub_event(&self) -> bool {
        HUB_EVENTS.contains(&self.kind())
    }

    /// Overwrites `id` with the sending client's id. Every other field is
    /// left alone.
    pub fn stamp_sender(&mut self, sender: &ClientId) {
        self.0
            .insert("id".into(), Value::String(sender.as_str().to_string()));
    }

    /// The underlying JSON object.
    pub fn as_object(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Consumes the frame, returning it as a JSON value.
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

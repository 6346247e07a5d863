//! Error types for the delivery layer.

/// Errors that can occur while driving a delivery.
///
/// A `Transport` error is terminal for the client it belongs to and for no
/// one else.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// The peer transport failed (offer creation, send, ...).
    #[error("transport error: {0}")]
    Transport(String),

    /// The payload could not be read.
    #[error("payload unavailable: {0}")]
    Payload(#[source] std::io::Error),

    /// The delivery actor has stopped.
    #[error("delivery actor is unavailable")]
    Unavailable,
}

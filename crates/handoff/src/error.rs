//! Unified error type for Handoff.

use handoff_delivery::DeliveryError;
use handoff_hub::HubError;
use handoff_protocol::ProtocolError;
use handoff_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant generates the `From` impl, so
/// `?` converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum HandoffError {
    /// A relay connection error (accept, connect, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A frame could not be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The hub rejected an operation or has stopped.
    #[error(transparent)]
    Hub(#[from] HubError),

    /// A host-side delivery error.
    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    /// Invalid configuration (e.g. an unparsable `PORT`).
    #[error("invalid configuration: {0}")]
    Config(String),
}

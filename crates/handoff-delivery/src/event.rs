//! The events that drive a [`DeliveryMachine`](crate::DeliveryMachine).
//!
//! Every input a delivery reacts to, whether it comes from the hub, the
//! peer transport or its own retry timer, is one [`DeliveryEvent`]. The
//! machine has a single handler for all of them, so there is exactly one
//! place where stage changes happen.

use serde_json::Value;

/// Any input to a delivery.
#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryEvent {
    /// Membership changes reported by the hub.
    Join(JoinEvent),
    /// Negotiation data relayed by the hub from the client.
    Negotiation(NegotiationEvent),
    /// Something the peer transport observed.
    Transport(TransportEvent),
    /// The retry timer fired.
    Timer(TimerEvent),
}

/// Hub membership for this client id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinEvent {
    /// `client-join`: start negotiating.
    Joined,
    /// `client-leave`: tear down.
    Left,
}

/// Client-originated negotiation data.
#[derive(Debug, Clone, PartialEq)]
pub enum NegotiationEvent {
    /// The client's answer to our offer.
    Answer(Value),
    /// An auxiliary connectivity candidate from the client.
    Candidate(Value),
}

/// Callbacks from the peer transport.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// The data channel is open and can carry the payload.
    ChannelOpen,
    /// The client acknowledged the payload.
    Ack,
    /// A raw message arrived on the data channel.
    ///
    /// `data-open` and `content-ack` envelopes are recognised; anything
    /// else is ignored.
    Message(Vec<u8>),
    /// The transport produced a local candidate to relay to the client.
    LocalCandidate(Value),
    /// Low-level connection state change.
    ConnectionState(ConnectionState),
    /// Low-level negotiation state change.
    NegotiationState(NegotiationState),
    /// The transport closed for good.
    Closed,
}

/// Retry timer expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    /// The timer armed as `generation` elapsed.
    RetryDue { generation: u64 },
}

/// Connection state as reported by the transport. Telemetry only, apart
/// from `Failed` (terminal for the delivery) and `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

/// Offer/answer progress as reported by the transport. Telemetry only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NegotiationState {
    #[default]
    Stable,
    HaveLocalOffer,
    HaveRemoteAnswer,
    Closed,
}

impl From<JoinEvent> for DeliveryEvent {
    fn from(event: JoinEvent) -> Self {
        Self::Join(event)
    }
}

impl From<NegotiationEvent> for DeliveryEvent {
    fn from(event: NegotiationEvent) -> Self {
        Self::Negotiation(event)
    }
}

impl From<TransportEvent> for DeliveryEvent {
    fn from(event: TransportEvent) -> Self {
        Self::Transport(event)
    }
}

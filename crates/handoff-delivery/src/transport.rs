//! The peer-to-peer transport capability.
//!
//! Delivery does not know how the host and client actually talk directly;
//! it only needs something that can produce an offer, take an answer and
//! candidates, and send bytes once a channel is open. Implementations
//! report what happens on their side through [`TransportEvents`].
//!
//! Methods return `impl Future + Send` rather than using `async fn` so the
//! machine that drives them can live in a spawned task.

use std::future::Future;

use handoff_protocol::ClientId;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::{DeliveryError, DeliveryEvent, TransportEvent};

/// One peer connection to one client.
pub trait PeerTransport: Send + 'static {
    /// Starts negotiation and returns the local offer to relay.
    fn create_offer(&mut self) -> impl Future<Output = Result<Value, DeliveryError>> + Send;

    /// Applies the client's answer.
    fn accept_answer(
        &mut self,
        answer: Value,
    ) -> impl Future<Output = Result<(), DeliveryError>> + Send;

    /// Applies a remote candidate.
    fn add_candidate(
        &mut self,
        candidate: Value,
    ) -> impl Future<Output = Result<(), DeliveryError>> + Send;

    /// Sends bytes over the open data channel.
    fn send(&mut self, payload: &[u8]) -> impl Future<Output = Result<(), DeliveryError>> + Send;

    /// Releases the connection. Called at most once.
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}

/// Creates a [`PeerTransport`] per client.
pub trait TransportFactory: Send + Sync + 'static {
    /// The transport this factory produces.
    type Transport: PeerTransport;

    /// Creates a fresh transport for `client_id` that reports into `events`.
    fn create(
        &self,
        client_id: &ClientId,
        events: TransportEvents,
    ) -> Result<Self::Transport, DeliveryError>;
}

/// Where a transport reports its callbacks.
///
/// Events emitted after the delivery has been torn down are discarded.
#[derive(Debug, Clone)]
pub struct TransportEvents {
    sender: mpsc::UnboundedSender<DeliveryEvent>,
}

impl TransportEvents {
    pub(crate) fn new(sender: mpsc::UnboundedSender<DeliveryEvent>) -> Self {
        Self { sender }
    }

    /// Reports an event. Returns `false` once nobody is listening.
    pub fn emit(&self, event: TransportEvent) -> bool {
        self.sender.send(DeliveryEvent::Transport(event)).is_ok()
    }
}

//! The host side: one delivery per client the hub announces.
//!
//! [`HostDispatcher`] turns hub envelopes into delivery events and owns one
//! delivery actor per client id. [`HostAgent`] connects the dispatcher to
//! a relay over WebSocket.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use handoff_delivery::{
    DeliveryConfig, DeliveryEvent, DeliveryHandle, DeliveryStatus, JoinEvent, NegotiationEvent,
    PayloadCache, TransportEvent, TransportFactory, spawn_delivery,
};
use handoff_protocol::{ClientId, Codec, Envelope, JsonCodec, Role};
use handoff_transport::{ClientWebSocketConnection, Connection};
use tokio::sync::{mpsc, watch};

use crate::HandoffError;

// ---------------------------------------------------------------------------
// StatusBoard
// ---------------------------------------------------------------------------

/// Read-only view of every live delivery. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct StatusBoard {
    inner: Arc<Mutex<HashMap<ClientId, watch::Receiver<DeliveryStatus>>>>,
}

impl StatusBoard {
    /// The latest status for `id`, if a delivery exists for it.
    pub fn get(&self, id: &ClientId) -> Option<DeliveryStatus> {
        self.lock().get(id).map(|rx| rx.borrow().clone())
    }

    /// A receiver for `id`'s status changes.
    pub fn watch(&self, id: &ClientId) -> Option<watch::Receiver<DeliveryStatus>> {
        self.lock().get(id).cloned()
    }

    /// All current statuses, ordered by client id.
    pub fn snapshot(&self) -> Vec<DeliveryStatus> {
        let mut all: Vec<_> = self.lock().values().map(|rx| rx.borrow().clone()).collect();
        all.sort_by(|a, b| a.client_id.cmp(&b.client_id));
        all
    }

    fn insert(&self, id: ClientId, rx: watch::Receiver<DeliveryStatus>) {
        self.lock().insert(id, rx);
    }

    fn remove(&self, id: &ClientId) {
        self.lock().remove(id);
    }

    fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<ClientId, watch::Receiver<DeliveryStatus>>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ---------------------------------------------------------------------------
// HostDispatcher
// ---------------------------------------------------------------------------

/// Routes hub envelopes to per-client delivery actors.
///
/// | envelope | effect |
/// |---|---|
/// | `client-join` | spawn a delivery and start negotiating |
/// | `answer`, `ice` | negotiation event for that client |
/// | `data-open`, `content-ack` | transport event for that client |
/// | `client-leave` | close and forget that client's delivery |
pub struct HostDispatcher<F: TransportFactory> {
    factory: Arc<F>,
    payload: Arc<PayloadCache>,
    config: DeliveryConfig,
    relay: mpsc::UnboundedSender<Envelope>,
    deliveries: HashMap<ClientId, DeliveryHandle>,
    board: StatusBoard,
}

impl<F: TransportFactory> HostDispatcher<F> {
    /// Creates a dispatcher whose deliveries send hub-bound envelopes
    /// into `relay`.
    pub fn new(
        factory: F,
        payload: PayloadCache,
        config: DeliveryConfig,
        relay: mpsc::UnboundedSender<Envelope>,
    ) -> Self {
        Self {
            factory: Arc::new(factory),
            payload: Arc::new(payload),
            config,
            relay,
            deliveries: HashMap::new(),
            board: StatusBoard::default(),
        }
    }

    /// Applies one envelope received from the hub.
    pub fn dispatch(&mut self, envelope: Envelope) {
        match envelope {
            Envelope::ClientJoin { id } => self.start(id),
            Envelope::ClientLeave { id } => self.stop(&id),
            Envelope::Answer { id, answer } => {
                self.forward(&id, NegotiationEvent::Answer(answer).into())
            }
            Envelope::Ice { id, candidate } => {
                self.forward(&id, NegotiationEvent::Candidate(candidate).into())
            }
            Envelope::DataOpen { id: Some(id) } => {
                self.forward(&id, TransportEvent::ChannelOpen.into())
            }
            Envelope::ContentAck { id: Some(id) } => self.forward(&id, TransportEvent::Ack.into()),
            other => {
                tracing::debug!(kind = other.kind(), "host ignoring envelope");
            }
        }
    }

    fn start(&mut self, id: ClientId) {
        if let Some(previous) = self.deliveries.remove(&id) {
            tracing::warn!(client_id = %id, "client-join for active delivery, restarting");
            let _ = previous.send(JoinEvent::Left);
        }

        let handle = spawn_delivery(
            id.clone(),
            Arc::clone(&self.factory),
            Arc::clone(&self.payload),
            self.config,
            self.relay.clone(),
        );
        if handle.send(JoinEvent::Joined).is_err() {
            tracing::warn!(client_id = %id, "delivery exited before it started");
            return;
        }
        tracing::info!(client_id = %id, "delivery started");
        self.board.insert(id.clone(), handle.subscribe());
        self.deliveries.insert(id, handle);
    }

    fn stop(&mut self, id: &ClientId) {
        self.board.remove(id);
        match self.deliveries.remove(id) {
            Some(handle) => {
                let _ = handle.send(JoinEvent::Left);
            }
            None => tracing::debug!(client_id = %id, "client-leave for unknown client"),
        }
    }

    fn forward(&self, id: &ClientId, event: DeliveryEvent) {
        match self.deliveries.get(id) {
            Some(handle) => {
                if handle.send(event).is_err() {
                    tracing::debug!(client_id = %id, "delivery already closed");
                }
            }
            None => tracing::debug!(client_id = %id, "no delivery for client"),
        }
    }

    /// The latest status for one client.
    pub fn status(&self, id: &ClientId) -> Option<DeliveryStatus> {
        self.board.get(id)
    }

    /// The latest status for every live delivery, ordered by client id.
    pub fn statuses(&self) -> Vec<DeliveryStatus> {
        self.board.snapshot()
    }

    /// A cloneable view of the statuses that outlives borrows of `self`.
    pub fn board(&self) -> StatusBoard {
        self.board.clone()
    }

    /// Number of live deliveries.
    pub fn len(&self) -> usize {
        self.deliveries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deliveries.is_empty()
    }

    /// Closes every delivery.
    pub fn shutdown(&mut self) {
        for (_, handle) in self.deliveries.drain() {
            let _ = handle.send(JoinEvent::Left);
        }
        self.board.clear();
    }
}

impl<F: TransportFactory> Drop for HostDispatcher<F> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ---------------------------------------------------------------------------
// HostAgent
// ---------------------------------------------------------------------------

/// A host connected to a relay.
///
/// # Example
///
/// ```rust,ignore
/// let agent = HostAgent::connect(
///     "ws://127.0.0.1:8080",
///     my_factory,
///     PayloadCache::new(FilePayload::new("index.html")),
///     DeliveryConfig::default(),
/// )
/// .await?;
/// let board = agent.board();
/// agent.run().await?;
/// ```
pub struct HostAgent<F: TransportFactory> {
    conn: ClientWebSocketConnection,
    codec: JsonCodec,
    dispatcher: HostDispatcher<F>,
    relay: mpsc::UnboundedReceiver<Envelope>,
}

impl<F: TransportFactory> HostAgent<F> {
    /// Dials the relay at `url` and joins as host.
    pub async fn connect(
        url: &str,
        factory: F,
        payload: PayloadCache,
        config: DeliveryConfig,
    ) -> Result<Self, HandoffError> {
        let conn = ClientWebSocketConnection::connect(url).await?;
        let codec = JsonCodec;
        let join = codec.encode(&Envelope::Join {
            role: Role::Host,
            id: None,
        })?;
        conn.send(&join).await?;
        tracing::info!(url, "joined relay as host");

        let (relay_tx, relay_rx) = mpsc::unbounded_channel();
        Ok(Self {
            conn,
            codec,
            dispatcher: HostDispatcher::new(factory, payload, config, relay_tx),
            relay: relay_rx,
        })
    }

    /// Status view that stays valid while [`run`](Self::run) owns the agent.
    pub fn board(&self) -> StatusBoard {
        self.dispatcher.board()
    }

    /// Pumps envelopes until the relay closes the connection.
    ///
    /// Every delivery is closed on the way out.
    pub async fn run(mut self) -> Result<(), HandoffError> {
        loop {
            tokio::select! {
                received = self.conn.recv() => match received? {
                    Some(data) => match self.codec.decode::<Envelope>(&data) {
                        Ok(envelope) => self.dispatcher.dispatch(envelope),
                        Err(e) => tracing::debug!(error = %e, "dropping undecodable frame from relay"),
                    },
                    None => {
                        tracing::info!("relay closed the host connection");
                        break;
                    }
                },
                Some(envelope) = self.relay.recv() => {
                    let bytes = self.codec.encode(&envelope)?;
                    self.conn.send(&bytes).await?;
                }
            }
        }

        self.dispatcher.shutdown();
        Ok(())
    }
}

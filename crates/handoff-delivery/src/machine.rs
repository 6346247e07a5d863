//! The per-client delivery state machine.
//!
//! A [`DeliveryMachine`] owns everything that belongs to one client id on
//! the host side: the peer transport, the retry timer and the attempt
//! counter. All inputs arrive as [`DeliveryEvent`]s through
//! [`DeliveryMachine::handle`], one at a time.
//!
//! Outputs go three ways:
//! - envelopes for the hub (the offer, local candidates) on the relay
//!   channel,
//! - the payload over the peer transport,
//! - a [`DeliveryStatus`] snapshot on a `watch` channel after every change.

use std::sync::Arc;

use handoff_protocol::{ClientId, Envelope};
use serde_json::Value;
use tokio::sync::{mpsc, watch};

use crate::timer::RetryTimer;
use crate::{
    ConnectionState, DeliveryConfig, DeliveryError, DeliveryEvent, JoinEvent, NegotiationEvent,
    NegotiationState, PayloadCache, PeerTransport, Stage, TimerEvent, TransportEvent,
    TransportEvents, TransportFactory,
};

/// Read-only view of one delivery, for status reporting.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryStatus {
    pub client_id: ClientId,
    pub stage: Stage,
    /// Payload sends so far (first send included).
    pub attempt: u32,
    pub connection_state: ConnectionState,
    pub negotiation_state: NegotiationState,
}

/// One client's delivery.
///
/// ## Invariants
///
/// - The transport is created once (on join) and closed at most once, on
///   the way into `Failed` or `Closed`. `Delivered` leaves it open.
/// - At most one retry timer is outstanding; any stale fire is ignored.
/// - `attempt` never exceeds `config.max_attempts`.
/// - Once `Closed`, every event is ignored.
pub struct DeliveryMachine<F: TransportFactory> {
    client_id: ClientId,
    stage: Stage,
    factory: Arc<F>,
    transport: Option<F::Transport>,
    attempt: u32,
    timer: RetryTimer,
    payload: Arc<PayloadCache>,
    config: DeliveryConfig,
    relay: mpsc::UnboundedSender<Envelope>,
    /// Feeds the machine's own timer and transport callbacks back in.
    mailbox: mpsc::UnboundedSender<DeliveryEvent>,
    status: watch::Sender<DeliveryStatus>,
    connection_state: ConnectionState,
    negotiation_state: NegotiationState,
}

impl<F: TransportFactory> DeliveryMachine<F> {
    /// Creates a machine in `Connecting`.
    ///
    /// Returns the receiver for the machine's internal events (timer fires
    /// and transport callbacks); whoever drives the machine must pass
    /// those back into [`handle`](Self::handle).
    pub fn new(
        client_id: ClientId,
        factory: Arc<F>,
        payload: Arc<PayloadCache>,
        config: DeliveryConfig,
        relay: mpsc::UnboundedSender<Envelope>,
    ) -> (Self, mpsc::UnboundedReceiver<DeliveryEvent>) {
        let (mailbox, internal) = mpsc::unbounded_channel();
        let (status, _) = watch::channel(DeliveryStatus {
            client_id: client_id.clone(),
            stage: Stage::Connecting,
            attempt: 0,
            connection_state: ConnectionState::default(),
            negotiation_state: NegotiationState::default(),
        });

        let machine = Self {
            client_id,
            stage: Stage::Connecting,
            factory,
            transport: None,
            attempt: 0,
            timer: RetryTimer::default(),
            payload,
            config,
            relay,
            mailbox,
            status,
            connection_state: ConnectionState::default(),
            negotiation_state: NegotiationState::default(),
        };
        (machine, internal)
    }

    pub fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Subscribes to status snapshots.
    pub fn subscribe(&self) -> watch::Receiver<DeliveryStatus> {
        self.status.subscribe()
    }

    /// Applies one event.
    pub async fn handle(&mut self, event: DeliveryEvent) {
        if self.stage == Stage::Closed {
            tracing::debug!(client_id = %self.client_id, ?event, "ignoring event after close");
            return;
        }

        match event {
            DeliveryEvent::Join(JoinEvent::Joined) => self.on_joined().await,
            DeliveryEvent::Join(JoinEvent::Left) => self.teardown(Stage::Closed).await,
            DeliveryEvent::Negotiation(NegotiationEvent::Answer(answer)) => {
                self.on_answer(answer).await
            }
            DeliveryEvent::Negotiation(NegotiationEvent::Candidate(candidate)) => {
                self.on_remote_candidate(candidate).await
            }
            DeliveryEvent::Transport(event) => self.on_transport(event).await,
            DeliveryEvent::Timer(TimerEvent::RetryDue { generation }) => {
                self.on_retry_due(generation).await
            }
        }
    }

    /// Host-side teardown: moves to `Closed` from wherever the machine is.
    pub async fn close(&mut self) {
        self.teardown(Stage::Closed).await;
    }

    // -- Transitions ------------------------------------------------------

    async fn on_joined(&mut self) {
        if self.stage != Stage::Connecting || self.transport.is_some() {
            tracing::debug!(client_id = %self.client_id, stage = %self.stage, "duplicate join ignored");
            return;
        }

        let events = TransportEvents::new(self.mailbox.clone());
        let transport = match self.factory.create(&self.client_id, events) {
            Ok(transport) => self.transport.insert(transport),
            Err(e) => return self.fail(&e).await,
        };

        let offer = match transport.create_offer().await {
            Ok(offer) => offer,
            Err(e) => return self.fail(&e).await,
        };

        self.set_stage(Stage::Negotiating);
        self.relay_to_client(Envelope::Offer {
            id: self.client_id.clone(),
            offer,
        });
    }

    async fn on_answer(&mut self, answer: Value) {
        if self.stage != Stage::Negotiating {
            tracing::debug!(client_id = %self.client_id, stage = %self.stage, "unexpected answer ignored");
            return;
        }
        let Some(transport) = self.transport.as_mut() else {
            return;
        };
        if let Err(e) = transport.accept_answer(answer).await {
            return self.fail(&e).await;
        }
        self.set_stage(Stage::PairingComplete);
    }

    async fn on_remote_candidate(&mut self, candidate: Value) {
        let Some(transport) = self.transport.as_mut() else {
            tracing::debug!(client_id = %self.client_id, stage = %self.stage, "candidate without transport dropped");
            return;
        };
        if let Err(e) = transport.add_candidate(candidate).await {
            tracing::warn!(client_id = %self.client_id, error = %e, "failed to add remote candidate");
        }
    }

    async fn on_transport(&mut self, event: TransportEvent) {
        let event = match event {
            TransportEvent::Message(bytes) => match channel_signal(&bytes) {
                Some(signal) => signal,
                None => {
                    tracing::debug!(client_id = %self.client_id, bytes = bytes.len(), "unrecognised channel message");
                    return;
                }
            },
            other => other,
        };

        match event {
            TransportEvent::ChannelOpen => self.on_channel_open().await,
            TransportEvent::Ack => self.on_ack(),
            TransportEvent::LocalCandidate(candidate) => {
                self.relay_to_client(Envelope::Ice {
                    id: self.client_id.clone(),
                    candidate,
                });
            }
            TransportEvent::ConnectionState(state) => {
                self.connection_state = state;
                match state {
                    ConnectionState::Failed if !self.stage.is_terminal() => {
                        tracing::warn!(client_id = %self.client_id, stage = %self.stage, "peer connection failed");
                        self.teardown(Stage::Failed).await;
                    }
                    ConnectionState::Closed => self.teardown(Stage::Closed).await,
                    _ => self.publish(),
                }
            }
            TransportEvent::NegotiationState(state) => {
                self.negotiation_state = state;
                self.publish();
            }
            TransportEvent::Closed => self.teardown(Stage::Closed).await,
            TransportEvent::Message(_) => {}
        }
    }

    async fn on_channel_open(&mut self) {
        if self.stage != Stage::PairingComplete {
            tracing::debug!(client_id = %self.client_id, stage = %self.stage, "channel-open ignored");
            return;
        }
        self.set_stage(Stage::ChannelOpen);

        self.attempt = 0;
        if self.config.max_attempts == 0 {
            tracing::warn!(client_id = %self.client_id, "max_attempts is 0, not sending");
            return self.teardown(Stage::Failed).await;
        }
        if self.send_payload().await {
            self.set_stage(Stage::Delivering);
            self.timer.arm(self.config.retry_interval, &self.mailbox);
        }
    }

    fn on_ack(&mut self) {
        if self.stage != Stage::Delivering {
            tracing::debug!(client_id = %self.client_id, stage = %self.stage, "ack ignored");
            return;
        }
        self.timer.cancel();
        self.set_stage(Stage::Delivered);
    }

    async fn on_retry_due(&mut self, generation: u64) {
        if !self.timer.fired(generation) || self.stage != Stage::Delivering {
            tracing::debug!(client_id = %self.client_id, generation, "stale retry timer ignored");
            return;
        }

        if self.attempt >= self.config.max_attempts {
            tracing::warn!(
                client_id = %self.client_id,
                attempts = self.attempt,
                "no ack after final attempt"
            );
            return self.teardown(Stage::Failed).await;
        }

        tracing::debug!(client_id = %self.client_id, attempt = self.attempt + 1, "resending payload");
        if self.send_payload().await {
            self.publish();
            self.timer.arm(self.config.retry_interval, &self.mailbox);
        }
    }

    /// Sends the payload once, counting the attempt. On a send error the
    /// machine fails and `false` is returned.
    async fn send_payload(&mut self) -> bool {
        let payload = self.payload.get().await;
        let Some(transport) = self.transport.as_mut() else {
            return false;
        };
        match transport.send(&payload).await {
            Ok(()) => {
                self.attempt += 1;
                true
            }
            Err(e) => {
                self.fail(&e).await;
                false
            }
        }
    }

    async fn fail(&mut self, error: &DeliveryError) {
        tracing::warn!(client_id = %self.client_id, stage = %self.stage, error = %error, "delivery failed");
        self.teardown(Stage::Failed).await;
    }

    /// Moves into `Failed` or `Closed`: cancels the timer and closes the
    /// transport if it is still held.
    async fn teardown(&mut self, target: Stage) {
        if !self.stage.can_transition_to(target) {
            return;
        }
        self.timer.cancel();
        if let Some(mut transport) = self.transport.take() {
            transport.close().await;
        }
        self.set_stage(target);
    }

    // -- Outputs ----------------------------------------------------------

    fn set_stage(&mut self, stage: Stage) {
        debug_assert!(
            self.stage.can_transition_to(stage),
            "illegal transition {} -> {}",
            self.stage,
            stage
        );
        self.stage = stage;
        match stage {
            Stage::Delivered | Stage::Failed | Stage::Closed => {
                tracing::info!(client_id = %self.client_id, %stage, attempt = self.attempt, "delivery finished");
            }
            _ => tracing::debug!(client_id = %self.client_id, %stage, "stage changed"),
        }
        self.publish();
    }

    fn publish(&self) {
        self.status.send_replace(DeliveryStatus {
            client_id: self.client_id.clone(),
            stage: self.stage,
            attempt: self.attempt,
            connection_state: self.connection_state,
            negotiation_state: self.negotiation_state,
        });
    }

    fn relay_to_client(&self, envelope: Envelope) {
        if self.relay.send(envelope).is_err() {
            tracing::warn!(client_id = %self.client_id, "relay channel closed, envelope dropped");
        }
    }
}

/// Maps an in-band `data-open` / `content-ack` message to its event.
fn channel_signal(bytes: &[u8]) -> Option<TransportEvent> {
    let value: Value = serde_json::from_slice(bytes).ok()?;
    match Envelope::from_value(value).ok()? {
        Envelope::DataOpen { .. } => Some(TransportEvent::ChannelOpen),
        Envelope::ContentAck { .. } => Some(TransportEvent::Ack),
        _ => None,
    }
}

//! Delivery actor: runs one [`DeliveryMachine`] in its own task.
//!
//! Two inputs feed the machine: commands from the dispatcher (hub events
//! for this client) and the machine's own internal events (timer and
//! transport callbacks). When every [`DeliveryHandle`] is gone the actor
//! treats it as host teardown and closes the delivery.

use std::sync::Arc;

use handoff_protocol::{ClientId, Envelope};
use tokio::sync::{mpsc, watch};

use crate::{
    DeliveryConfig, DeliveryError, DeliveryEvent, DeliveryMachine, DeliveryStatus, PayloadCache,
    Stage, TransportFactory,
};

/// Handle to a running delivery actor. Cheap to clone.
#[derive(Debug, Clone)]
pub struct DeliveryHandle {
    client_id: ClientId,
    sender: mpsc::UnboundedSender<DeliveryEvent>,
    status: watch::Receiver<DeliveryStatus>,
}

impl DeliveryHandle {
    pub fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    /// Queues an event for the machine.
    pub fn send(&self, event: impl Into<DeliveryEvent>) -> Result<(), DeliveryError> {
        self.sender
            .send(event.into())
            .map_err(|_| DeliveryError::Unavailable)
    }

    /// The latest status snapshot.
    pub fn status(&self) -> DeliveryStatus {
        self.status.borrow().clone()
    }

    /// A receiver that sees every future status change.
    pub fn subscribe(&self) -> watch::Receiver<DeliveryStatus> {
        self.status.clone()
    }

    /// Whether the actor has exited (the delivery is `Closed`).
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Spawns a delivery for `client_id` and returns a handle to it.
///
/// The machine starts in `Connecting`; send it `JoinEvent::Joined` to
/// begin. Envelopes meant for the hub come out of `relay`.
pub fn spawn_delivery<F: TransportFactory>(
    client_id: ClientId,
    factory: Arc<F>,
    payload: Arc<PayloadCache>,
    config: DeliveryConfig,
    relay: mpsc::UnboundedSender<Envelope>,
) -> DeliveryHandle {
    let (machine, internal) = DeliveryMachine::new(client_id.clone(), factory, payload, config, relay);
    let status = machine.subscribe();
    let (sender, commands) = mpsc::unbounded_channel();

    tokio::spawn(run(machine, commands, internal));

    DeliveryHandle {
        client_id,
        sender,
        status,
    }
}

async fn run<F: TransportFactory>(
    mut machine: DeliveryMachine<F>,
    mut commands: mpsc::UnboundedReceiver<DeliveryEvent>,
    mut internal: mpsc::UnboundedReceiver<DeliveryEvent>,
) {
    tracing::debug!(client_id = %machine.client_id(), "delivery actor started");

    loop {
        let event = tokio::select! {
            Some(event) = internal.recv() => event,
            command = commands.recv() => match command {
                Some(event) => event,
                None => {
                    machine.close().await;
                    break;
                }
            },
        };

        machine.handle(event).await;
        if machine.stage() == Stage::Closed {
            break;
        }
    }

    tracing::debug!(client_id = %machine.client_id(), "delivery actor stopped");
}

//! Hub actor: a single Tokio task that owns the [`Session`].
//!
//! Connection handlers never touch the session directly. They send
//! [`HubCommand`]s through a [`HubHandle`] and the actor applies them one
//! at a time, which gives a single total order over every join, frame and
//! leave in the relay.
//!
//! The command channel is unbounded so that [`HubHandle::leave`] can be
//! called from a `Drop` impl without awaiting.

use handoff_protocol::{ClientId, Role};
use handoff_transport::ConnectionId;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use crate::{HubConfig, HubError, HubStats, IdGenerator, PeerSender, Session};

/// Commands sent to the hub actor.
pub(crate) enum HubCommand {
    /// Register a connection as host or client.
    Join {
        connection: ConnectionId,
        role: Role,
        sender: PeerSender,
        reply: oneshot::Sender<Result<Option<ClientId>, HubError>>,
    },

    /// Route one decoded frame from a joined connection.
    Route {
        connection: ConnectionId,
        frame: Value,
    },

    /// The connection closed.
    Leave { connection: ConnectionId },

    /// Request a snapshot of the counters.
    Stats { reply: oneshot::Sender<HubStats> },
}

/// Handle to the running hub actor. Cheap to clone.
#[derive(Clone)]
pub struct HubHandle {
    sender: mpsc::UnboundedSender<HubCommand>,
}

impl HubHandle {
    /// Joins `connection` in `role`, returning the assigned client id.
    ///
    /// Outbound frames for this connection (including the `client-id`
    /// reply and any backlog flush) arrive on `sender`'s receiver.
    pub async fn join(
        &self,
        connection: ConnectionId,
        role: Role,
        sender: PeerSender,
    ) -> Result<Option<ClientId>, HubError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(HubCommand::Join {
                connection,
                role,
                sender,
                reply: reply_tx,
            })
            .map_err(|_| HubError::Unavailable)?;
        reply_rx.await.map_err(|_| HubError::Unavailable)?
    }

    /// Hands a frame to the hub (fire-and-forget).
    ///
    /// Routing errors are logged by the actor; only a stopped hub is
    /// reported here.
    pub fn route(&self, connection: ConnectionId, frame: Value) -> Result<(), HubError> {
        self.sender
            .send(HubCommand::Route { connection, frame })
            .map_err(|_| HubError::Unavailable)
    }

    /// Tells the hub the connection is gone. Safe to call for connections
    /// that never joined.
    pub fn leave(&self, connection: ConnectionId) -> Result<(), HubError> {
        self.sender
            .send(HubCommand::Leave { connection })
            .map_err(|_| HubError::Unavailable)
    }

    /// Returns the current session counters.
    pub async fn stats(&self) -> Result<HubStats, HubError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(HubCommand::Stats { reply: reply_tx })
            .map_err(|_| HubError::Unavailable)?;
        reply_rx.await.map_err(|_| HubError::Unavailable)
    }
}

struct HubActor {
    session: Session,
    receiver: mpsc::UnboundedReceiver<HubCommand>,
}

impl HubActor {
    /// Runs until every [`HubHandle`] has been dropped.
    async fn run(mut self) {
        tracing::info!("hub actor started");

        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                HubCommand::Join {
                    connection,
                    role,
                    sender,
                    reply,
                } => {
                    let result = self.session.join(connection, role, sender);
                    if let Err(e) = &result {
                        tracing::debug!(%connection, %role, error = %e, "join rejected");
                    }
                    let _ = reply.send(result);
                }
                HubCommand::Route { connection, frame } => {
                    if let Err(e) = self.session.route(connection, frame) {
                        tracing::debug!(%connection, error = %e, "dropped frame");
                    }
                }
                HubCommand::Leave { connection } => {
                    self.session.leave(connection);
                }
                HubCommand::Stats { reply } => {
                    let _ = reply.send(self.session.stats());
                }
            }
        }

        tracing::info!("hub actor stopped");
    }
}

/// Spawns the hub actor and returns a handle to it.
pub fn spawn_hub(config: HubConfig, ids: impl IdGenerator) -> HubHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    let actor = HubActor {
        session: Session::with_ids(config, ids),
        receiver: rx,
    };
    tokio::spawn(actor.run());
    HubHandle { sender: tx }
}

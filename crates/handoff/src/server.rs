//! `RelayServer` builder and accept loop.
//!
//! This is the entry point for running a relay. It ties the layers
//! together: transport → protocol → hub.

use std::sync::Arc;
use std::time::Duration;

use handoff_hub::{HubConfig, HubHandle, IdGenerator, RandomIds, spawn_hub};
use handoff_protocol::{Codec, JsonCodec};
use handoff_transport::{Transport, WebSocketTransport};

use crate::config::{DEFAULT_JOIN_TIMEOUT, RelayConfig};
use crate::handler::handle_connection;
use crate::HandoffError;

/// Shared state passed to each connection handler task.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) hub: HubHandle,
    pub(crate) codec: C,
    pub(crate) join_timeout: Duration,
}

/// Builder for configuring and starting a relay.
///
/// # Example
///
/// ```rust,ignore
/// use handoff::prelude::*;
///
/// let server = RelayServer::builder()
///     .bind("0.0.0.0:8080")
///     .build()
///     .await?;
/// server.run().await
/// ```
pub struct RelayServerBuilder {
    bind_addr: String,
    hub_config: HubConfig,
    join_timeout: Duration,
    ids: Box<dyn IdGenerator>,
}

impl RelayServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            hub_config: HubConfig::default(),
            join_timeout: DEFAULT_JOIN_TIMEOUT,
            ids: Box::new(RandomIds),
        }
    }

    /// Creates a builder from a [`RelayConfig`].
    pub fn from_config(config: &RelayConfig) -> Self {
        Self::new()
            .bind(&config.bind_addr)
            .hub_config(config.hub_config())
            .join_timeout(config.join_timeout)
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the hub configuration (backlog limits).
    pub fn hub_config(mut self, config: HubConfig) -> Self {
        self.hub_config = config;
        self
    }

    /// Sets how long a new connection may take to send its `join`.
    pub fn join_timeout(mut self, timeout: Duration) -> Self {
        self.join_timeout = timeout;
        self
    }

    /// Sets where client ids come from. Defaults to [`RandomIds`].
    pub fn id_generator(mut self, ids: impl IdGenerator) -> Self {
        self.ids = Box::new(ids);
        self
    }

    /// Binds the listener and starts the hub.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`.
    pub async fn build(self) -> Result<RelayServer<JsonCodec>, HandoffError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let state = Arc::new(ServerState {
            hub: spawn_hub(self.hub_config, self.ids),
            codec: JsonCodec,
            join_timeout: self.join_timeout,
        });

        Ok(RelayServer { transport, state })
    }
}

impl Default for RelayServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound relay.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct RelayServer<C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<C>>,
}

impl<C> RelayServer<C>
where
    C: Codec + Send + Sync + 'static,
{
    /// Creates a new builder.
    pub fn builder() -> RelayServerBuilder {
        RelayServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// A handle to this relay's hub, for status queries.
    pub fn hub(&self) -> HubHandle {
        self.state.hub.clone()
    }

    /// Runs the accept loop.
    ///
    /// Each accepted connection gets its own handler task, which also runs
    /// the WebSocket handshake, so a peer that never upgrades cannot hold
    /// up the loop. Runs until the process is terminated.
    pub async fn run(mut self) -> Result<(), HandoffError> {
        tracing::info!(addr = ?self.local_addr().ok(), "relay running");

        loop {
            match self.transport.accept().await {
                Ok(incoming) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(incoming, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}

//! # Handoff
//!
//! A signaling relay for handing one payload from a single host to many
//! clients over direct peer channels.
//!
//! The relay ([`RelayServer`]) only brokers negotiation: it assigns
//! client ids, forwards offers, answers and candidates between the host
//! and each client, and buffers frames for whichever side is offline. The
//! host ([`HostAgent`]) runs one delivery per client, sending the payload
//! over the negotiated channel and retrying until the client acknowledges.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use handoff::prelude::*;
//!
//! # async fn run() -> Result<(), HandoffError> {
//! let config = RelayConfig::from_env()?;
//! let server = RelayServerBuilder::from_config(&config).build().await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod host;
mod server;

pub use config::{DEFAULT_JOIN_TIMEOUT, DEFAULT_PORT, RelayConfig};
pub use error::HandoffError;
pub use host::{HostAgent, HostDispatcher, StatusBoard};
pub use server::{RelayServer, RelayServerBuilder};

/// Re-exports of the commonly used types.
pub mod prelude {
    pub use crate::{
        HandoffError, HostAgent, HostDispatcher, RelayConfig, RelayServer, RelayServerBuilder,
        StatusBoard,
    };
    pub use handoff_delivery::{
        ConnectionState, DeliveryConfig, DeliveryError, DeliveryStatus, FilePayload,
        NegotiationState, PayloadCache, PayloadSource, PeerTransport, Stage, StaticPayload,
        TransportEvent, TransportEvents, TransportFactory,
    };
    pub use handoff_hub::{HubConfig, HubHandle, HubStats, IdGenerator, RandomIds, SequentialIds};
    pub use handoff_protocol::{ClientId, Envelope, Role};
}

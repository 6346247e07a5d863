//! Host-side delivery for Handoff.
//!
//! For every client the hub announces, the host runs one delivery: it
//! negotiates a direct peer transport through the hub, pushes the payload
//! over that transport once the channel opens, and resends until the
//! client acknowledges or the attempts run out.
//!
//! # Key types
//!
//! - [`DeliveryMachine`]: the per-client state machine
//! - [`Stage`]: where a delivery stands
//! - [`DeliveryEvent`]: every input the machine reacts to
//! - [`PeerTransport`] / [`TransportFactory`]: the direct channel, supplied
//!   by the embedding application
//! - [`PayloadCache`]: the shared, lazily loaded payload
//! - [`spawn_delivery`] / [`DeliveryHandle`]: run a machine as an actor

mod actor;
mod config;
mod error;
mod event;
mod machine;
mod payload;
mod timer;
mod transport;

pub use actor::{DeliveryHandle, spawn_delivery};
pub use config::{DeliveryConfig, Stage};
pub use error::DeliveryError;
pub use event::{
    ConnectionState, DeliveryEvent, JoinEvent, NegotiationEvent, NegotiationState, TimerEvent,
    TransportEvent,
};
pub use machine::{DeliveryMachine, DeliveryStatus};
pub use payload::{FALLBACK_PAYLOAD, FilePayload, PayloadCache, PayloadSource, StaticPayload};
pub use transport::{PeerTransport, TransportEvents, TransportFactory};

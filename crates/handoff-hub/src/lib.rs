//! The relay hub for Handoff.
//!
//! One hub serves one session: at most one host and any number of
//! clients. It assigns client ids, routes host frames to the client they
//! name and client frames to the host, and holds frames for whichever
//! side is offline until it connects.
//!
//! # Key types
//!
//! - [`Session`]: the membership and backlog state, no I/O
//! - [`HubHandle`] / [`spawn_hub`]: the actor that owns a `Session`
//! - [`IdGenerator`]: where client ids come from
//! - [`HubConfig`]: backlog limits

mod config;
mod error;
mod hub;
mod ids;
mod session;

pub use config::HubConfig;
pub use error::HubError;
pub use hub::{HubHandle, spawn_hub};
pub use ids::{IdGenerator, RandomIds, SequentialIds};
pub use session::{ClientRecord, HubStats, Outbound, PeerSender, Session};

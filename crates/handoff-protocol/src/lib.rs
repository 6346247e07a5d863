//! Wire protocol for Handoff.
//!
//! This crate defines the frames that hosts, clients and the relay hub
//! exchange:
//!
//! - **Types** ([`Envelope`], [`ClientId`], [`Role`]): the JSON objects
//!   that travel on a relay connection.
//! - **Frames** ([`Frame`]): the same objects kept as raw JSON, which is
//!   what the hub routes so unknown fields pass through.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those frames are
//!   converted to/from bytes.
//! - **Errors** ([`ProtocolError`]): what can go wrong while doing so.
//!
//! ```text
//! Transport (bytes) → Protocol (Frame / Envelope) → Hub (routing) / Delivery (host side)
//! ```

mod codec;
mod error;
mod frame;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use frame::Frame;
pub use types::{ClientId, Envelope, Role};

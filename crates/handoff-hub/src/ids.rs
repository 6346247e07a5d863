//! Client id generation.
//!
//! The hub asks an [`IdGenerator`] for a fresh id on every client join and
//! retries on collision with a currently registered id, so generators only
//! need to be "probably unique", not perfect.

use handoff_protocol::ClientId;
use rand::Rng;

/// Produces candidate client ids.
pub trait IdGenerator: Send + 'static {
    /// Returns the next candidate id.
    fn next_id(&mut self) -> ClientId;
}

impl IdGenerator for Box<dyn IdGenerator> {
    fn next_id(&mut self) -> ClientId {
        (**self).next_id()
    }
}

/// Random 8-character lowercase hex ids (32 bits of entropy).
///
/// The default. Ids are short enough to put in a URL or a scannable code.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomIds;

impl IdGenerator for RandomIds {
    fn next_id(&mut self) -> ClientId {
        let bytes: [u8; 4] = rand::rng().random();
        ClientId::new(bytes.iter().map(|b| format!("{b:02x}")).collect::<String>())
    }
}

/// Sequential ids `c1`, `c2`, `c3`, …
///
/// Use when host and clients agree on ids ahead of time, and in tests.
#[derive(Debug, Clone)]
pub struct SequentialIds {
    next: u64,
}

impl SequentialIds {
    /// Starts counting at `c1`.
    pub fn new() -> Self {
        Self { next: 1 }
    }
}

impl Default for SequentialIds {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator for SequentialIds {
    fn next_id(&mut self) -> ClientId {
        let id = ClientId::new(format!("c{}", self.next));
        self.next += 1;
        id
    }
}

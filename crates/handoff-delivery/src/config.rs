//! Delivery configuration and the stage state machine.

use std::time::Duration;

// ---------------------------------------------------------------------------
// DeliveryConfig
// ---------------------------------------------------------------------------

/// Retry policy for payload delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryConfig {
    /// Total sends (first send plus resends) before giving up. With 0 the
    /// delivery fails as soon as the channel opens, without sending.
    pub max_attempts: u32,

    /// How long to wait for an ack before resending.
    pub retry_interval: Duration,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_interval: Duration::from_secs(3),
        }
    }
}

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// Where one client's delivery currently stands.
///
/// ```text
/// Connecting → Negotiating → PairingComplete → ChannelOpen → Delivering → Delivered
///                                                              ↺ retry
/// any non-terminal → Failed
/// any (not Closed) → Closed
/// ```
///
/// `ChannelOpen` is transient: the payload goes out as soon as the channel
/// opens, so observers normally see `Delivering` next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Connecting,
    Negotiating,
    PairingComplete,
    ChannelOpen,
    Delivering,
    Delivered,
    Failed,
    Closed,
}

impl Stage {
    /// Returns `true` for `Delivered`, `Failed` and `Closed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Failed | Self::Closed)
    }

    /// Returns `true` if moving from `self` to `target` is a legal step.
    pub fn can_transition_to(self, target: Self) -> bool {
        use Stage::*;
        match (self, target) {
            (Closed, _) => false,
            (_, Closed) => true,
            (from, Failed) => !from.is_terminal(),
            (Connecting, Negotiating)
            | (Negotiating, PairingComplete)
            | (PairingComplete, ChannelOpen)
            | (ChannelOpen, Delivering)
            | (Delivering, Delivering)
            | (Delivering, Delivered) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Connecting => "connecting",
            Self::Negotiating => "negotiating",
            Self::PairingComplete => "pairing-complete",
            Self::ChannelOpen => "channel-open",
            Self::Delivering => "delivering",
            Self::Delivered => "delivered",
            Self::Failed => "failed",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

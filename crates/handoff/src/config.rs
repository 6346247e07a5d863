//! Relay configuration from the environment.

use std::time::Duration;

use handoff_hub::HubConfig;
use serde::{Deserialize, Serialize};

use crate::HandoffError;

/// Port used when `PORT` is not set.
pub const DEFAULT_PORT: u16 = 8080;

/// How long a new connection has to send its `join`.
pub const DEFAULT_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Settings for a relay process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Address the listener binds to.
    pub bind_addr: String,

    /// Per-backlog frame limit. `None` keeps everything. `from_lookup`
    /// never produces `Some(0)`, which would discard every buffered frame.
    pub backlog_limit: Option<usize>,

    /// Deadline for the first `join` frame on a connection.
    pub join_timeout: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: format!("0.0.0.0:{DEFAULT_PORT}"),
            backlog_limit: None,
            join_timeout: DEFAULT_JOIN_TIMEOUT,
        }
    }
}

impl RelayConfig {
    /// Reads `PORT` and `BACKLOG_LIMIT` from the process environment.
    pub fn from_env() -> Result<Self, HandoffError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, HandoffError> {
        let mut config = Self::default();

        if let Some(raw) = lookup("PORT") {
            let port: u16 = raw
                .trim()
                .parse()
                .map_err(|_| HandoffError::Config(format!("PORT must be a port number, got {raw:?}")))?;
            config.bind_addr = format!("0.0.0.0:{port}");
        }

        if let Some(raw) = lookup("BACKLOG_LIMIT") {
            let limit = raw
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|&limit| limit > 0)
                .ok_or_else(|| {
                    HandoffError::Config(format!(
                        "BACKLOG_LIMIT must be a positive count, got {raw:?}"
                    ))
                })?;
            config.backlog_limit = Some(limit);
        }

        Ok(config)
    }

    /// The hub settings implied by this config.
    pub fn hub_config(&self) -> HubConfig {
        HubConfig {
            backlog_limit: self.backlog_limit,
        }
    }
}

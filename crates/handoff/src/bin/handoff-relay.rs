//! Runs a relay configured from the environment.
//!
//! `PORT` picks the listen port (default 8080), `BACKLOG_LIMIT` bounds each
//! offline backlog and `RUST_LOG` controls log output (default `info`).

use handoff::prelude::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), HandoffError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = RelayConfig::from_env()?;
    let server = RelayServerBuilder::from_config(&config).build().await?;
    tracing::info!(
        addr = %config.bind_addr,
        backlog_limit = ?config.backlog_limit,
        "starting relay"
    );
    server.run().await
}

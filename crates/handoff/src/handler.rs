//! Per-connection handler: join, then pump frames both ways.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Complete the WebSocket handshake within the join timeout
//!   2. Receive `join` within the join timeout → learn the role
//!   3. Register with the hub, handing it this connection's outbound channel
//!   4. Loop: inbound frames go to the hub, outbound frames go to the socket
//!
//! The hub owns all routing decisions; the handler only moves bytes.

use std::sync::Arc;

use handoff_hub::{HubHandle, Outbound};
use handoff_protocol::{Codec, Envelope, ProtocolError, Role};
use handoff_transport::{
    Connection, ConnectionId, Incoming, IncomingWebSocket, TransportError, WebSocketConnection,
};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::server::ServerState;
use crate::HandoffError;

/// Tells the hub the connection is gone when the handler exits, however
/// it exits.
struct LeaveGuard {
    connection: ConnectionId,
    hub: HubHandle,
}

impl Drop for LeaveGuard {
    fn drop(&mut self) {
        let _ = self.hub.leave(self.connection);
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C: Codec>(
    incoming: IncomingWebSocket,
    state: Arc<ServerState<C>>,
) -> Result<(), HandoffError> {
    // --- Step 1: handshake ---
    let addr = incoming.peer_addr();
    let conn = match tokio::time::timeout(state.join_timeout, incoming.upgrade()).await {
        Ok(result) => result?,
        Err(_) => {
            tracing::debug!(%addr, "websocket handshake timed out");
            return Err(TransportError::AcceptFailed(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "websocket handshake timed out",
            ))
            .into());
        }
    };
    let conn_id = conn.id();
    tracing::debug!(%conn_id, %addr, "handling new connection");

    // --- Step 2: join ---
    let role = match await_join(&conn, &state).await {
        Ok(role) => role,
        Err(e) => {
            let _ = conn.close().await;
            return Err(e);
        }
    };

    // --- Step 3: register ---
    let (tx, mut outbound) = mpsc::unbounded_channel();
    let _guard = LeaveGuard {
        connection: conn_id,
        hub: state.hub.clone(),
    };
    let client_id = state.hub.join(conn_id, role, tx).await?;
    tracing::debug!(%conn_id, %role, ?client_id, "registered with hub");

    // --- Step 4: pump ---
    loop {
        tokio::select! {
            received = conn.recv() => match received {
                Ok(Some(data)) => forward_inbound(&state, conn_id, &data)?,
                Ok(None) => {
                    tracing::debug!(%conn_id, "connection closed cleanly");
                    break;
                }
                Err(e) => {
                    tracing::debug!(%conn_id, error = %e, "recv error");
                    break;
                }
            },
            item = outbound.recv() => match item {
                Some(Outbound::Frame(frame)) => {
                    let bytes = state.codec.encode(&frame)?;
                    conn.send(&bytes).await?;
                }
                Some(Outbound::Close) => {
                    tracing::info!(%conn_id, "closing evicted host connection");
                    let _ = conn.close().await;
                    break;
                }
                None => break,
            },
        }
    }

    // _guard drops here → hub leave fires.
    Ok(())
}

/// Waits for the first frame and requires it to be a `join`.
async fn await_join<C: Codec>(
    conn: &WebSocketConnection,
    state: &ServerState<C>,
) -> Result<Role, HandoffError> {
    let data = match tokio::time::timeout(state.join_timeout, conn.recv()).await {
        Ok(Ok(Some(data))) => data,
        Ok(Ok(None)) => {
            return Err(ProtocolError::InvalidMessage("connection closed before join".into()).into());
        }
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => {
            return Err(ProtocolError::InvalidMessage("join timed out".into()).into());
        }
    };

    match state.codec.decode::<Envelope>(&data)? {
        Envelope::Join { role, .. } => Ok(role),
        other => Err(ProtocolError::InvalidMessage(format!(
            "first frame must be join, got {}",
            other.kind()
        ))
        .into()),
    }
}

/// Hands one inbound frame to the hub. Frames that are not JSON are
/// dropped here; everything else, including what to do with an unknown
/// `type`, is the hub's call.
fn forward_inbound<C: Codec>(
    state: &ServerState<C>,
    conn_id: ConnectionId,
    data: &[u8],
) -> Result<(), HandoffError> {
    let frame: Value = match state.codec.decode(data) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::debug!(%conn_id, error = %e, "dropping undecodable frame");
            return Ok(());
        }
    };
    state.hub.route(conn_id, frame)?;
    Ok(())
}

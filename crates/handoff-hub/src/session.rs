//! The hub session: who is connected, and what is waiting for whom.
//!
//! [`Session`] is plain synchronous state with no I/O of its own. Every
//! peer is represented by a [`PeerSender`], the outbound half of that
//! connection's channel; the connection task on the other end writes the
//! frames to the socket. Delivery is therefore either "pushed onto a live
//! sender now" or "appended to a backlog", never both.
//!
//! # Concurrency note
//!
//! Like the rest of the registry types in this workspace, `Session` is not
//! thread-safe by itself. It is owned by the hub actor (see
//! [`spawn_hub`](crate::spawn_hub)), which applies one connection event
//! at a time, so no locking is needed.

use std::collections::{HashMap, VecDeque};

use handoff_protocol::{ClientId, Frame, Role};
use handoff_transport::ConnectionId;
use serde_json::Value;
use tokio::sync::mpsc::{self, error::SendError};

use crate::{HubConfig, HubError, IdGenerator, RandomIds};

/// How many candidate ids to try before giving up on a join.
const MAX_ID_ATTEMPTS: usize = 64;

/// What the hub asks a connection task to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// Write this frame to the peer.
    Frame(Frame),
    /// Close the connection (host eviction).
    Close,
}

/// Channel sender for delivering outbound frames to one connection.
pub type PeerSender = mpsc::UnboundedSender<Outbound>;

/// A registered client connection.
#[derive(Debug)]
pub struct ClientRecord {
    /// The id the hub assigned on join.
    pub id: ClientId,
    /// The connection that owns this id.
    pub connection: ConnectionId,
    sender: PeerSender,
}

#[derive(Debug)]
struct HostSlot {
    connection: ConnectionId,
    sender: PeerSender,
}

/// FIFO of frames held for an offline target.
#[derive(Debug, Default)]
struct Backlog {
    frames: VecDeque<Frame>,
}

impl Backlog {
    /// Appends a frame, returning the oldest frame if `limit` forced it out.
    fn push(&mut self, frame: Frame, limit: Option<usize>) -> Option<Frame> {
        self.frames.push_back(frame);
        match limit {
            Some(limit) if self.frames.len() > limit => self.frames.pop_front(),
            _ => None,
        }
    }
}

/// Point-in-time counters for status reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HubStats {
    /// Whether a host is currently connected.
    pub host_connected: bool,
    /// Number of registered clients.
    pub clients: usize,
    /// Frames waiting for the next host.
    pub host_backlog: usize,
    /// Frames waiting across all client backlogs.
    pub client_backlog: usize,
}

/// The whole in-memory state of the relay.
///
/// ## Invariants
///
/// - At most one host connection at a time; a second host evicts the first.
/// - Client ids are unique among registered clients.
/// - Frames from one sender to one target keep their send order, whether
///   they are delivered directly or pass through a backlog.
pub struct Session {
    host: Option<HostSlot>,
    clients: HashMap<ClientId, ClientRecord>,
    /// Reverse index so `route`/`leave` can find a client by connection.
    by_connection: HashMap<ConnectionId, ClientId>,
    host_backlog: Backlog,
    client_backlogs: HashMap<ClientId, Backlog>,
    ids: Box<dyn IdGenerator>,
    config: HubConfig,
}

impl Session {
    /// Creates an empty session that assigns random client ids.
    pub fn new(config: HubConfig) -> Self {
        Self::with_ids(config, RandomIds)
    }

    /// Creates an empty session with a specific id generator.
    pub fn with_ids(config: HubConfig, ids: impl IdGenerator) -> Self {
        Self {
            host: None,
            clients: HashMap::new(),
            by_connection: HashMap::new(),
            host_backlog: Backlog::default(),
            client_backlogs: HashMap::new(),
            ids: Box::new(ids),
            config,
        }
    }

    /// Registers a connection in the given role.
    ///
    /// Returns the assigned id for clients, `None` for the host.
    ///
    /// # Errors
    /// - [`HubError::AlreadyJoined`] if this connection joined before.
    /// - [`HubError::IdExhausted`] if no unique id could be generated.
    pub fn join(
        &mut self,
        connection: ConnectionId,
        role: Role,
        sender: PeerSender,
    ) -> Result<Option<ClientId>, HubError> {
        if self.is_joined(connection) {
            return Err(HubError::AlreadyJoined(connection));
        }
        match role {
            Role::Host => {
                self.join_host(connection, sender);
                Ok(None)
            }
            Role::Client => self.join_client(connection, sender).map(Some),
        }
    }

    fn join_host(&mut self, connection: ConnectionId, sender: PeerSender) {
        if let Some(previous) = self.host.take() {
            tracing::info!(
                previous = %previous.connection,
                %connection,
                "evicting previous host"
            );
            let _ = previous.sender.send(Outbound::Close);
        }

        let pending = std::mem::take(&mut self.host_backlog.frames);
        let flushed = pending.len();
        self.host_backlog.frames = flush(&sender, pending);

        tracing::info!(
            %connection,
            flushed = flushed - self.host_backlog.frames.len(),
            "host joined"
        );
        self.host = Some(HostSlot { connection, sender });
    }

    fn join_client(
        &mut self,
        connection: ConnectionId,
        sender: PeerSender,
    ) -> Result<ClientId, HubError> {
        let id = self.fresh_id()?;

        self.clients.insert(
            id.clone(),
            ClientRecord {
                id: id.clone(),
                connection,
                sender: sender.clone(),
            },
        );
        self.by_connection.insert(connection, id.clone());

        let _ = sender.send(Outbound::Frame(Frame::notice("client-id", &id)));

        // Only non-empty when the host addressed this id before anyone
        // held it, i.e. with pre-agreed ids.
        let pending = self
            .client_backlogs
            .remove(&id)
            .map(|backlog| backlog.frames)
            .unwrap_or_default();
        let remaining = flush(&sender, pending);
        self.client_backlogs
            .insert(id.clone(), Backlog { frames: remaining });

        tracing::info!(%connection, client_id = %id, "client joined");
        self.send_to_host(Frame::notice("client-join", &id));
        Ok(id)
    }

    fn fresh_id(&mut self) -> Result<ClientId, HubError> {
        for _ in 0..MAX_ID_ATTEMPTS {
            let candidate = self.ids.next_id();
            if !self.clients.contains_key(&candidate) {
                return Ok(candidate);
            }
            tracing::debug!(client_id = %candidate, "client id collision, regenerating");
        }
        Err(HubError::IdExhausted)
    }

    /// Routes one frame from a joined connection.
    ///
    /// Host frames go to the client named by their `id` (buffered if that
    /// client is not connected). Client frames get their `id` overwritten
    /// with the sender's and go to the host (buffered if no host is
    /// connected). Apart from that `id`, the frame is forwarded unchanged,
    /// including fields and types the hub does not know.
    ///
    /// # Errors
    /// The frame is dropped and an error describes why; session state is
    /// unchanged.
    pub fn route(&mut self, connection: ConnectionId, frame: Value) -> Result<(), HubError> {
        let mut frame = Frame::from_value(frame)?;

        if self.host_connection() == Some(connection) {
            if frame.is_hub_event() {
                return Err(HubError::NotRoutable {
                    role: Role::Host,
                    kind: frame.kind().to_string(),
                });
            }
            let target = frame
                .target()
                .ok_or_else(|| HubError::MissingTarget(frame.kind().to_string()))?;
            self.send_to_client(target, frame);
            return Ok(());
        }

        let sender_id = self
            .by_connection
            .get(&connection)
            .cloned()
            .ok_or(HubError::NotJoined(connection))?;
        if frame.is_hub_event() {
            return Err(HubError::NotRoutable {
                role: Role::Client,
                kind: frame.kind().to_string(),
            });
        }
        frame.stamp_sender(&sender_id);
        self.send_to_host(frame);
        Ok(())
    }

    /// Removes a connection, returning the role it had (if it had joined).
    ///
    /// A departing host leaves the host backlog in place for the next
    /// host. A departing client loses its record and backlog, and the host
    /// is told with a `client-leave`.
    pub fn leave(&mut self, connection: ConnectionId) -> Option<Role> {
        if self.host_connection() == Some(connection) {
            self.host = None;
            tracing::info!(%connection, "host left");
            return Some(Role::Host);
        }

        let id = self.by_connection.remove(&connection)?;
        self.clients.remove(&id);
        self.client_backlogs.remove(&id);
        tracing::info!(%connection, client_id = %id, "client left");
        self.send_to_host(Frame::notice("client-leave", &id));
        Some(Role::Client)
    }

    fn send_to_host(&mut self, frame: Frame) {
        let frame = match &self.host {
            Some(host) => match host.sender.send(Outbound::Frame(frame)) {
                Ok(()) => return,
                Err(SendError(Outbound::Frame(frame))) => frame,
                Err(SendError(Outbound::Close)) => return,
            },
            None => frame,
        };
        if let Some(dropped) = self.host_backlog.push(frame, self.config.backlog_limit) {
            tracing::warn!(kind = dropped.kind(), "host backlog full, dropped oldest frame");
        }
    }

    fn send_to_client(&mut self, id: ClientId, frame: Frame) {
        let frame = match self.clients.get(&id) {
            Some(client) => match client.sender.send(Outbound::Frame(frame)) {
                Ok(()) => return,
                Err(SendError(Outbound::Frame(frame))) => frame,
                Err(SendError(Outbound::Close)) => return,
            },
            None => frame,
        };
        let backlog = self.client_backlogs.entry(id.clone()).or_default();
        if let Some(dropped) = backlog.push(frame, self.config.backlog_limit) {
            tracing::warn!(
                client_id = %id,
                kind = dropped.kind(),
                "client backlog full, dropped oldest frame"
            );
        }
    }

    fn is_joined(&self, connection: ConnectionId) -> bool {
        self.host_connection() == Some(connection) || self.by_connection.contains_key(&connection)
    }

    /// The current host connection, if any.
    pub fn host_connection(&self) -> Option<ConnectionId> {
        self.host.as_ref().map(|host| host.connection)
    }

    /// Looks up a registered client.
    pub fn client(&self, id: &ClientId) -> Option<&ClientRecord> {
        self.clients.get(id)
    }

    /// Number of frames waiting for the next host.
    pub fn host_backlog_len(&self) -> usize {
        self.host_backlog.frames.len()
    }

    /// Number of frames waiting for `id`.
    pub fn client_backlog_len(&self, id: &ClientId) -> usize {
        self.client_backlogs
            .get(id)
            .map_or(0, |backlog| backlog.frames.len())
    }

    /// Snapshot of the session counters.
    pub fn stats(&self) -> HubStats {
        HubStats {
            host_connected: self.host.is_some(),
            clients: self.clients.len(),
            host_backlog: self.host_backlog.frames.len(),
            client_backlog: self
                .client_backlogs
                .values()
                .map(|backlog| backlog.frames.len())
                .sum(),
        }
    }
}

/// Sends `frames` in order; returns whatever could not be sent.
fn flush(sender: &PeerSender, mut frames: VecDeque<Frame>) -> VecDeque<Frame> {
    while let Some(frame) = frames.pop_front() {
        if let Err(SendError(Outbound::Frame(frame))) = sender.send(Outbound::Frame(frame)) {
            frames.push_front(frame);
            break;
        }
    }
    frames
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! Unit tests for `Session`.
    //!
    //! Naming: `test_{operation}_{scenario}_{expected}`. Each "connection"
    //! is an unbounded channel; the receiver plays the socket writer.

    use handoff_protocol::Envelope;
    use serde_json::json;
    use tokio::sync::mpsc::UnboundedReceiver;

    use super::*;
    use crate::SequentialIds;

    // -- Helpers ----------------------------------------------------------

    fn session() -> Session {
        Session::with_ids(HubConfig::default(), SequentialIds::new())
    }

    fn conn(id: u64) -> ConnectionId {
        ConnectionId::new(id)
    }

    fn cid(id: &str) -> ClientId {
        ClientId::from(id)
    }

    fn peer() -> (PeerSender, UnboundedReceiver<Outbound>) {
        mpsc::unbounded_channel()
    }

    /// Drains everything currently queued for a peer.
    fn drain(rx: &mut UnboundedReceiver<Outbound>) -> Vec<Outbound> {
        let mut out = Vec::new();
        while let Ok(item) = rx.try_recv() {
            out.push(item);
        }
        out
    }

    /// Builds the outbound frame a typed envelope serializes to.
    fn frame(envelope: Envelope) -> Outbound {
        let value = serde_json::to_value(envelope).unwrap();
        Outbound::Frame(Frame::from_value(value).unwrap())
    }

    fn raw(value: Value) -> Outbound {
        Outbound::Frame(Frame::from_value(value).unwrap())
    }

    fn offer_to(id: &str, n: u32) -> Value {
        json!({"type": "offer", "id": id, "offer": {"n": n}})
    }

    fn offer_envelope(id: &str, n: u32) -> Envelope {
        Envelope::Offer {
            id: cid(id),
            offer: json!({"n": n}),
        }
    }

    // =====================================================================
    // join(): clients
    // =====================================================================

    #[test]
    fn test_join_client_sends_id_then_notifies_host() {
        let mut s = session();
        let (host_tx, mut host_rx) = peer();
        s.join(conn(1), Role::Host, host_tx).unwrap();

        let (tx, mut rx) = peer();
        let id = s.join(conn(2), Role::Client, tx).unwrap();

        assert_eq!(id, Some(cid("c1")));
        assert_eq!(drain(&mut rx), vec![frame(Envelope::ClientId { id: cid("c1") })]);
        assert_eq!(
            drain(&mut host_rx),
            vec![frame(Envelope::ClientJoin { id: cid("c1") })]
        );
    }

    #[test]
    fn test_join_client_without_host_buffers_client_join() {
        let mut s = session();
        let (tx, _rx) = peer();
        s.join(conn(2), Role::Client, tx).unwrap();

        assert_eq!(s.host_backlog_len(), 1);
        assert!(s.stats().clients == 1 && !s.stats().host_connected);
    }

    #[test]
    fn test_join_client_regenerates_on_collision() {
        /// Hands out "dup" twice, then "fresh".
        struct Colliding(Vec<&'static str>);
        impl IdGenerator for Colliding {
            fn next_id(&mut self) -> ClientId {
                ClientId::from(self.0.remove(0))
            }
        }

        let mut s = Session::with_ids(HubConfig::default(), Colliding(vec!["dup", "dup", "fresh"]));
        let (a, _ra) = peer();
        let (b, _rb) = peer();

        assert_eq!(s.join(conn(1), Role::Client, a).unwrap(), Some(cid("dup")));
        assert_eq!(s.join(conn(2), Role::Client, b).unwrap(), Some(cid("fresh")));
    }

    #[test]
    fn test_join_client_with_constant_generator_returns_id_exhausted() {
        struct Constant;
        impl IdGenerator for Constant {
            fn next_id(&mut self) -> ClientId {
                ClientId::from("same")
            }
        }

        let mut s = Session::with_ids(HubConfig::default(), Constant);
        let (a, _ra) = peer();
        let (b, _rb) = peer();
        s.join(conn(1), Role::Client, a).unwrap();

        assert!(matches!(
            s.join(conn(2), Role::Client, b),
            Err(HubError::IdExhausted)
        ));
        assert!(s.client(&cid("same")).is_some());
    }

    #[test]
    fn test_join_twice_on_same_connection_is_rejected() {
        let mut s = session();
        let (tx, _rx) = peer();
        s.join(conn(1), Role::Client, tx.clone()).unwrap();

        let result = s.join(conn(1), Role::Host, tx);
        assert!(matches!(result, Err(HubError::AlreadyJoined(c)) if c == conn(1)));
        assert_eq!(s.host_connection(), None);
    }

    #[test]
    fn test_join_client_flushes_preexisting_backlog_after_id() {
        // Pre-agreed ids: the host addresses c1 before anyone holds it.
        let mut s = session();
        let (host_tx, _host_rx) = peer();
        s.join(conn(1), Role::Host, host_tx).unwrap();
        s.route(conn(1), offer_to("c1", 1)).unwrap();
        s.route(conn(1), offer_to("c1", 2)).unwrap();
        assert_eq!(s.client_backlog_len(&cid("c1")), 2);

        let (tx, mut rx) = peer();
        s.join(conn(2), Role::Client, tx).unwrap();

        assert_eq!(
            drain(&mut rx),
            vec![
                frame(Envelope::ClientId { id: cid("c1") }),
                frame(offer_envelope("c1", 1)),
                frame(offer_envelope("c1", 2)),
            ]
        );
        assert_eq!(s.client_backlog_len(&cid("c1")), 0);
    }

    // =====================================================================
    // join(): host
    // =====================================================================

    #[test]
    fn test_join_host_flushes_backlog_in_order() {
        let mut s = session();
        let (a, _ra) = peer();
        let (b, _rb) = peer();
        s.join(conn(2), Role::Client, a).unwrap();
        s.join(conn(3), Role::Client, b).unwrap();
        s.leave(conn(2));

        let (host_tx, mut host_rx) = peer();
        s.join(conn(1), Role::Host, host_tx).unwrap();

        assert_eq!(
            drain(&mut host_rx),
            vec![
                frame(Envelope::ClientJoin { id: cid("c1") }),
                frame(Envelope::ClientJoin { id: cid("c2") }),
                frame(Envelope::ClientLeave { id: cid("c1") }),
            ]
        );
        assert_eq!(s.host_backlog_len(), 0);
    }

    #[test]
    fn test_join_host_evicts_previous_host() {
        let mut s = session();
        let (old_tx, mut old_rx) = peer();
        s.join(conn(1), Role::Host, old_tx).unwrap();

        let (new_tx, _new_rx) = peer();
        s.join(conn(2), Role::Host, new_tx).unwrap();

        assert_eq!(drain(&mut old_rx), vec![Outbound::Close]);
        assert_eq!(s.host_connection(), Some(conn(2)));
    }

    #[test]
    fn test_evicted_host_leave_does_not_clear_new_host() {
        let mut s = session();
        let (old_tx, _old_rx) = peer();
        let (new_tx, _new_rx) = peer();
        s.join(conn(1), Role::Host, old_tx).unwrap();
        s.join(conn(2), Role::Host, new_tx).unwrap();

        // The evicted connection's task closes and reports its leave late.
        assert_eq!(s.leave(conn(1)), None);
        assert_eq!(s.host_connection(), Some(conn(2)));
    }

    #[test]
    fn test_join_host_with_dead_sender_keeps_backlog() {
        let mut s = session();
        let (a, _ra) = peer();
        s.join(conn(2), Role::Client, a).unwrap();

        let (host_tx, host_rx) = peer();
        drop(host_rx);
        s.join(conn(1), Role::Host, host_tx).unwrap();

        assert_eq!(s.host_backlog_len(), 1, "undelivered frames stay queued");
    }

    // =====================================================================
    // route()
    // =====================================================================

    #[test]
    fn test_route_host_to_connected_client_delivers_verbatim() {
        let mut s = session();
        let (host_tx, _host_rx) = peer();
        let (tx, mut rx) = peer();
        s.join(conn(1), Role::Host, host_tx).unwrap();
        s.join(conn(2), Role::Client, tx).unwrap();
        drain(&mut rx);

        s.route(conn(1), offer_to("c1", 7)).unwrap();

        assert_eq!(drain(&mut rx), vec![frame(offer_envelope("c1", 7))]);
        assert_eq!(s.client_backlog_len(&cid("c1")), 0);
    }

    #[test]
    fn test_route_host_keeps_fields_outside_the_schema() {
        let mut s = session();
        let (host_tx, _host_rx) = peer();
        let (tx, mut rx) = peer();
        s.join(conn(1), Role::Host, host_tx).unwrap();
        s.join(conn(2), Role::Client, tx).unwrap();
        drain(&mut rx);

        let sent = json!({"type": "offer", "id": "c1", "offer": {"sdp": "x"}, "seq": 7});
        s.route(conn(1), sent.clone()).unwrap();

        assert_eq!(drain(&mut rx), vec![raw(sent)]);
    }

    #[test]
    fn test_route_unlisted_type_is_forwarded_both_ways() {
        let mut s = session();
        let (host_tx, mut host_rx) = peer();
        let (tx, mut rx) = peer();
        s.join(conn(1), Role::Host, host_tx).unwrap();
        s.join(conn(2), Role::Client, tx).unwrap();
        drain(&mut rx);
        drain(&mut host_rx);

        s.route(conn(1), json!({"type": "renegotiate", "id": "c1"})).unwrap();
        s.route(conn(2), json!({"type": "stats", "rtt": 12})).unwrap();

        assert_eq!(drain(&mut rx), vec![raw(json!({"type": "renegotiate", "id": "c1"}))]);
        assert_eq!(
            drain(&mut host_rx),
            vec![raw(json!({"type": "stats", "rtt": 12, "id": "c1"}))]
        );
    }

    #[test]
    fn test_route_host_to_unknown_client_buffers() {
        let mut s = session();
        let (host_tx, _host_rx) = peer();
        s.join(conn(1), Role::Host, host_tx).unwrap();

        s.route(conn(1), offer_to("nobody", 1)).unwrap();

        assert_eq!(s.client_backlog_len(&cid("nobody")), 1);
    }

    #[test]
    fn test_route_host_frame_without_target_is_dropped() {
        let mut s = session();
        let (host_tx, _host_rx) = peer();
        s.join(conn(1), Role::Host, host_tx).unwrap();

        let result = s.route(conn(1), json!({"type": "content-ack"}));

        assert!(matches!(result, Err(HubError::MissingTarget(ref kind)) if kind == "content-ack"));
        assert_eq!(s.stats().client_backlog, 0);
    }

    #[test]
    fn test_route_host_cannot_forge_hub_events() {
        let mut s = session();
        let (host_tx, _host_rx) = peer();
        s.join(conn(1), Role::Host, host_tx).unwrap();

        let result = s.route(conn(1), json!({"type": "client-id", "id": "c1"}));

        assert!(matches!(
            result,
            Err(HubError::NotRoutable { role: Role::Host, ref kind }) if kind == "client-id"
        ));
    }

    #[test]
    fn test_route_client_stamps_sender_id() {
        let mut s = session();
        let (host_tx, mut host_rx) = peer();
        let (tx, _rx) = peer();
        s.join(conn(1), Role::Host, host_tx).unwrap();
        s.join(conn(2), Role::Client, tx).unwrap();
        drain(&mut host_rx);

        s.route(
            conn(2),
            json!({"type": "answer", "id": "c999", "answer": {"sdp": "x"}}),
        )
        .unwrap();

        assert_eq!(
            drain(&mut host_rx),
            vec![frame(Envelope::Answer {
                id: cid("c1"),
                answer: json!({"sdp": "x"}),
            })]
        );
    }

    #[test]
    fn test_route_client_without_host_buffers_in_order() {
        let mut s = session();
        let (tx, _rx) = peer();
        s.join(conn(2), Role::Client, tx).unwrap();

        for n in 0..3 {
            s.route(
                conn(2),
                json!({"type": "ice", "candidate": {"n": n}}),
            )
            .unwrap();
        }

        let (host_tx, mut host_rx) = peer();
        s.join(conn(1), Role::Host, host_tx).unwrap();
        let received = drain(&mut host_rx);

        assert_eq!(received.len(), 4);
        assert_eq!(received[0], frame(Envelope::ClientJoin { id: cid("c1") }));
        for (n, item) in received[1..].iter().enumerate() {
            assert_eq!(
                *item,
                frame(Envelope::Ice {
                    id: cid("c1"),
                    candidate: json!({"n": n}),
                })
            );
        }
    }

    #[test]
    fn test_route_client_cannot_send_hub_events() {
        let mut s = session();
        let (tx, _rx) = peer();
        s.join(conn(2), Role::Client, tx).unwrap();
        let before = s.host_backlog_len();

        let result = s.route(conn(2), json!({"type": "client-leave", "id": "c1"}));

        assert!(matches!(result, Err(HubError::NotRoutable { role: Role::Client, .. })));
        assert_eq!(s.host_backlog_len(), before);
    }

    #[test]
    fn test_route_malformed_frame_is_dropped() {
        let mut s = session();
        let (tx, _rx) = peer();
        s.join(conn(2), Role::Client, tx).unwrap();

        assert!(matches!(
            s.route(conn(2), json!({"id": "c1", "answer": {}})),
            Err(HubError::Malformed(_))
        ));
        assert!(matches!(
            s.route(conn(2), json!("just a string")),
            Err(HubError::Malformed(_))
        ));
    }

    #[test]
    fn test_route_from_unjoined_connection_is_rejected() {
        let mut s = session();
        let result = s.route(conn(9), offer_to("c1", 1));
        assert!(matches!(result, Err(HubError::NotJoined(c)) if c == conn(9)));
    }

    // =====================================================================
    // leave()
    // =====================================================================

    #[test]
    fn test_leave_client_notifies_host_and_deletes_backlog() {
        let mut s = session();
        let (tx, _rx) = peer();
        s.join(conn(2), Role::Client, tx).unwrap();
        let (host_tx, mut host_rx) = peer();
        s.join(conn(1), Role::Host, host_tx).unwrap();
        drain(&mut host_rx);

        assert_eq!(s.leave(conn(2)), Some(Role::Client));

        assert_eq!(
            drain(&mut host_rx),
            vec![frame(Envelope::ClientLeave { id: cid("c1") })]
        );
        assert!(s.client(&cid("c1")).is_none());
    }

    #[test]
    fn test_leave_host_keeps_host_backlog_for_next_host() {
        let mut s = session();
        let (host_tx, _host_rx) = peer();
        s.join(conn(1), Role::Host, host_tx).unwrap();
        assert_eq!(s.leave(conn(1)), Some(Role::Host));

        let (tx, _rx) = peer();
        s.join(conn(2), Role::Client, tx).unwrap();
        assert_eq!(s.host_backlog_len(), 1);

        let (next_tx, mut next_rx) = peer();
        s.join(conn(3), Role::Host, next_tx).unwrap();
        assert_eq!(
            drain(&mut next_rx),
            vec![frame(Envelope::ClientJoin { id: cid("c1") })]
        );
    }

    #[test]
    fn test_leave_unknown_connection_is_noop() {
        let mut s = session();
        assert_eq!(s.leave(conn(5)), None);
        assert_eq!(s.stats(), HubStats::default());
    }

    #[test]
    fn test_reconnect_gets_new_id_and_old_queue_is_never_delivered() {
        let mut s = session();
        let (host_tx, _host_rx) = peer();
        s.join(conn(1), Role::Host, host_tx).unwrap();

        let (first, _first_rx) = peer();
        s.join(conn(2), Role::Client, first).unwrap();
        s.leave(conn(2));
        s.route(conn(1), offer_to("c1", 1)).unwrap();

        let (second, mut second_rx) = peer();
        let id = s.join(conn(3), Role::Client, second).unwrap();

        assert_eq!(id, Some(cid("c2")));
        assert_eq!(drain(&mut second_rx), vec![frame(Envelope::ClientId { id: cid("c2") })]);
        assert_eq!(s.client_backlog_len(&cid("c1")), 1, "stale queue stays behind");
    }

    // =====================================================================
    // Backlog limits
    // =====================================================================

    #[test]
    fn test_unbounded_backlog_keeps_everything() {
        let mut s = session();
        let (host_tx, _host_rx) = peer();
        s.join(conn(1), Role::Host, host_tx).unwrap();

        for n in 0..1_000 {
            s.route(conn(1), offer_to("gone", n)).unwrap();
        }

        assert_eq!(s.client_backlog_len(&cid("gone")), 1_000);
    }

    #[test]
    fn test_bounded_backlog_drops_oldest() {
        let mut s = Session::with_ids(HubConfig::with_backlog_limit(2), SequentialIds::new());
        let (host_tx, _host_rx) = peer();
        s.join(conn(1), Role::Host, host_tx).unwrap();
        for n in 1..=3 {
            s.route(conn(1), offer_to("c1", n)).unwrap();
        }

        let (tx, mut rx) = peer();
        s.join(conn(2), Role::Client, tx).unwrap();

        assert_eq!(
            drain(&mut rx),
            vec![
                frame(Envelope::ClientId { id: cid("c1") }),
                frame(offer_envelope("c1", 2)),
                frame(offer_envelope("c1", 3)),
            ]
        );
    }

    #[test]
    fn test_bounded_host_backlog_drops_oldest() {
        let mut s = Session::with_ids(HubConfig::with_backlog_limit(1), SequentialIds::new());
        let (a, _ra) = peer();
        s.join(conn(2), Role::Client, a).unwrap();
        s.leave(conn(2));

        assert_eq!(s.host_backlog_len(), 1);
        let (host_tx, mut host_rx) = peer();
        s.join(conn(1), Role::Host, host_tx).unwrap();
        assert_eq!(
            drain(&mut host_rx),
            vec![frame(Envelope::ClientLeave { id: cid("c1") })]
        );
    }
}

//! Reliable connection to a game server.
//!
//! A single driver task owns the socket, the nonce counter, the pending
//! reliable sends and the packet waiters. Handles talk to it over a channel,
//! so every receive, acknowledgment and send is serialized through one loop.
//!
//! Per datagram the driver:
//! 1. acknowledges it if the opcode requires one (before decoding);
//! 2. settles the pending send matched by an inbound Acknowledge;
//! 3. resolves the waiters whose filter matches;
//! 4. forwards the packet to the [`Inbound`] stream.
//!
//! A server Disconnect, a socket error or dropping every [`Connection`]
//! tears the session down: pending sends settle as
//! [`SendOutcome::ConnectionLost`] and waiters resolve to `None`.

use crate::codec::{decode_packet, encode_packet, DEFAULT_CLIENT_VERSION, HAZEL_VERSION};
use crate::protocol::{Bound, Opcode, Packet, Payload};
use crate::transport::{RetransmitTimer, Transport, MAX_DATAGRAM};
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

/// Transport settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Interval between re-sends of an unacknowledged reliable packet.
    pub ack_interval: Duration,
    /// Version number sent in Hello.
    pub client_version: i32,
    /// How long `disconnect` waits for the server's Disconnect.
    pub disconnect_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            ack_interval: Duration::from_millis(1500),
            client_version: DEFAULT_CLIENT_VERSION,
            disconnect_timeout: Duration::from_secs(5),
        }
    }
}

/// Lifecycle of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// Socket closed.
    Disconnected,
    /// Socket open, Hello not yet acknowledged.
    Connecting,
    /// Hello acknowledged.
    Connected,
}

/// How a send ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Unreliable packet handed to the socket.
    Sent,
    /// Reliable packet acknowledged by the server.
    Acknowledged,
    /// The session ended before the packet was sent or acknowledged.
    ConnectionLost,
}

/// Every packet received on a connection, in arrival order.
pub type Inbound = mpsc::UnboundedReceiver<Packet>;

type Filter = Box<dyn Fn(&Packet) -> bool + Send>;

enum Command {
    Send {
        bytes: Vec<u8>,
        reliable: bool,
        reply: oneshot::Sender<SendOutcome>,
    },
    Await {
        filter: Filter,
        reply: oneshot::Sender<Option<Packet>>,
    },
    Shutdown,
}

/// Handle to a running connection. Cheap to clone.
#[derive(Clone)]
pub struct Connection {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ConnectionState>,
    state_tx: Arc<watch::Sender<ConnectionState>>,
    local: SocketAddr,
    remote: SocketAddr,
    config: ConnectionConfig,
}

impl Connection {
    /// Open a socket to `remote` and start the driver task.
    pub async fn connect(remote: SocketAddr, config: ConnectionConfig) -> Result<(Self, Inbound)> {
        info!("Connecting to server at {}", remote);

        let transport = Transport::connect(remote).await?;
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(ConnectionState::Connecting);
        let state_tx = Arc::new(state_tx);

        let driver = Driver {
            transport: transport.clone(),
            commands: command_rx,
            inbound: inbound_tx,
            state: state_tx.clone(),
            ack_interval: config.ack_interval,
            nonce: 1,
            pending: HashMap::new(),
            waiters: Vec::new(),
        };
        tokio::spawn(driver.run());

        let connection = Self {
            commands,
            state,
            state_tx,
            local: transport.local_addr(),
            remote,
            config,
        };
        Ok((connection, inbound))
    }

    /// Send a reliable Hello and wait for its acknowledgment.
    pub async fn identify(&self, username: &str) -> Result<()> {
        debug!("Identifying as {}", username);
        let hello = Packet::Hello {
            nonce: 0,
            hazel_version: HAZEL_VERSION,
            client_version: self.config.client_version,
            username: username.to_string(),
        };

        match self.send(hello).await? {
            SendOutcome::Acknowledged => {
                self.state_tx.send_replace(ConnectionState::Connected);
                info!("Identified to {} as {}", self.remote, username);
                Ok(())
            }
            outcome => bail!("Hello to {} was not acknowledged ({:?})", self.remote, outcome),
        }
    }

    /// Send a packet. Acknowledged opcodes get the next nonce and are re-sent
    /// every `ack_interval` until the server acknowledges them or the session
    /// ends.
    pub async fn send(&self, packet: Packet) -> Result<SendOutcome> {
        let reliable = packet.needs_ack();
        let bytes = encode_packet(&packet, Bound::Server)?;
        let (reply, outcome) = oneshot::channel();

        if self
            .commands
            .send(Command::Send {
                bytes,
                reliable,
                reply,
            })
            .is_err()
        {
            return Ok(SendOutcome::ConnectionLost);
        }
        Ok(outcome.await.unwrap_or(SendOutcome::ConnectionLost))
    }

    /// Send payloads in one reliable packet.
    pub async fn send_reliable(&self, payloads: Vec<Payload>) -> Result<SendOutcome> {
        self.send(Packet::reliable(payloads)).await
    }

    /// Send payloads in one unreliable packet.
    pub async fn send_unreliable(&self, payloads: Vec<Payload>) -> Result<SendOutcome> {
        self.send(Packet::unreliable(payloads)).await
    }

    /// Wait for the first inbound packet matching `filter`.
    ///
    /// The waiter is registered when this is called, not when the future is
    /// first polled, so it sees every packet that arrives after any send made
    /// later on this handle. Resolves to `None` when the session ends.
    pub fn await_packet<F>(&self, filter: F) -> impl Future<Output = Option<Packet>> + Send + 'static
    where
        F: Fn(&Packet) -> bool + Send + 'static,
    {
        let (reply, packet) = oneshot::channel();
        let _ = self.commands.send(Command::Await {
            filter: Box::new(filter),
            reply,
        });
        async move { packet.await.ok().flatten() }
    }

    /// Wait for the first inbound payload matching `filter`.
    pub fn await_payload<F>(&self, filter: F) -> impl Future<Output = Option<Payload>> + Send + 'static
    where
        F: Fn(&Payload) -> bool + Send + Sync + 'static,
    {
        let filter = Arc::new(filter);
        let matcher = filter.clone();
        let packet = self.await_packet(move |packet| packet.payloads().iter().any(|p| matcher(p)));
        async move {
            let packet = packet.await?;
            packet.payloads().iter().find(|p| filter(p)).cloned()
        }
    }

    /// Send Disconnect, wait for the server's Disconnect (bounded by
    /// `disconnect_timeout`), then tear the session down.
    pub async fn disconnect(&self) -> Result<()> {
        if self.state() == ConnectionState::Disconnected {
            return Ok(());
        }
        info!("Disconnecting from {}", self.remote);

        let goodbye = self.await_packet(|packet| matches!(packet, Packet::Disconnect { .. }));
        let bye = Packet::Disconnect {
            reason: None,
            message: None,
        };
        if self.send(bye).await? == SendOutcome::Sent
            && tokio::time::timeout(self.config.disconnect_timeout, goodbye)
                .await
                .is_err()
        {
            debug!("Server at {} did not answer the disconnect", self.remote);
        }

        let _ = self.commands.send(Command::Shutdown);
        let mut state = self.state.clone();
        let _ = state
            .wait_for(|s| *s == ConnectionState::Disconnected)
            .await;
        Ok(())
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Subscribe to state changes.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Local socket address.
    pub fn local_addr(&self) -> SocketAddr {
        self.local
    }

    /// Server address.
    pub fn remote_addr(&self) -> SocketAddr {
        self.remote
    }

    /// Settings this connection was opened with.
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }
}

struct PendingSend {
    _timer: RetransmitTimer,
    reply: oneshot::Sender<SendOutcome>,
}

struct Waiter {
    filter: Filter,
    reply: oneshot::Sender<Option<Packet>>,
}

struct Driver {
    transport: Transport,
    commands: mpsc::UnboundedReceiver<Command>,
    inbound: mpsc::UnboundedSender<Packet>,
    state: Arc<watch::Sender<ConnectionState>>,
    ack_interval: Duration,
    nonce: u16,
    pending: HashMap<u16, PendingSend>,
    waiters: Vec<Waiter>,
}

/// Nonce of a datagram whose opcode requires an acknowledgment.
fn ack_nonce(data: &[u8]) -> Option<u16> {
    let opcode = Opcode::try_from(*data.first()?).ok()?;
    if !opcode.needs_ack() || data.len() < 3 {
        return None;
    }
    Some(u16::from_be_bytes([data[1], data[2]]))
}

impl Driver {
    async fn run(mut self) {
        let mut buf = vec![0u8; MAX_DATAGRAM];

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Send { bytes, reliable, reply }) => {
                        self.send(bytes, reliable, reply).await;
                    }
                    Some(Command::Await { filter, reply }) => {
                        self.waiters.push(Waiter { filter, reply });
                    }
                    Some(Command::Shutdown) | None => break,
                },
                received = self.transport.recv(&mut buf) => match received {
                    Ok(len) => {
                        if !self.receive(&buf[..len]).await {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("Connection to {} failed: {:#}", self.transport.remote_addr(), e);
                        break;
                    }
                },
            }
        }

        self.teardown();
    }

    fn next_nonce(&mut self) -> u16 {
        let nonce = self.nonce;
        self.nonce = self.nonce.wrapping_add(1);
        nonce
    }

    async fn send(&mut self, mut bytes: Vec<u8>, reliable: bool, reply: oneshot::Sender<SendOutcome>) {
        if !reliable {
            let outcome = match self.transport.send(&bytes).await {
                Ok(()) => SendOutcome::Sent,
                Err(e) => {
                    warn!("{:#}", e);
                    SendOutcome::ConnectionLost
                }
            };
            let _ = reply.send(outcome);
            return;
        }

        // Acknowledged opcodes carry the nonce at bytes 1..3, big-endian.
        let nonce = self.next_nonce();
        bytes[1..3].copy_from_slice(&nonce.to_be_bytes());

        if let Err(e) = self.transport.send(&bytes).await {
            warn!("{:#}", e);
            let _ = reply.send(SendOutcome::ConnectionLost);
            return;
        }

        debug!(nonce, "Awaiting acknowledgement");
        let timer = self.transport.retransmit(nonce, bytes, self.ack_interval);
        self.pending.insert(
            nonce,
            PendingSend {
                _timer: timer,
                reply,
            },
        );
    }

    /// Handle one datagram. Returns false once the server has closed the session.
    async fn receive(&mut self, data: &[u8]) -> bool {
        if let Some(nonce) = ack_nonce(data) {
            let ack = [u8::from(Opcode::Acknowledge), (nonce >> 8) as u8, nonce as u8, 0xff];
            if let Err(e) = self.transport.send(&ack).await {
                warn!("Failed to acknowledge {}: {:#}", nonce, e);
            }
        }

        let packet = match decode_packet(data, Bound::Client) {
            Ok(packet) => packet,
            Err(e) => {
                warn!("Dropping undecodable packet from {}: {}", self.transport.remote_addr(), e);
                return true;
            }
        };

        if let Packet::Acknowledge { nonce } = packet {
            // Dropping the entry stops its retransmit timer.
            if let Some(pending) = self.pending.remove(&nonce) {
                debug!(nonce, "Received acknowledgement");
                let _ = pending.reply.send(SendOutcome::Acknowledged);
            }
        }

        self.waiters.retain(|w| !w.reply.is_closed());
        let mut i = 0;
        while i < self.waiters.len() {
            if (self.waiters[i].filter)(&packet) {
                let waiter = self.waiters.remove(i);
                let _ = waiter.reply.send(Some(packet.clone()));
            } else {
                i += 1;
            }
        }

        let closed = matches!(packet, Packet::Disconnect { .. });
        if let Packet::Disconnect { reason: Some(reason), .. } = &packet {
            info!("Server at {} disconnected us: {}", self.transport.remote_addr(), reason);
        }
        let _ = self.inbound.send(packet);
        !closed
    }

    fn teardown(&mut self) {
        for (_, pending) in self.pending.drain() {
            let _ = pending.reply.send(SendOutcome::ConnectionLost);
        }
        for waiter in self.waiters.drain(..) {
            let _ = waiter.reply.send(None);
        }
        self.state.send_replace(ConnectionState::Disconnected);
        info!("Connection to {} closed", self.transport.remote_addr());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auproxy_core::DisconnectReason;
    use auproxy_testkit::FakeServer;

    fn quick() -> ConnectionConfig {
        ConnectionConfig {
            ack_interval: Duration::from_millis(40),
            disconnect_timeout: Duration::from_millis(200),
            ..ConnectionConfig::default()
        }
    }

    fn client_bytes(packet: &Packet) -> Vec<u8> {
        encode_packet(packet, Bound::Client).unwrap()
    }

    #[tokio::test]
    async fn test_identify_sends_hello_with_first_nonce() {
        let mut server = FakeServer::bind().await.unwrap();
        let (conn, _inbound) = Connection::connect(server.local_addr(), quick()).await.unwrap();
        assert_eq!(conn.state(), ConnectionState::Connecting);

        let identify = tokio::spawn({
            let conn = conn.clone();
            async move { conn.identify("weakeyes").await }
        });

        let hello = server.expect_opcode(0x08).await.unwrap();
        assert_eq!(&hello[..4], &[0x08, 0x00, 0x01, 0x00]);
        assert_eq!(&hello[4..8], &DEFAULT_CLIENT_VERSION.to_be_bytes());

        identify.await.unwrap().unwrap();
        assert_eq!(conn.state(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_inbound_reliable_is_acked_then_forwarded() {
        let mut server = FakeServer::bind().await.unwrap();
        server.set_auto_ack(false);
        let (conn, mut inbound) = Connection::connect(server.local_addr(), quick()).await.unwrap();

        let identify = tokio::spawn({
            let conn = conn.clone();
            async move { conn.identify("a").await }
        });
        server.expect_opcode(0x08).await.unwrap();
        server.send(&[0x0a, 0x00, 0x01, 0xff]).await.unwrap();
        identify.await.unwrap().unwrap();
        assert_eq!(
            inbound.recv().await,
            Some(Packet::Acknowledge { nonce: 1 })
        );

        let packet = Packet::Reliable {
            nonce: 5,
            payloads: vec![Payload::StartGame { code: 3 }],
        };
        server.send(&client_bytes(&packet)).await.unwrap();

        let ack = server.expect_ack(5).await.unwrap();
        assert_eq!(ack, vec![0x0a, 0x00, 0x05, 0xff]);
        assert_eq!(inbound.recv().await, Some(packet));
    }

    #[tokio::test]
    async fn test_reliable_send_retransmits_until_acked() {
        let mut server = FakeServer::bind().await.unwrap();
        server.set_auto_ack(false);
        let (conn, _inbound) = Connection::connect(server.local_addr(), quick()).await.unwrap();

        let send = tokio::spawn({
            let conn = conn.clone();
            async move {
                conn.send_reliable(vec![Payload::StartGame { code: 1 }])
                    .await
                    .unwrap()
            }
        });

        let first = server.expect_opcode(0x01).await.unwrap();
        let second = server.expect_opcode(0x01).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(&first[1..3], &[0x00, 0x01]);

        server.send(&[0x0a, 0x00, 0x01, 0xff]).await.unwrap();
        assert_eq!(send.await.unwrap(), SendOutcome::Acknowledged);

        // A copy already in flight may still land; after that, silence.
        tokio::time::sleep(Duration::from_millis(60)).await;
        server.drain();
        let late = server.recv_timeout(Duration::from_millis(250)).await;
        assert_eq!(late, None, "retransmitted after the ack");
    }

    #[tokio::test]
    async fn test_await_payload_matches_one_of_many() {
        let mut server = FakeServer::bind().await.unwrap();
        let (conn, _inbound) = Connection::connect(server.local_addr(), quick()).await.unwrap();
        conn.identify("a").await.ok();
        server.expect_opcode(0x08).await.unwrap();

        let waiter = conn.await_payload(|p| matches!(p, Payload::WaitForHost { .. }));
        let packet = Packet::Reliable {
            nonce: 1,
            payloads: vec![
                Payload::StartGame { code: 9 },
                Payload::WaitForHost {
                    code: 9,
                    client_id: 2,
                },
            ],
        };
        server.send(&client_bytes(&packet)).await.unwrap();

        assert_eq!(
            waiter.await,
            Some(Payload::WaitForHost {
                code: 9,
                client_id: 2
            })
        );
    }

    #[tokio::test]
    async fn test_server_disconnect_resolves_everything() {
        let mut server = FakeServer::bind().await.unwrap();
        server.set_auto_ack(false);
        let (conn, mut inbound) = Connection::connect(server.local_addr(), quick()).await.unwrap();

        let waiter = conn.await_payload(|p| matches!(p, Payload::JoinedGame { .. }));
        let send = tokio::spawn({
            let conn = conn.clone();
            async move { conn.send_reliable(vec![Payload::RemoveGame]).await.unwrap() }
        });
        server.expect_opcode(0x01).await.unwrap();

        let bye = Packet::Disconnect {
            reason: Some(DisconnectReason::Kicked),
            message: None,
        };
        server.send(&client_bytes(&bye)).await.unwrap();

        assert_eq!(waiter.await, None);
        assert_eq!(send.await.unwrap(), SendOutcome::ConnectionLost);
        assert_eq!(inbound.recv().await, Some(bye));
        assert_eq!(inbound.recv().await, None);
        assert_eq!(conn.state(), ConnectionState::Disconnected);
        assert_eq!(
            conn.send_unreliable(vec![]).await.unwrap(),
            SendOutcome::ConnectionLost
        );
    }

    #[tokio::test]
    async fn test_disconnect_waits_for_server_reply() {
        let mut server = FakeServer::bind().await.unwrap();
        let (conn, _inbound) = Connection::connect(server.local_addr(), quick()).await.unwrap();
        conn.identify("a").await.ok();
        server.expect_opcode(0x08).await.unwrap();

        let disconnect = tokio::spawn({
            let conn = conn.clone();
            async move { conn.disconnect().await }
        });
        assert_eq!(server.expect_opcode(0x09).await.unwrap(), vec![0x09]);
        server.send(&[0x09]).await.unwrap();

        disconnect.await.unwrap().unwrap();
        assert_eq!(conn.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_disconnect_gives_up_on_silent_server() {
        let server = FakeServer::bind().await.unwrap();
        let (conn, _inbound) = Connection::connect(server.local_addr(), quick()).await.unwrap();
        conn.disconnect().await.unwrap();
        assert_eq!(conn.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_ack_nonce_reads_header() {
        assert_eq!(ack_nonce(&[0x01, 0x12, 0x34]), Some(0x1234));
        assert_eq!(ack_nonce(&[0x0c, 0x00, 0x07]), Some(7));
        assert_eq!(ack_nonce(&[0x00, 0x12, 0x34]), None);
        assert_eq!(ack_nonce(&[0x01, 0x12]), None);
        assert_eq!(ack_nonce(&[]), None);
    }
}

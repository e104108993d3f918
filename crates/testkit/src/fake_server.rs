//! Scripted stand-in for a game server.
//!
//! Works on raw datagrams so it can be used by the crates that implement the
//! codec without depending on them. A background task reads the socket,
//! remembers the last peer, and (unless disabled) acknowledges every datagram
//! whose opcode expects it.

use anyhow::{anyhow, bail, Context, Result};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Opcodes that carry a nonce and expect an acknowledgment.
const ACKED_OPCODES: [u8; 3] = [0x01, 0x08, 0x0c];
const ACKNOWLEDGE: u8 = 0x0a;

/// How long `expect_*` helpers wait before failing.
pub const EXPECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Loopback UDP server for connection tests.
pub struct FakeServer {
    socket: Arc<UdpSocket>,
    local: SocketAddr,
    peer: Arc<Mutex<Option<SocketAddr>>>,
    auto_ack: Arc<AtomicBool>,
    received: mpsc::UnboundedReceiver<Vec<u8>>,
    reader: JoinHandle<()>,
}

impl FakeServer {
    /// Bind to an ephemeral loopback port.
    pub async fn bind() -> Result<Self> {
        let socket = Arc::new(
            UdpSocket::bind("127.0.0.1:0")
                .await
                .context("Failed to bind fake server")?,
        );
        let local = socket.local_addr()?;
        let peer = Arc::new(Mutex::new(None));
        let auto_ack = Arc::new(AtomicBool::new(true));
        let (tx, received) = mpsc::unbounded_channel();

        let reader = tokio::spawn(read_loop(
            socket.clone(),
            peer.clone(),
            auto_ack.clone(),
            tx,
        ));

        Ok(Self {
            socket,
            local,
            peer,
            auto_ack,
            received,
            reader,
        })
    }

    /// Address clients should connect to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local
    }

    /// Enable or disable automatic acknowledgments.
    pub fn set_auto_ack(&mut self, enabled: bool) {
        self.auto_ack.store(enabled, Ordering::SeqCst);
    }

    /// Address of the last client that sent something.
    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer.lock().ok().and_then(|peer| *peer)
    }

    /// Next datagram from the client, if one arrives within `timeout`.
    pub async fn recv_timeout(&mut self, timeout: Duration) -> Option<Vec<u8>> {
        tokio::time::timeout(timeout, self.received.recv())
            .await
            .ok()
            .flatten()
    }

    /// Next datagram from the client.
    pub async fn recv(&mut self) -> Result<Vec<u8>> {
        self.recv_timeout(EXPECT_TIMEOUT)
            .await
            .ok_or_else(|| anyhow!("No datagram within {:?}", EXPECT_TIMEOUT))
    }

    /// Skip datagrams until one starts with `opcode`.
    pub async fn expect_opcode(&mut self, opcode: u8) -> Result<Vec<u8>> {
        self.expect_matching(|data| data.first() == Some(&opcode))
            .await
            .with_context(|| format!("Waiting for opcode {:#04x}", opcode))
    }

    /// Skip datagrams until the acknowledgement of `nonce`.
    pub async fn expect_ack(&mut self, nonce: u16) -> Result<Vec<u8>> {
        let [high, low] = nonce.to_be_bytes();
        self.expect_matching(|data| data.starts_with(&[ACKNOWLEDGE, high, low]))
            .await
            .with_context(|| format!("Waiting for the ack of nonce {}", nonce))
    }

    /// Skip datagrams until one satisfies `filter`.
    pub async fn expect_matching(&mut self, filter: impl Fn(&[u8]) -> bool) -> Result<Vec<u8>> {
        let deadline = tokio::time::Instant::now() + EXPECT_TIMEOUT;
        loop {
            let left = deadline.saturating_duration_since(tokio::time::Instant::now());
            match self.recv_timeout(left).await {
                Some(data) if filter(&data) => return Ok(data),
                Some(_) => continue,
                None => bail!("No matching datagram within {:?}", EXPECT_TIMEOUT),
            }
        }
    }

    /// Discard everything received so far.
    pub fn drain(&mut self) -> usize {
        let mut dropped = 0;
        while self.received.try_recv().is_ok() {
            dropped += 1;
        }
        dropped
    }

    /// Send raw bytes to the last peer.
    pub async fn send(&self, data: &[u8]) -> Result<()> {
        let peer = self
            .peer()
            .ok_or_else(|| anyhow!("Fake server has no peer yet"))?;
        self.socket.send_to(data, peer).await?;
        Ok(())
    }

    /// Send a `Reliable` packet with `nonce` wrapping the given payload frames.
    pub async fn send_reliable(&self, nonce: u16, payload_frames: &[u8]) -> Result<()> {
        let mut data = vec![0x01];
        data.extend_from_slice(&nonce.to_be_bytes());
        data.extend_from_slice(payload_frames);
        self.send(&data).await
    }
}

impl Drop for FakeServer {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

async fn read_loop(
    socket: Arc<UdpSocket>,
    peer: Arc<Mutex<Option<SocketAddr>>>,
    auto_ack: Arc<AtomicBool>,
    tx: mpsc::UnboundedSender<Vec<u8>>,
) {
    let mut buf = vec![0u8; 4096];
    loop {
        let (len, from) = match socket.recv_from(&mut buf).await {
            Ok(received) => received,
            Err(e) => {
                debug!("Fake server read failed: {}", e);
                continue;
            }
        };
        if let Ok(mut peer) = peer.lock() {
            *peer = Some(from);
        }

        let data = buf[..len].to_vec();
        if auto_ack.load(Ordering::SeqCst) && len >= 3 && ACKED_OPCODES.contains(&data[0]) {
            let ack = [ACKNOWLEDGE, data[1], data[2], 0xff];
            if let Err(e) = socket.send_to(&ack, from).await {
                debug!("Fake server ack failed: {}", e);
            }
        }

        if tx.send(data).is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn acks_reliable_datagrams() {
        let mut server = FakeServer::bind().await.unwrap();
        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client.connect(server.local_addr()).await.unwrap();

        client.send(&[0x01, 0x00, 0x07, 0x00]).await.unwrap();
        assert_eq!(server.recv().await.unwrap(), vec![0x01, 0x00, 0x07, 0x00]);

        let mut buf = [0u8; 8];
        let len = client.recv(&mut buf).await.unwrap();
        assert_eq!(&buf[..len], &[0x0a, 0x00, 0x07, 0xff]);
        assert_eq!(server.peer(), Some(client.local_addr().unwrap()));
    }

    #[tokio::test]
    async fn expect_opcode_skips_others() {
        let mut server = FakeServer::bind().await.unwrap();
        server.set_auto_ack(false);
        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client.connect(server.local_addr()).await.unwrap();

        client.send(&[0x00]).await.unwrap();
        client.send(&[0x09]).await.unwrap();
        assert_eq!(server.expect_opcode(0x09).await.unwrap(), vec![0x09]);

        server.send(&[0x42]).await.unwrap();
        let mut buf = [0u8; 8];
        let len = client.recv(&mut buf).await.unwrap();
        assert_eq!(&buf[..len], &[0x42]);
    }

    #[tokio::test]
    async fn expect_ack_matches_the_nonce() {
        let mut server = FakeServer::bind().await.unwrap();
        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client.connect(server.local_addr()).await.unwrap();

        client.send(&[0x0a, 0x00, 0x02, 0xff]).await.unwrap();
        client.send(&[0x0a, 0x00, 0x05, 0xff]).await.unwrap();
        client.send(&[0x00]).await.unwrap();
        assert_eq!(
            server.expect_ack(5).await.unwrap(),
            vec![0x0a, 0x00, 0x05, 0xff]
        );

        server.recv().await.unwrap();
        assert_eq!(server.drain(), 0);
    }

    #[tokio::test]
    async fn recv_times_out_quietly() {
        let mut server = FakeServer::bind().await.unwrap();
        assert!(server
            .recv_timeout(Duration::from_millis(20))
            .await
            .is_none());
    }
}

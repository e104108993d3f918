//! UDP socket wrapper and per-send retransmission timers.
//!
//! The game server speaks plain UDP. [`Transport`] owns a socket connected to
//! one remote address; [`RetransmitTimer`] re-sends a reliable datagram on a
//! fixed interval until it is dropped.

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace};

/// Largest datagram the server sends.
pub const MAX_DATAGRAM: usize = 4096;

/// UDP socket connected to a single server.
#[derive(Clone)]
pub struct Transport {
    socket: Arc<UdpSocket>,
    local: SocketAddr,
    remote: SocketAddr,
}

impl Transport {
    /// Bind an ephemeral local port and connect it to `remote`.
    pub async fn connect(remote: SocketAddr) -> Result<Self> {
        let bind_addr: SocketAddr = if remote.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            (std::net::Ipv6Addr::UNSPECIFIED, 0).into()
        };

        let socket = UdpSocket::bind(bind_addr)
            .await
            .context("Failed to bind UDP socket")?;
        socket
            .connect(remote)
            .await
            .with_context(|| format!("Failed to connect UDP socket to {}", remote))?;

        let local = socket.local_addr()?;
        info!("UDP socket {} connected to {}", local, remote);

        Ok(Self {
            socket: Arc::new(socket),
            local,
            remote,
        })
    }

    /// Local address of the socket.
    pub fn local_addr(&self) -> SocketAddr {
        self.local
    }

    /// Server address.
    pub fn remote_addr(&self) -> SocketAddr {
        self.remote
    }

    /// Send one datagram.
    pub async fn send(&self, data: &[u8]) -> Result<()> {
        trace!(len = data.len(), "Sending {:02x?}", data);
        self.socket
            .send(data)
            .await
            .with_context(|| format!("Failed to send to {}", self.remote))?;
        Ok(())
    }

    /// Receive one datagram into `buf`, returning its length.
    pub async fn recv(&self, buf: &mut [u8]) -> Result<usize> {
        let len = self
            .socket
            .recv(buf)
            .await
            .with_context(|| format!("Failed to receive from {}", self.remote))?;
        trace!(len, "Received {:02x?}", &buf[..len]);
        Ok(len)
    }

    /// Start re-sending `data` every `interval` until the timer is dropped.
    pub fn retransmit(&self, nonce: u16, data: Vec<u8>, interval: Duration) -> RetransmitTimer {
        RetransmitTimer::start(self.socket.clone(), nonce, data, interval)
    }
}

/// Background re-send of one unacknowledged datagram.
///
/// The task is aborted when the timer is dropped, so removing the pending
/// entry that owns it is the only way to stop retransmission.
pub struct RetransmitTimer {
    nonce: u16,
    handle: JoinHandle<()>,
}

impl RetransmitTimer {
    fn start(socket: Arc<UdpSocket>, nonce: u16, data: Vec<u8>, interval: Duration) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            loop {
                ticker.tick().await;
                debug!(nonce, "Retransmitting unacknowledged packet");
                if let Err(e) = socket.send(&data).await {
                    debug!(nonce, "Retransmit failed: {}", e);
                }
            }
        });
        Self { nonce, handle }
    }

    /// Nonce of the datagram being retransmitted.
    pub fn nonce(&self) -> u16 {
        self.nonce
    }
}

impl Drop for RetransmitTimer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn peer() -> (UdpSocket, SocketAddr) {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        (socket, addr)
    }

    #[tokio::test]
    async fn test_send_and_receive() {
        let (server, server_addr) = peer().await;
        let transport = Transport::connect(server_addr).await.unwrap();
        assert_eq!(transport.remote_addr(), server_addr);

        transport.send(&[1, 2, 3]).await.unwrap();
        let mut buf = [0u8; 16];
        let (len, from) = server.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..len], &[1, 2, 3]);

        server.send_to(&[9], from).await.unwrap();
        let len = transport.recv(&mut buf).await.unwrap();
        assert_eq!(&buf[..len], &[9]);
    }

    #[tokio::test]
    async fn test_retransmit_repeats_until_dropped() {
        let (server, server_addr) = peer().await;
        let transport = Transport::connect(server_addr).await.unwrap();

        let timer = transport.retransmit(4, vec![0x01, 0x00, 0x04], Duration::from_millis(20));
        assert_eq!(timer.nonce(), 4);

        let mut buf = [0u8; 16];
        for _ in 0..2 {
            let len = tokio::time::timeout(Duration::from_secs(2), server.recv(&mut buf))
                .await
                .expect("retransmission")
                .unwrap();
            assert_eq!(&buf[..len], &[0x01, 0x00, 0x04]);
        }

        drop(timer);
        tokio::time::sleep(Duration::from_millis(30)).await;
        // Drain anything already in flight, then expect silence.
        while let Ok(Ok(_)) =
            tokio::time::timeout(Duration::from_millis(5), server.recv(&mut buf)).await
        {}
        let quiet = tokio::time::timeout(Duration::from_millis(80), server.recv(&mut buf)).await;
        assert!(quiet.is_err());
    }
}

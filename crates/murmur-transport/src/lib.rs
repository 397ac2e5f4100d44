//! UDP datagram transport for Murmur.
//!
//! Wraps a [`tokio::net::UdpSocket`] with segment-level send and receive:
//! one segment per datagram, encoded and decoded at the socket boundary so
//! higher layers never touch raw bytes.
//!
//! Malformed datagrams are dropped here. [`DatagramSocket::recv_segment`]
//! logs them at debug level and keeps waiting, so a garbage datagram can
//! never take down a receive loop.

mod error;

pub use error::TransportError;

use std::net::SocketAddr;

use tokio::net::UdpSocket;

use murmur_protocol::Segment;

/// Receive buffer size. Larger than the biggest valid segment so an
/// oversized datagram arrives intact and is rejected by the decoder
/// instead of being silently truncated by the kernel.
const RECV_BUF_SIZE: usize = 512;

/// A UDP socket that speaks segments.
pub struct DatagramSocket {
    socket: UdpSocket,
    local_addr: SocketAddr,
}

impl DatagramSocket {
    /// Binds a new socket to the given address. Bind to port 0 for an
    /// ephemeral port, then read it back with [`local_addr`](Self::local_addr).
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(TransportError::BindFailed)?;
        let local_addr =
            socket.local_addr().map_err(TransportError::BindFailed)?;
        tracing::info!(%local_addr, "datagram socket bound");
        Ok(Self { socket, local_addr })
    }

    /// The address this socket is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Encodes and sends one segment to `peer`.
    pub async fn send_segment(
        &self,
        segment: &Segment,
        peer: SocketAddr,
    ) -> Result<(), TransportError> {
        let bytes = segment
            .encode()
            .map_err(|e| TransportError::SendFailed(std::io::Error::other(e)))?;
        self.socket
            .send_to(&bytes, peer)
            .await
            .map_err(TransportError::SendFailed)?;
        tracing::trace!(%peer, %segment, "sent segment");
        Ok(())
    }

    /// Receives the next well-formed segment.
    ///
    /// Datagrams that fail to decode are logged and skipped; this only
    /// returns an error when the socket itself fails.
    pub async fn recv_segment(
        &self,
    ) -> Result<(Segment, SocketAddr), TransportError> {
        let mut buf = [0u8; RECV_BUF_SIZE];
        loop {
            let (len, peer) = self
                .socket
                .recv_from(&mut buf)
                .await
                .map_err(TransportError::ReceiveFailed)?;
            match Segment::decode(&buf[..len]) {
                Ok(segment) => {
                    tracing::trace!(%peer, %segment, "received segment");
                    return Ok((segment, peer));
                }
                Err(e) => {
                    tracing::debug!(%peer, len, error = %e, "dropping malformed datagram");
                }
            }
        }
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    async fn bind_pair() -> (DatagramSocket, DatagramSocket) {
        let a = DatagramSocket::bind("127.0.0.1:0").await.unwrap();
        let b = DatagramSocket::bind("127.0.0.1:0").await.unwrap();
        (a, b)
    }

    #[tokio::test]
    async fn test_bind_assigns_ephemeral_port() {
        let socket = DatagramSocket::bind("127.0.0.1:0").await.unwrap();
        assert_ne!(socket.local_addr().port(), 0);
    }

    #[tokio::test]
    async fn test_send_and_receive_segment() {
        let (a, b) = bind_pair().await;
        let sent = Segment::data(1, 2, 7, b"hello world".to_vec());
        a.send_segment(&sent, b.local_addr()).await.unwrap();

        let (received, peer) = b.recv_segment().await.unwrap();
        assert_eq!(received, sent);
        assert_eq!(peer, a.local_addr());
    }

    #[tokio::test]
    async fn test_recv_skips_malformed_datagram() {
        let (a, b) = bind_pair().await;

        // Raw garbage shorter than a header, then a valid segment.
        let raw = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        raw.send_to(&[0xFF; 4], b.local_addr()).await.unwrap();

        let valid = Segment::heartbeat(1, 2, 0);
        a.send_segment(&valid, b.local_addr()).await.unwrap();

        let (received, _) = b.recv_segment().await.unwrap();
        assert_eq!(received, valid);
    }

    #[tokio::test]
    async fn test_recv_skips_length_mismatch_datagram() {
        let (a, b) = bind_pair().await;

        // Valid header but the declared payload length lies.
        let mut bytes = Segment::data(1, 2, 0, b"abc".to_vec()).encode().unwrap();
        bytes[14] = 60;
        let raw = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        raw.send_to(&bytes, b.local_addr()).await.unwrap();

        let valid = Segment::data(1, 2, 0, b"ok".to_vec());
        a.send_segment(&valid, b.local_addr()).await.unwrap();

        let (received, _) = b.recv_segment().await.unwrap();
        assert_eq!(received, valid);
    }
}

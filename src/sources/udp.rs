//! UDP socket source

use bytes::Bytes;
use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tracing::{info, trace};

use crate::source::DatagramSource;
use crate::{Result, StreamError};

/// Largest datagram a UDP socket can deliver.
pub const MAX_DATAGRAM_SIZE: usize = 65535;

/// Receives datagrams from a bound UDP socket.
///
/// The receive buffer always holds [`MAX_DATAGRAM_SIZE`] bytes, so no datagram is ever
/// truncated by the socket.
pub struct UdpSource {
    socket: UdpSocket,
    buf: Vec<u8>,
}

impl UdpSource {
    /// Bind to `addr`.
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(addr).await.map_err(|e| StreamError::bind_failed(addr.to_string(), e))?;
        let local = socket.local_addr().map_err(|e| StreamError::bind_failed(addr.to_string(), e))?;
        info!("Listening for shards on udp://{}", local);

        Ok(Self::from_socket(socket))
    }

    /// Wrap an already bound socket.
    pub fn from_socket(socket: UdpSocket) -> Self {
        Self { socket, buf: vec![0u8; MAX_DATAGRAM_SIZE] }
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }
}

#[async_trait::async_trait]
impl DatagramSource for UdpSource {
    async fn recv(&mut self) -> Result<Option<Bytes>> {
        // recv_from is cancel safe: no data is consumed unless it completes
        let (len, peer) = self.socket.recv_from(&mut self.buf).await?;
        trace!(%peer, len, "datagram");
        Ok(Some(Bytes::copy_from_slice(&self.buf[..len])))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::datagram;

    #[tokio::test]
    async fn receives_datagrams_in_full() {
        let mut source = UdpSource::bind("127.0.0.1:0".parse().expect("addr")).await.expect("bind");
        let target = source.local_addr().expect("local addr");

        let sender = UdpSocket::bind("127.0.0.1:0").await.expect("bind sender");
        let packet = datagram(3, 1, b"payload");
        sender.send_to(&packet, target).await.expect("send");

        let received = source.recv().await.expect("recv").expect("datagram");
        assert_eq!(received, packet);
    }

    #[tokio::test]
    async fn datagrams_beyond_a_typical_mtu_are_not_truncated() {
        let mut source = UdpSource::bind("127.0.0.1:0".parse().expect("addr")).await.expect("bind");
        let target = source.local_addr().expect("local addr");

        let sender = UdpSocket::bind("127.0.0.1:0").await.expect("bind sender");
        let payload: Vec<u8> = (0..=255u8).cycle().take(9000).collect();
        let packet = datagram(7, 0, &payload);
        sender.send_to(&packet, target).await.expect("send");

        let received = source.recv().await.expect("recv").expect("datagram");
        assert_eq!(received.len(), payload.len() + 8);
        assert_eq!(received, packet);
    }

    #[tokio::test]
    async fn bind_conflict_is_reported() {
        let first = UdpSource::bind("127.0.0.1:0".parse().expect("addr")).await.expect("bind");
        let taken = first.local_addr().expect("local addr");

        match UdpSource::bind(taken).await {
            Err(StreamError::Bind { addr, .. }) => assert_eq!(addr, taken.to_string()),
            Err(other) => panic!("expected bind error, got {other}"),
            Ok(_) => panic!("second bind should fail"),
        }
    }
}

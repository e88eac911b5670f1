//! Datagram source trait

use bytes::Bytes;

use crate::Result;

/// Where datagrams come from.
///
/// Sources abstract the ingest transport (a UDP socket, an in-process channel) so the
/// driver loop is the same for every deployment.
#[async_trait::async_trait]
pub trait DatagramSource: Send + 'static {
    /// Wait for the next datagram.
    ///
    /// Returns:
    /// - `Ok(Some(datagram))` - a datagram arrived
    /// - `Ok(None)` - the source is exhausted (normal termination)
    /// - `Err(e)` - a receive error; the driver tolerates a run of these before giving up
    ///
    /// Must be cancel safe: the driver races this against shutdown and the report timer,
    /// and drops the future when they win.
    async fn recv(&mut self) -> Result<Option<Bytes>>;
}

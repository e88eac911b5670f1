//! In-process channel source

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::Result;
use crate::source::DatagramSource;

/// Receives datagrams pushed through an mpsc channel.
///
/// Ends once every sender has been dropped and the queue is drained, which lets a test or
/// an embedding application replay a fixed sequence and then stop the receiver cleanly.
pub struct ChannelSource {
    rx: mpsc::Receiver<Bytes>,
}

impl ChannelSource {
    pub fn new(rx: mpsc::Receiver<Bytes>) -> Self {
        Self { rx }
    }

    /// Create a source together with the sender that feeds it.
    pub fn channel(capacity: usize) -> (mpsc::Sender<Bytes>, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (tx, Self::new(rx))
    }
}

#[async_trait::async_trait]
impl DatagramSource for ChannelSource {
    async fn recv(&mut self) -> Result<Option<Bytes>> {
        Ok(self.rx.recv().await)
    }
}

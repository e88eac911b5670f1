//! In-memory capture sink

use bytes::Bytes;
use std::sync::{Arc, Mutex, MutexGuard};

use super::{Sink, SinkError};

#[derive(Debug, Default)]
struct Capture {
    writes: Vec<Bytes>,
    flushes: usize,
    disconnected: bool,
    closed: bool,
}

/// Records every write in memory.
///
/// Clones share the same capture, so one handle can be given to the pipeline while another
/// inspects what arrived. [`MemorySink::disconnect`] makes subsequent writes fail with
/// [`SinkError::Closed`], standing in for a consumer that went away.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    capture: Arc<Mutex<Capture>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Capture> {
        self.capture.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Every write so far, in order.
    pub fn writes(&self) -> Vec<Bytes> {
        self.lock().writes.clone()
    }

    /// All written bytes joined together.
    pub fn contents(&self) -> Vec<u8> {
        self.lock().writes.concat()
    }

    pub fn write_count(&self) -> usize {
        self.lock().writes.len()
    }

    pub fn flush_count(&self) -> usize {
        self.lock().flushes
    }

    /// Fail all further writes as if the consumer had closed its end.
    pub fn disconnect(&self) {
        self.lock().disconnected = true;
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }
}

#[async_trait::async_trait]
impl Sink for MemorySink {
    async fn write(&mut self, bytes: &[u8]) -> Result<(), SinkError> {
        let mut capture = self.lock();
        if capture.disconnected || capture.closed {
            return Err(SinkError::Closed);
        }
        capture.writes.push(Bytes::copy_from_slice(bytes));
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), SinkError> {
        let mut capture = self.lock();
        if capture.disconnected {
            return Err(SinkError::Closed);
        }
        capture.flushes += 1;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SinkError> {
        self.lock().closed = true;
        Ok(())
    }
}

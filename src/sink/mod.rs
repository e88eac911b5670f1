//! Byte-stream sinks
//!
//! A sink is anything frames can be appended to. The durable recording is a [`FileSink`],
//! the live player is a [`ProcessSink`] writing to a child's stdin, and [`MemorySink`]
//! captures writes in memory.
//!
//! Sinks report a consumer that has gone away as [`SinkError::Closed`], separately from
//! other I/O failures, so the dispatcher can retire a live sink without treating it as fatal.

mod file;
mod memory;
mod process;

pub use file::FileSink;
pub use memory::MemorySink;
pub use process::{DEFAULT_PLAYER_ARGS, DEFAULT_PLAYER_PROGRAM, ProcessSink};

use std::io::ErrorKind;
use thiserror::Error;

/// Errors a sink can report.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum SinkError {
    #[error("sink consumer closed the channel")]
    Closed,

    #[error("sink I/O error")]
    Io(#[source] std::io::Error),
}

impl SinkError {
    pub fn is_closed(&self) -> bool {
        matches!(self, SinkError::Closed)
    }
}

impl From<std::io::Error> for SinkError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            ErrorKind::BrokenPipe | ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted => {
                SinkError::Closed
            }
            _ => SinkError::Io(err),
        }
    }
}

/// Append-only byte consumer.
#[async_trait::async_trait]
pub trait Sink: Send + 'static {
    /// Append `bytes` in full.
    async fn write(&mut self, bytes: &[u8]) -> Result<(), SinkError>;

    /// Push buffered bytes to the consumer.
    async fn flush(&mut self) -> Result<(), SinkError>;

    /// Flush and release the consumer. No writes follow.
    async fn close(&mut self) -> Result<(), SinkError>;
}

#[async_trait::async_trait]
impl Sink for Box<dyn Sink> {
    async fn write(&mut self, bytes: &[u8]) -> Result<(), SinkError> {
        (**self).write(bytes).await
    }

    async fn flush(&mut self) -> Result<(), SinkError> {
        (**self).flush().await
    }

    async fn close(&mut self) -> Result<(), SinkError> {
        (**self).close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipe_errors_map_to_closed() {
        for kind in [ErrorKind::BrokenPipe, ErrorKind::ConnectionReset, ErrorKind::ConnectionAborted] {
            assert!(SinkError::from(std::io::Error::from(kind)).is_closed());
        }
        assert!(!SinkError::from(std::io::Error::from(ErrorKind::PermissionDenied)).is_closed());
    }
}

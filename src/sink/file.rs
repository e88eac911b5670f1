//! Durable recording sink

use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info};

use super::{Sink, SinkError};
use crate::{Result, StreamError};

/// Appends frames to a file, truncating it when opened.
pub struct FileSink {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    bytes_written: u64,
}

impl FileSink {
    /// Create (or truncate) the recording at `path`.
    pub async fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)
            .await
            .map_err(|e| StreamError::recording_error(path.clone(), e))?;

        info!("Recording to {}", path.display());
        Ok(Self { path, writer: Some(BufWriter::new(file)), bytes_written: 0 })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    fn writer(&mut self) -> Result<&mut BufWriter<File>, SinkError> {
        self.writer.as_mut().ok_or(SinkError::Closed)
    }
}

#[async_trait::async_trait]
impl Sink for FileSink {
    async fn write(&mut self, bytes: &[u8]) -> Result<(), SinkError> {
        self.writer()?.write_all(bytes).await?;
        self.bytes_written += bytes.len() as u64;
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), SinkError> {
        self.writer()?.flush().await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SinkError> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush().await?;
            writer.get_mut().sync_all().await?;
            debug!(path = %self.path.display(), bytes = self.bytes_written, "recording closed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn appends_and_truncates() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("record.hevc");
        std::fs::write(&path, b"stale contents").expect("seed file");

        let mut sink = FileSink::create(&path).await.expect("open recording");
        sink.write(b"abc").await.expect("write");
        sink.write(b"def").await.expect("write");
        sink.close().await.expect("close");

        assert_eq!(std::fs::read(&path).expect("read back"), b"abcdef");
        assert_eq!(sink.bytes_written(), 6);
        assert!(sink.write(b"late").await.expect_err("closed").is_closed());
    }

    #[tokio::test]
    async fn missing_directory_is_a_recording_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("missing").join("record.hevc");

        match FileSink::create(&path).await {
            Err(StreamError::Recording { path: reported, .. }) => assert_eq!(reported, path),
            Err(other) => panic!("expected recording error, got {other}"),
            Ok(_) => panic!("expected recording error"),
        }
    }
}

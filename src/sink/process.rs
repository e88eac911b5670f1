//! Live playback through a player subprocess

use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, Command};
use tracing::{debug, info};

use super::{Sink, SinkError};
use crate::{Result, StreamError};

/// Player used when none is configured.
pub const DEFAULT_PLAYER_PROGRAM: &str = "ffplay";

/// Low-latency raw HEVC playback from stdin.
pub const DEFAULT_PLAYER_ARGS: &[&str] = &[
    "-window_title",
    "Real-time Robot Stream",
    "-f",
    "hevc",
    "-fflags",
    "nobuffer",
    "-flags",
    "low_delay",
    "-probesize",
    "32",
    "-analyzeduration",
    "0",
    "-sync",
    "ext",
    "-i",
    "-",
];

/// Feeds frames to a child process over its stdin.
///
/// The child's stdout and stderr are discarded. A child that has exited, or a stdin pipe
/// that breaks, is reported as [`SinkError::Closed`].
pub struct ProcessSink {
    program: String,
    child: Child,
    stdin: Option<ChildStdin>,
}

impl ProcessSink {
    /// Start `program` with `args`.
    pub fn spawn<S: AsRef<str>>(program: &str, args: &[S]) -> Result<Self> {
        let mut command = Command::new(program);
        for arg in args {
            let arg: &str = arg.as_ref();
            command.arg(arg);
        }

        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| StreamError::player_failed(program, e))?;

        let stdin = child.stdin.take();
        info!(program, pid = child.id(), "Live player started");

        Ok(Self { program: program.to_string(), child, stdin })
    }

    /// Start the default player.
    pub fn spawn_default() -> Result<Self> {
        Self::spawn(DEFAULT_PLAYER_PROGRAM, DEFAULT_PLAYER_ARGS)
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn live_stdin(&mut self) -> Result<&mut ChildStdin, SinkError> {
        // An exited player may leave the pipe writable until its buffer fills
        if matches!(self.child.try_wait(), Ok(Some(_))) {
            self.stdin = None;
        }
        self.stdin.as_mut().ok_or(SinkError::Closed)
    }
}

#[async_trait::async_trait]
impl Sink for ProcessSink {
    async fn write(&mut self, bytes: &[u8]) -> Result<(), SinkError> {
        let stdin = self.live_stdin()?;
        stdin.write_all(bytes).await?;
        stdin.flush().await?;
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), SinkError> {
        self.live_stdin()?.flush().await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SinkError> {
        // Closing stdin signals end of stream; the player is then stopped
        drop(self.stdin.take());
        if matches!(self.child.try_wait(), Ok(None)) {
            self.child.start_kill()?;
        }
        let status = self.child.wait().await?;
        debug!(program = %self.program, %status, "Live player stopped");
        Ok(())
    }
}

//! Error types for the shard receiver.
//!
//! Only setup failures and a broken recording are errors. Everything the stream itself can do
//! wrong (short datagrams, lost shards, unrecognized units, a player that went away) is absorbed
//! by the pipeline and surfaces through telemetry instead.
//!
//! ## Error Categories
//!
//! - **Bind Errors**: the ingest socket could not be bound
//! - **Recording Errors**: the durable recording could not be opened
//! - **Player Errors**: the live player process could not be started
//! - **Receive Errors**: a single failed read from the ingest socket
//! - **Transport Errors**: repeated receive failures on the ingest socket
//! - **Sink Errors**: a write to the durable recording failed mid-session
//! - **Config Errors**: configuration could not be read or is invalid
//!
//! ```rust
//! use shardgate::StreamError;
//!
//! let error = StreamError::config_invalid("listen_addr", "port is zero");
//! assert!(!error.is_retryable());
//! for suggestion in error.recovery_suggestions() {
//!     println!("  - {}", suggestion);
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

use crate::sink::SinkError;

/// Result type alias for receiver operations.
pub type Result<T, E = StreamError> = std::result::Result<T, E>;

/// Main error type for receiver operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum StreamError {
    #[error("Failed to bind ingest socket on {addr}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to open recording: {path}")]
    Recording {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to start live player '{program}'")]
    Player {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Receive failed")]
    Receive(#[from] std::io::Error),

    #[error("Ingest transport failed after {attempts} consecutive errors")]
    Transport {
        attempts: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("{sink} sink failed")]
    Sink {
        sink: String,
        #[source]
        source: SinkError,
    },

    #[error("Invalid configuration in {context}: {details}")]
    Config { context: String, details: String },

    #[error("Background task failed: {details}")]
    Task { details: String },
}

impl StreamError {
    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            StreamError::Bind { .. } => true,
            StreamError::Transport { .. } => true,
            StreamError::Receive(_) => true,
            StreamError::Player { .. } => false,
            StreamError::Recording { .. } => false,
            StreamError::Sink { .. } => false,
            StreamError::Config { .. } => false,
            StreamError::Task { .. } => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            StreamError::Bind { .. } => vec![
                "Check that no other receiver is bound to the port",
                "Verify the listen address belongs to this host",
                "Use a port above 1024 when running unprivileged",
            ],
            StreamError::Recording { .. } => vec![
                "Check the recording directory exists and is writable",
                "Ensure sufficient disk space",
                "Check file permissions",
            ],
            StreamError::Player { .. } => vec![
                "Install ffmpeg so that ffplay is on the PATH",
                "Point live.program at an installed player",
                "Disable live playback with --no-live",
            ],
            StreamError::Transport { .. } | StreamError::Receive(_) => vec![
                "Check the network interface is up",
                "Restart the receiver",
            ],
            StreamError::Sink { .. } => vec![
                "Ensure sufficient disk space",
                "Check the recording volume is still mounted",
            ],
            StreamError::Config { .. } => vec![
                "Check the configuration file syntax",
                "Print the defaults with --print-config",
            ],
            StreamError::Task { .. } => vec!["Restart the receiver", "Run with RUST_LOG=debug"],
        }
    }

    /// Helper constructor for bind errors.
    pub fn bind_failed(addr: impl Into<String>, source: std::io::Error) -> Self {
        StreamError::Bind { addr: addr.into(), source }
    }

    /// Helper constructor for recording errors with path context.
    pub fn recording_error(path: PathBuf, source: std::io::Error) -> Self {
        StreamError::Recording { path, source }
    }

    /// Helper constructor for player spawn errors.
    pub fn player_failed(program: impl Into<String>, source: std::io::Error) -> Self {
        StreamError::Player { program: program.into(), source }
    }

    /// Helper constructor for sink write errors.
    pub fn sink_failed(sink: impl Into<String>, source: SinkError) -> Self {
        StreamError::Sink { sink: sink.into(), source }
    }

    /// Escalate the last of a run of receive failures.
    pub fn transport_failed(attempts: u32, last: StreamError) -> Self {
        match last {
            StreamError::Receive(source) => StreamError::Transport { attempts, source },
            other => other,
        }
    }

    /// Helper constructor for configuration errors.
    pub fn config_invalid(context: impl Into<String>, details: impl Into<String>) -> Self {
        StreamError::Config { context: context.into(), details: details.into() }
    }
}

impl From<tokio::task::JoinError> for StreamError {
    fn from(err: tokio::task::JoinError) -> Self {
        StreamError::Task { details: err.to_string() }
    }
}

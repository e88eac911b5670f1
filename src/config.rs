//! Receiver configuration
//!
//! Every field has a default, so an empty YAML document is a valid configuration and a file
//! only needs to name what it changes:
//!
//! ```rust
//! use shardgate::config::ReceiverConfig;
//! use shardgate::GatePolicy;
//!
//! let config = ReceiverConfig::from_yaml_str("stream:\n  gate_policy: keyframe\n").unwrap();
//! assert_eq!(config.stream.gate_policy, GatePolicy::Keyframe);
//! assert_eq!(config.listen_addr.port(), 3334);
//! ```

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::dispatch::DEFAULT_SINK_QUEUE_DEPTH;
use crate::gate::{DEFAULT_PARAMETER_CACHE_CAPACITY, GatePolicy};
use crate::session::SessionOptions;
use crate::sink::{DEFAULT_PLAYER_ARGS, DEFAULT_PLAYER_PROGRAM};
use crate::{Result, StreamError};

/// Complete configuration for the receiver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiverConfig {
    /// UDP address shards arrive on
    pub listen_addr: SocketAddr,

    /// Durable recording, truncated at startup
    pub recording_path: PathBuf,

    pub stream: StreamConfig,

    pub live: LiveConfig,

    /// Chunks buffered per sink before dispatch waits
    pub sink_queue_depth: usize,

    /// Status report period (milliseconds)
    pub report_interval_ms: u64,
}

/// Reassembly and gating
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Parameter frames kept for injection ahead of keyframes
    pub parameter_cache_capacity: usize,

    pub gate_policy: GatePolicy,

    /// Frames reassembled concurrently. 1 means strictly sequential.
    pub max_pending_frames: usize,
}

/// Live playback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveConfig {
    pub enabled: bool,

    /// Player executable, resolved through PATH
    pub program: String,

    /// Player arguments; the player must read the stream from stdin
    pub args: Vec<String>,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 3334)),
            recording_path: PathBuf::from("video_record.hevc"),
            stream: StreamConfig::default(),
            live: LiveConfig::default(),
            sink_queue_depth: DEFAULT_SINK_QUEUE_DEPTH,
            report_interval_ms: 1000,
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            parameter_cache_capacity: DEFAULT_PARAMETER_CACHE_CAPACITY,
            gate_policy: GatePolicy::default(),
            max_pending_frames: 1,
        }
    }
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            program: DEFAULT_PLAYER_PROGRAM.to_string(),
            args: DEFAULT_PLAYER_ARGS.iter().map(|arg| arg.to_string()).collect(),
        }
    }
}

impl ReceiverConfig {
    /// Load and validate configuration from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| StreamError::config_invalid(path.display().to_string(), e.to_string()))?;
        Self::from_yaml_str(&contents)
    }

    /// Parse and validate configuration from YAML text
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        // An empty document deserializes as null rather than an empty mapping
        let config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml_ng::from_str(yaml).map_err(|e| StreamError::config_invalid("YAML", e.to_string()))?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml_ng::to_string(self).map_err(|e| StreamError::config_invalid("YAML", e.to_string()))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.recording_path.as_os_str().is_empty() {
            return Err(StreamError::config_invalid("recording_path", "cannot be empty"));
        }

        if self.stream.parameter_cache_capacity == 0 {
            return Err(StreamError::config_invalid("stream.parameter_cache_capacity", "must be > 0"));
        }

        if self.stream.max_pending_frames == 0 {
            return Err(StreamError::config_invalid("stream.max_pending_frames", "must be > 0"));
        }

        if self.live.enabled && self.live.program.trim().is_empty() {
            return Err(StreamError::config_invalid("live.program", "required when live playback is enabled"));
        }

        if self.sink_queue_depth == 0 {
            return Err(StreamError::config_invalid("sink_queue_depth", "must be > 0"));
        }

        if self.report_interval_ms == 0 {
            return Err(StreamError::config_invalid("report_interval_ms", "must be > 0"));
        }

        Ok(())
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_millis(self.report_interval_ms)
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            parameter_cache_capacity: self.stream.parameter_cache_capacity,
            gate_policy: self.stream.gate_policy,
            max_pending_frames: self.stream.max_pending_frames,
        }
    }
}

//! Receiver for video streams sharded across UDP datagrams.
//!
//! Shardgate rebuilds encoded frames from fixed-header shards, holds output back until the
//! decoder has what it needs to start, records every admitted frame to a durable file and
//! forwards the same stream to a live player.
//!
//! # Features
//!
//! - **Reassembly**: order-tolerant within a frame, strictly sequential across frames by
//!   default, with an optional bounded window for interleaved senders
//! - **Decoder-ready gating**: nothing is emitted until parameter units have been seen, and
//!   cached parameters are re-sent to the live player ahead of every keyframe
//! - **Isolated sinks**: a live player that exits never disturbs the recording
//! - **Telemetry**: frame and loss counters as a watch stream
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use shardgate::{Receiver, ReceiverConfig};
//!
//! #[tokio::main]
//! async fn main() -> shardgate::Result<()> {
//!     let config = ReceiverConfig::default();
//!     let mut handle = Receiver::bind(&config).await?;
//!
//!     tokio::select! {
//!         _ = tokio::signal::ctrl_c() => {
//!             let summary = handle.shutdown().await?;
//!             println!("{}", summary);
//!         }
//!         result = handle.wait() => {
//!             result?;
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Without I/O
//!
//! [`StreamSession`] is the whole pipeline minus the sockets and sinks:
//!
//! ```rust
//! use shardgate::{StreamSession, packetize};
//!
//! let mut session = StreamSession::default();
//! let parameters = b"\x00\x00\x00\x01\x40\x01\x0c";
//! let trailing = b"\x00\x00\x00\x01\x02\x01";
//!
//! let mut plans = Vec::new();
//! for datagram in packetize(1, parameters, 1000).into_iter().chain(packetize(2, trailing, 1000)) {
//!     plans.extend(session.ingest(&datagram));
//! }
//!
//! // Frame 1 is finalized when frame 2 starts; frame 2 waits for frame 3
//! assert_eq!(plans.len(), 1);
//! assert_eq!(plans[0].frame.data.as_ref(), parameters);
//! ```

// Core types and error handling
pub mod classify;
pub mod config;
mod error;
#[cfg_attr(any(test, feature = "benchmark"), path = "test_utils.rs")]
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

// Pipeline stages
pub mod gate;
pub mod reassembly;
pub mod session;
pub mod telemetry;

// Sinks, sources and the tasks that connect them
pub mod dispatch;
pub mod driver;
pub mod receiver;
pub mod sink;
pub mod source;
pub mod sources;

// Core exports
pub use error::*;
pub use types::*;

pub use classify::{StartCodeClassifier, UnitClassifier};
pub use gate::{GatePolicy, GateState, ParameterCache, StreamGate};
pub use reassembly::{Finalized, FrameReassembler, IncompleteReason};
pub use session::{DispatchPlan, SessionOptions, StreamSession};
pub use telemetry::TelemetrySnapshot;

// Main API exports
pub use config::ReceiverConfig;
pub use receiver::{Receiver, ReceiverHandle};
pub use sink::{FileSink, MemorySink, ProcessSink, Sink, SinkError};
pub use source::DatagramSource;
pub use sources::{ChannelSource, UdpSource};

//! Core types for the shard stream.
//!
//! - [`Shard`] is one parsed datagram, with [`packetize`] as the sender-side inverse
//! - [`AssembledFrame`] is a complete frame rebuilt from its shards
//! - [`UnitType`] and [`UnitKind`] describe what the frame carries
//!
//! ```rust
//! use shardgate::types::{Shard, packetize};
//!
//! let datagrams = packetize(7, b"\x00\x00\x00\x01\x26payload", 4);
//! let first = Shard::parse(&datagrams[0]).unwrap();
//! assert_eq!(first.frame_id, 7);
//! assert_eq!(first.shard_index, 0);
//! assert_eq!(first.payload.as_ref(), b"\x00\x00\x00\x01");
//! ```

mod frame;
mod shard;
mod unit;

pub use frame::AssembledFrame;
pub use shard::{DEFAULT_SHARD_PAYLOAD, SHARD_HEADER_SIZE, Shard, packetize};
pub use unit::{KEYFRAME_UNIT_TYPES, PARAMETER_UNIT_TYPES, UnitKind, UnitType};

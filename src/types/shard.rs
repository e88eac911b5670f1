//! Shard wire format.
//!
//! Every datagram carries one shard of one frame behind a fixed 8-byte header:
//!
//! ```text
//! offset 0  u16 BE  frame_id
//! offset 2  u16 BE  shard_index
//! offset 4  u32 BE  reserved (ignored on receive, payload length on send)
//! offset 8  ...     payload
//! ```

use bytes::{BufMut, Bytes, BytesMut};

/// Size of the shard header in bytes.
pub const SHARD_HEADER_SIZE: usize = 8;

/// Payload size the reference sender uses per shard.
pub const DEFAULT_SHARD_PAYLOAD: usize = 1000;

/// One datagram's worth of a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shard {
    pub frame_id: u16,
    pub shard_index: u16,
    pub reserved: u32,
    pub payload: Bytes,
}

impl Shard {
    /// Decode a datagram.
    ///
    /// Returns `None` for datagrams of `SHARD_HEADER_SIZE` bytes or fewer; a header with no
    /// payload is treated as truncated.
    pub fn parse(datagram: &[u8]) -> Option<Self> {
        if datagram.len() <= SHARD_HEADER_SIZE {
            return None;
        }
        Self::parse_bytes(Bytes::copy_from_slice(datagram))
    }

    /// Decode a datagram already held in a `Bytes`, sharing its payload without copying.
    pub fn parse_bytes(datagram: Bytes) -> Option<Self> {
        if datagram.len() <= SHARD_HEADER_SIZE {
            return None;
        }

        let frame_id = u16::from_be_bytes([datagram[0], datagram[1]]);
        let shard_index = u16::from_be_bytes([datagram[2], datagram[3]]);
        let reserved = u32::from_be_bytes([datagram[4], datagram[5], datagram[6], datagram[7]]);

        Some(Self { frame_id, shard_index, reserved, payload: datagram.slice(SHARD_HEADER_SIZE..) })
    }

    /// Encode into a datagram.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(SHARD_HEADER_SIZE + self.payload.len());
        buf.put_u16(self.frame_id);
        buf.put_u16(self.shard_index);
        buf.put_u32(self.reserved);
        buf.extend_from_slice(&self.payload);
        buf.freeze()
    }
}

/// Split a frame into shard datagrams of at most `shard_payload` bytes each.
///
/// The reserved field carries each shard's payload length, as the reference sender does.
/// Frames needing more than `u16::MAX + 1` shards are truncated at the last index.
pub fn packetize(frame_id: u16, frame: &[u8], shard_payload: usize) -> Vec<Bytes> {
    let shard_payload = shard_payload.max(1);

    frame
        .chunks(shard_payload)
        .take(usize::from(u16::MAX) + 1)
        .enumerate()
        .map(|(index, chunk)| {
            Shard {
                frame_id,
                shard_index: index as u16,
                reserved: chunk.len() as u32,
                payload: Bytes::copy_from_slice(chunk),
            }
            .encode()
        })
        .collect()
}

//! Builders for shards, datagrams and codec units used across unit tests and benchmarks.

#![cfg(any(test, feature = "benchmark"))]

use bytes::Bytes;

use crate::types::{Shard, packetize};

/// Four-byte Annex-B start code.
pub const START_CODE: [u8; 4] = [0x00, 0x00, 0x00, 0x01];

/// First header byte for a unit of the given 6-bit type.
pub fn unit_header(unit_type: u8) -> u8 {
    (unit_type & 0x3F) << 1
}

/// A frame holding one unit: start code, header byte, then `body`.
pub fn unit_frame(unit_type: u8, body: &[u8]) -> Vec<u8> {
    let mut frame = START_CODE.to_vec();
    frame.push(unit_header(unit_type));
    frame.extend_from_slice(body);
    frame
}

/// A video parameter set frame (type 32).
pub fn parameter_frame(body: &[u8]) -> Vec<u8> {
    unit_frame(32, body)
}

/// An IDR keyframe (type 19).
pub fn keyframe(body: &[u8]) -> Vec<u8> {
    unit_frame(19, body)
}

/// A trailing picture (type 1).
pub fn ordinary_frame(body: &[u8]) -> Vec<u8> {
    unit_frame(1, body)
}

/// A parsed shard with a zero reserved field.
pub fn shard(frame_id: u16, shard_index: u16, payload: &[u8]) -> Shard {
    Shard { frame_id, shard_index, reserved: 0, payload: Bytes::copy_from_slice(payload) }
}

/// An encoded datagram for one shard.
pub fn datagram(frame_id: u16, shard_index: u16, payload: &[u8]) -> Bytes {
    shard(frame_id, shard_index, payload).encode()
}

/// Datagrams for a sequence of whole frames, numbered from `first_id`.
pub fn frame_sequence(first_id: u16, frames: &[Vec<u8>], shard_payload: usize) -> Vec<Bytes> {
    frames
        .iter()
        .enumerate()
        .flat_map(|(i, frame)| packetize(first_id.wrapping_add(i as u16), frame, shard_payload))
        .collect()
}

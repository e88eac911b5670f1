//! Reassembled frame types

use bytes::Bytes;

use super::UnitType;

/// A frame whose shards formed a contiguous run from index 0.
///
/// This is the unit that flows from reassembly through gating into the sinks. The byte
/// buffer is reference counted, so cached parameter frames and sink queues share it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledFrame {
    /// Identifier taken from the shard headers
    pub frame_id: u16,

    /// Shard payloads concatenated by ascending index
    pub data: Bytes,

    /// Number of shards the frame was built from
    pub shard_count: usize,

    /// Classification of the leading unit, `Unknown` until classified
    pub unit_type: UnitType,
}

impl AssembledFrame {
    /// Create an unclassified frame
    pub fn new(frame_id: u16, data: Bytes, shard_count: usize) -> Self {
        Self { frame_id, data, shard_count, unit_type: UnitType::Unknown }
    }

    /// Attach a classification
    pub fn with_unit_type(mut self, unit_type: UnitType) -> Self {
        self.unit_type = unit_type;
        self
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

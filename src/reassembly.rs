//! Frame reassembly from shards
//!
//! Shards are grouped by frame id. A frame is finalized only when it is pushed out of the
//! open window by a shard for a frame id that is not currently open. With the default window
//! of one frame this is the sequential model the sender is built for: all shards of a frame
//! arrive before the first shard of the next, and the first shard of frame N+1 finalizes
//! frame N.
//!
//! # Preconditions
//!
//! In sequential mode (window of 1) shards of different frames must not interleave. If they
//! do, each switch of frame id finalizes whatever has arrived so far: the partial frames are
//! either dropped as incomplete or, when the early shards happen to form a run from index 0,
//! emitted truncated. Later shards of an already finalized id open a fresh frame that lacks
//! index 0 and is dropped. Larger windows tolerate interleaving across that many frames.
//!
//! There is no timeout. The last frame of a stream stays open until another frame id
//! arrives, and is discarded if the stream ends first.

use bytes::{Bytes, BytesMut};
use std::collections::{BTreeMap, VecDeque};
use tracing::trace;

use crate::types::{AssembledFrame, Shard};

/// Why a finalized frame was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncompleteReason {
    /// Shard 0 never arrived
    MissingFirst { lowest_index: u16 },

    /// Indices start at 0 but skip at least one value
    Gap { highest_index: u16 },
}

/// Outcome of finalizing one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Finalized {
    Complete(AssembledFrame),
    Incomplete { frame_id: u16, shard_count: usize, reason: IncompleteReason },
}

impl Finalized {
    pub fn frame_id(&self) -> u16 {
        match self {
            Finalized::Complete(frame) => frame.frame_id,
            Finalized::Incomplete { frame_id, .. } => *frame_id,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Finalized::Complete(_))
    }
}

#[derive(Debug)]
struct FrameInProgress {
    frame_id: u16,
    shards: BTreeMap<u16, Bytes>,
}

impl FrameInProgress {
    fn new(frame_id: u16) -> Self {
        Self { frame_id, shards: BTreeMap::new() }
    }

    fn finalize(self) -> Finalized {
        let shard_count = self.shards.len();
        let (lowest, highest) = match (self.shards.keys().next(), self.shards.keys().next_back()) {
            (Some(&lo), Some(&hi)) => (lo, hi),
            // Frames are only opened by a shard, so this cannot be empty
            _ => {
                return Finalized::Incomplete {
                    frame_id: self.frame_id,
                    shard_count,
                    reason: IncompleteReason::MissingFirst { lowest_index: 0 },
                };
            }
        };

        if lowest != 0 {
            return Finalized::Incomplete {
                frame_id: self.frame_id,
                shard_count,
                reason: IncompleteReason::MissingFirst { lowest_index: lowest },
            };
        }

        if usize::from(highest - lowest) + 1 != shard_count {
            return Finalized::Incomplete {
                frame_id: self.frame_id,
                shard_count,
                reason: IncompleteReason::Gap { highest_index: highest },
            };
        }

        let total: usize = self.shards.values().map(Bytes::len).sum();
        let mut data = BytesMut::with_capacity(total);
        for payload in self.shards.values() {
            data.extend_from_slice(payload);
        }

        Finalized::Complete(AssembledFrame::new(self.frame_id, data.freeze(), shard_count))
    }
}

/// Groups shards into frames and finalizes them on frame id transitions.
#[derive(Debug)]
pub struct FrameReassembler {
    max_open: usize,
    open: VecDeque<FrameInProgress>,
}

impl Default for FrameReassembler {
    fn default() -> Self {
        Self::sequential()
    }
}

impl FrameReassembler {
    /// Reassembler holding one frame at a time.
    pub fn sequential() -> Self {
        Self::with_window(1)
    }

    /// Reassembler holding up to `max_open` frames at once (at least one).
    pub fn with_window(max_open: usize) -> Self {
        let max_open = max_open.max(1);
        Self { max_open, open: VecDeque::with_capacity(max_open + 1) }
    }

    /// Add a shard, returning the frame it pushed out of the window, if any.
    ///
    /// A shard whose index is already present replaces the earlier payload.
    pub fn push(&mut self, shard: Shard) -> Option<Finalized> {
        trace!(
            frame_id = shard.frame_id,
            shard_index = shard.shard_index,
            len = shard.payload.len(),
            "shard"
        );

        if let Some(frame) = self.open.iter_mut().find(|f| f.frame_id == shard.frame_id) {
            frame.shards.insert(shard.shard_index, shard.payload);
            return None;
        }

        let mut frame = FrameInProgress::new(shard.frame_id);
        frame.shards.insert(shard.shard_index, shard.payload);
        self.open.push_back(frame);

        if self.open.len() > self.max_open {
            return self.open.pop_front().map(FrameInProgress::finalize);
        }

        None
    }

    /// Number of frames currently accumulating.
    pub fn pending(&self) -> usize {
        self.open.len()
    }

    /// Frame id of the most recently opened frame.
    pub fn current_frame_id(&self) -> Option<u16> {
        self.open.back().map(|f| f.frame_id)
    }

    pub fn window(&self) -> usize {
        self.max_open
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::shard;
    use proptest::prelude::*;

    fn complete(finalized: Option<Finalized>) -> AssembledFrame {
        match finalized {
            Some(Finalized::Complete(frame)) => frame,
            other => panic!("expected a complete frame, got {:?}", other),
        }
    }

    #[test]
    fn next_frame_id_finalizes_current() {
        let mut reassembler = FrameReassembler::sequential();

        assert!(reassembler.push(shard(1, 0, b"ab")).is_none());
        assert!(reassembler.push(shard(1, 1, b"cd")).is_none());
        assert!(reassembler.push(shard(1, 2, b"ef")).is_none());
        let frame = complete(reassembler.push(shard(2, 0, b"gh")));

        assert_eq!(frame.frame_id, 1);
        assert_eq!(frame.data.as_ref(), b"abcdef");
        assert_eq!(frame.shard_count, 3);
        assert_eq!(reassembler.current_frame_id(), Some(2));
        assert_eq!(reassembler.pending(), 1);
    }

    #[test]
    fn missing_first_shard_is_dropped() {
        let mut reassembler = FrameReassembler::sequential();
        reassembler.push(shard(1, 1, b"b"));
        reassembler.push(shard(1, 2, b"c"));

        assert_eq!(
            reassembler.push(shard(2, 0, b"x")),
            Some(Finalized::Incomplete {
                frame_id: 1,
                shard_count: 2,
                reason: IncompleteReason::MissingFirst { lowest_index: 1 },
            })
        );
    }

    #[test]
    fn gap_is_dropped() {
        let mut reassembler = FrameReassembler::sequential();
        reassembler.push(shard(1, 0, b"a"));
        reassembler.push(shard(1, 2, b"c"));

        assert_eq!(
            reassembler.push(shard(2, 0, b"x")),
            Some(Finalized::Incomplete {
                frame_id: 1,
                shard_count: 2,
                reason: IncompleteReason::Gap { highest_index: 2 },
            })
        );
    }

    #[test]
    fn duplicate_index_last_write_wins() {
        let mut reassembler = FrameReassembler::sequential();
        reassembler.push(shard(5, 0, b"old"));
        reassembler.push(shard(5, 1, b"-tail"));
        reassembler.push(shard(5, 0, b"new"));

        let frame = complete(reassembler.push(shard(6, 0, b"x")));
        assert_eq!(frame.data.as_ref(), b"new-tail");
        assert_eq!(frame.shard_count, 2);
    }

    #[test]
    fn last_frame_stays_open_without_successor() {
        let mut reassembler = FrameReassembler::sequential();
        reassembler.push(shard(1, 0, b"a"));

        assert_eq!(reassembler.pending(), 1);
        assert_eq!(reassembler.current_frame_id(), Some(1));
    }

    #[test]
    fn interleaved_frames_in_sequential_mode_are_corrupted() {
        // Frame 1 = [0, 1], frame 2 = [0, 1], sent interleaved 1/0, 2/0, 1/1, 2/1.
        let mut reassembler = FrameReassembler::sequential();
        let mut out = Vec::new();

        for (id, ix, payload) in [(1, 0, b"A0"), (2, 0, b"B0"), (1, 1, b"A1"), (2, 1, b"B1"), (3, 0, b"C0")] {
            out.extend(reassembler.push(shard(id, ix, payload)));
        }

        // Each frame id switch finalizes a one-shard fragment. Those starting at index 0 pass
        // the completeness check truncated; the tails lack index 0 and are dropped.
        assert_eq!(out.len(), 4);
        assert_eq!(complete(Some(out[0].clone())).data.as_ref(), b"A0");
        assert_eq!(complete(Some(out[1].clone())).data.as_ref(), b"B0");
        assert!(!out[2].is_complete());
        assert!(!out[3].is_complete());
    }

    #[test]
    fn window_tolerates_interleaving() {
        let mut reassembler = FrameReassembler::with_window(2);
        let mut out = Vec::new();

        for (id, ix, payload) in [(1, 0, b"A0"), (2, 0, b"B0"), (1, 1, b"A1"), (2, 1, b"B1"), (3, 0, b"C0")] {
            out.extend(reassembler.push(shard(id, ix, payload)));
        }

        assert_eq!(out.len(), 1);
        let frame = complete(Some(out.remove(0)));
        assert_eq!(frame.frame_id, 1);
        assert_eq!(frame.data.as_ref(), b"A0A1");

        let frame = complete(reassembler.push(shard(4, 0, b"D0")));
        assert_eq!(frame.frame_id, 2);
        assert_eq!(frame.data.as_ref(), b"B0B1");
    }

    #[test]
    fn zero_window_is_clamped() {
        assert_eq!(FrameReassembler::with_window(0).window(), 1);
    }

    proptest! {
        #[test]
        fn arrival_order_does_not_change_frame_bytes(
            payloads in prop::collection::vec(prop::collection::vec(any::<u8>(), 1..32), 1..24),
            seed in any::<u64>(),
        ) {
            let mut order: Vec<usize> = (0..payloads.len()).collect();
            // Deterministic shuffle driven by the generated seed
            let mut state = seed | 1;
            for i in (1..order.len()).rev() {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                order.swap(i, (state % (i as u64 + 1)) as usize);
            }

            let mut reassembler = FrameReassembler::sequential();
            for &ix in &order {
                prop_assert!(reassembler.push(shard(10, ix as u16, &payloads[ix])).is_none());
            }

            let expected: Vec<u8> = payloads.concat();
            match reassembler.push(shard(11, 0, b"next")) {
                Some(Finalized::Complete(frame)) => {
                    prop_assert_eq!(frame.data.as_ref(), expected.as_slice());
                    prop_assert_eq!(frame.shard_count, payloads.len());
                }
                other => prop_assert!(false, "expected complete frame, got {:?}", other),
            }
        }
    }
}

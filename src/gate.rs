//! Parameter cache and stream gate
//!
//! The cache keeps the most recent parameter-set frames so they can be replayed to a live
//! decoder ahead of every keyframe. The gate is a one-way latch deciding when non-parameter
//! frames start flowing to the sinks.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use tracing::debug;

use crate::types::UnitKind;

/// Default number of parameter frames retained.
pub const DEFAULT_PARAMETER_CACHE_CAPACITY: usize = 10;

/// Bounded FIFO of parameter-set frames, oldest evicted first.
#[derive(Debug, Clone)]
pub struct ParameterCache {
    capacity: usize,
    frames: VecDeque<Bytes>,
}

impl Default for ParameterCache {
    fn default() -> Self {
        Self::new(DEFAULT_PARAMETER_CACHE_CAPACITY)
    }
}

impl ParameterCache {
    /// Create a cache holding at most `capacity` frames (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { capacity, frames: VecDeque::with_capacity(capacity + 1) }
    }

    /// Append a frame, evicting the oldest if the bound is exceeded.
    pub fn push(&mut self, frame: Bytes) {
        self.frames.push_back(frame);
        if self.frames.len() > self.capacity {
            self.frames.pop_front();
        }
    }

    /// Cached frames, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Bytes> {
        self.frames.iter()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// When the gate opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatePolicy {
    /// Open as soon as any parameter frame has been cached
    #[default]
    AnyParameter,

    /// Open on the first keyframe that arrives while parameter frames are cached
    Keyframe,
}

/// Externally visible gate state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateState {
    Waiting,
    Ready,
}

impl fmt::Display for GateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateState::Waiting => f.write_str("waiting"),
            GateState::Ready => f.write_str("ready"),
        }
    }
}

/// One-way latch controlling dispatch eligibility.
#[derive(Debug, Clone, Default)]
pub struct StreamGate {
    policy: GatePolicy,
    ready: bool,
}

impl StreamGate {
    pub fn new(policy: GatePolicy) -> Self {
        Self { policy, ready: false }
    }

    /// Update the latch after `kind` has been applied to `cache`.
    ///
    /// Returns true on the transition from waiting to ready. Once ready, stays ready.
    pub fn observe(&mut self, kind: UnitKind, cache: &ParameterCache) -> bool {
        if self.ready {
            return false;
        }

        let open = match self.policy {
            GatePolicy::AnyParameter => !cache.is_empty(),
            GatePolicy::Keyframe => kind == UnitKind::Keyframe && !cache.is_empty(),
        };

        if open {
            debug!(policy = ?self.policy, cached = cache.len(), "stream gate opened");
            self.ready = true;
        }
        open
    }

    /// Whether a frame of `kind` may be written to the sinks.
    ///
    /// Parameter frames always pass so the recording holds them even before the gate opens.
    pub fn admits(&self, kind: UnitKind) -> bool {
        self.ready || kind == UnitKind::Parameter
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn state(&self) -> GateState {
        if self.ready { GateState::Ready } else { GateState::Waiting }
    }

    pub fn policy(&self) -> GatePolicy {
        self.policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn eleventh_parameter_frame_evicts_the_first() {
        let mut cache = ParameterCache::default();
        for i in 0..11u8 {
            cache.push(Bytes::from(vec![i]));
        }

        assert_eq!(cache.len(), 10);
        let kept: Vec<u8> = cache.iter().map(|f| f[0]).collect();
        assert_eq!(kept, (1..11).collect::<Vec<u8>>());
    }

    #[test]
    fn permissive_gate_opens_on_first_parameter() {
        let mut cache = ParameterCache::default();
        let mut gate = StreamGate::new(GatePolicy::AnyParameter);

        assert!(!gate.observe(UnitKind::Ordinary, &cache));
        assert!(!gate.admits(UnitKind::Keyframe));
        assert!(gate.admits(UnitKind::Parameter));

        cache.push(Bytes::from_static(b"vps"));
        assert!(gate.observe(UnitKind::Parameter, &cache));
        assert_eq!(gate.state(), GateState::Ready);
        assert!(gate.admits(UnitKind::Ordinary));
    }

    #[test]
    fn keyframe_gate_waits_for_keyframe_after_parameters() {
        let mut cache = ParameterCache::default();
        let mut gate = StreamGate::new(GatePolicy::Keyframe);

        // Keyframe without parameters does not open
        assert!(!gate.observe(UnitKind::Keyframe, &cache));

        cache.push(Bytes::from_static(b"sps"));
        assert!(!gate.observe(UnitKind::Parameter, &cache));
        assert!(!gate.observe(UnitKind::Ordinary, &cache));
        assert!(!gate.is_ready());

        assert!(gate.observe(UnitKind::Keyframe, &cache));
        assert!(gate.is_ready());
    }

    #[test]
    fn policy_deserializes_from_snake_case() {
        let policy: GatePolicy = serde_yaml_ng::from_str("keyframe").expect("valid policy");
        assert_eq!(policy, GatePolicy::Keyframe);
        let policy: GatePolicy = serde_yaml_ng::from_str("any_parameter").expect("valid policy");
        assert_eq!(policy, GatePolicy::AnyParameter);
    }

    proptest! {
        #[test]
        fn cache_keeps_most_recent_frames_in_order(
            count in 0usize..40,
            capacity in 1usize..16,
        ) {
            let mut cache = ParameterCache::new(capacity);
            for i in 0..count {
                cache.push(Bytes::from((i as u32).to_be_bytes().to_vec()));
            }

            let expected: Vec<u32> = (count.saturating_sub(capacity)..count).map(|i| i as u32).collect();
            let kept: Vec<u32> = cache
                .iter()
                .map(|f| u32::from_be_bytes([f[0], f[1], f[2], f[3]]))
                .collect();
            prop_assert_eq!(kept, expected);
        }

        #[test]
        fn gate_never_closes_once_open(
            kinds in prop::collection::vec(
                prop_oneof![Just(UnitKind::Parameter), Just(UnitKind::Keyframe), Just(UnitKind::Ordinary)],
                1..64,
            ),
        ) {
            let mut cache = ParameterCache::default();
            let mut gate = StreamGate::new(GatePolicy::AnyParameter);
            let mut seen_parameter = false;

            for kind in kinds {
                if kind == UnitKind::Parameter {
                    cache.push(Bytes::from_static(b"p"));
                    seen_parameter = true;
                }
                gate.observe(kind, &cache);
                prop_assert_eq!(gate.is_ready(), seen_parameter);
            }
        }
    }
}

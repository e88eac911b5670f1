//! Stream session state
//!
//! [`StreamSession`] owns everything with process-lifetime state: the reassembler, the
//! parameter cache, the gate and the counters. It does no I/O. Each datagram goes in, and
//! at most one [`DispatchPlan`] comes out describing exactly what each sink must receive.

use bytes::Bytes;
use std::time::Instant;
use tracing::{debug, trace};

use crate::classify::{StartCodeClassifier, UnitClassifier};
use crate::gate::{GatePolicy, GateState, ParameterCache, StreamGate};
use crate::reassembly::{Finalized, FrameReassembler};
use crate::telemetry::{SessionCounters, TelemetrySnapshot};
use crate::types::{AssembledFrame, Shard, UnitKind};

/// Session tuning.
#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    pub parameter_cache_capacity: usize,
    pub gate_policy: GatePolicy,
    pub max_pending_frames: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            parameter_cache_capacity: crate::gate::DEFAULT_PARAMETER_CACHE_CAPACITY,
            gate_policy: GatePolicy::AnyParameter,
            max_pending_frames: 1,
        }
    }
}

/// What the sinks receive for one admitted frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchPlan {
    /// The admitted frame; its bytes go to the durable sink as-is
    pub frame: AssembledFrame,

    /// Cached parameter frames written to the live sink ahead of the frame, oldest first.
    /// Non-empty only for keyframes.
    pub live_prelude: Vec<Bytes>,
}

impl DispatchPlan {
    /// Chunks for the durable sink, in write order.
    pub fn durable_chunks(&self) -> impl Iterator<Item = &Bytes> {
        std::iter::once(&self.frame.data)
    }

    /// Chunks for the live sink, in write order.
    pub fn live_chunks(&self) -> impl Iterator<Item = &Bytes> {
        self.live_prelude.iter().chain(std::iter::once(&self.frame.data))
    }
}

/// Reassembly, classification, gating and counting for one stream.
pub struct StreamSession {
    reassembler: FrameReassembler,
    classifier: Box<dyn UnitClassifier>,
    cache: ParameterCache,
    gate: StreamGate,
    counters: SessionCounters,
}

impl Default for StreamSession {
    fn default() -> Self {
        Self::new(SessionOptions::default())
    }
}

impl StreamSession {
    pub fn new(options: SessionOptions) -> Self {
        Self::with_classifier(options, StartCodeClassifier)
    }

    /// Session using a custom unit classifier.
    pub fn with_classifier<C: UnitClassifier>(options: SessionOptions, classifier: C) -> Self {
        Self {
            reassembler: FrameReassembler::with_window(options.max_pending_frames),
            classifier: Box::new(classifier),
            cache: ParameterCache::new(options.parameter_cache_capacity),
            gate: StreamGate::new(options.gate_policy),
            counters: SessionCounters::new(Instant::now()),
        }
    }

    /// Process one raw datagram.
    pub fn ingest(&mut self, datagram: &[u8]) -> Option<DispatchPlan> {
        let shard = Shard::parse(datagram)?;
        self.ingest_shard(shard)
    }

    /// Process one datagram held in `Bytes`, sharing payload memory with it.
    pub fn ingest_bytes(&mut self, datagram: Bytes) -> Option<DispatchPlan> {
        let shard = Shard::parse_bytes(datagram)?;
        self.ingest_shard(shard)
    }

    /// Process one parsed shard.
    pub fn ingest_shard(&mut self, shard: Shard) -> Option<DispatchPlan> {
        let finalized = self.reassembler.push(shard)?;
        self.counters.record_finalized(finalized.is_complete());

        let frame = match finalized {
            Finalized::Complete(frame) => frame,
            Finalized::Incomplete { frame_id, shard_count, reason } => {
                debug!(frame_id, shard_count, ?reason, "dropping incomplete frame");
                return None;
            }
        };

        let unit_type = self.classifier.classify(&frame.data);
        let frame = frame.with_unit_type(unit_type);
        let kind = unit_type.kind();

        if kind == UnitKind::Parameter {
            self.cache.push(frame.data.clone());
        }
        self.gate.observe(kind, &self.cache);

        if !self.gate.admits(kind) {
            trace!(frame_id = frame.frame_id, %unit_type, "frame held back by gate");
            return None;
        }

        let live_prelude = if kind == UnitKind::Keyframe {
            self.cache.iter().cloned().collect()
        } else {
            Vec::new()
        };

        trace!(
            frame_id = frame.frame_id,
            %unit_type,
            len = frame.len(),
            prelude = live_prelude.len(),
            "frame admitted"
        );
        self.counters.record_dispatched();

        Some(DispatchPlan { frame, live_prelude })
    }

    pub fn gate_state(&self) -> GateState {
        self.gate.state()
    }

    pub fn parameter_cache(&self) -> &ParameterCache {
        &self.cache
    }

    pub fn counters(&self) -> &SessionCounters {
        &self.counters
    }

    /// Frames still accumulating shards.
    pub fn pending_frames(&self) -> usize {
        self.reassembler.pending()
    }

    /// Current status without moving the report window.
    pub fn snapshot(&self, live_active: bool) -> TelemetrySnapshot {
        self.counters.snapshot(self.gate.state(), live_active, Instant::now())
    }

    /// Current status, starting a new report window.
    pub fn report(&mut self, live_active: bool) -> TelemetrySnapshot {
        self.counters.report(self.gate.state(), live_active, Instant::now())
    }
}

impl std::fmt::Debug for StreamSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamSession")
            .field("reassembler", &self.reassembler)
            .field("cache", &self.cache.len())
            .field("gate", &self.gate)
            .field("counters", &self.counters)
            .finish_non_exhaustive()
    }
}

//! Session counters and status snapshots
//!
//! Counters are owned by the session and only ever read by the reporter, so reporting
//! cannot stall dispatch.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};

use crate::gate::GateState;

/// Percentage of finalized frames that failed the completeness check.
///
/// Defined as 0 when no frame has been finalized yet.
pub fn loss_percent(frames_seen: u64, frames_completed: u64) -> f64 {
    if frames_seen == 0 {
        return 0.0;
    }
    (1.0 - frames_completed as f64 / frames_seen as f64) * 100.0
}

/// Process-lifetime frame counters.
#[derive(Debug, Clone)]
pub struct SessionCounters {
    frames_seen: u64,
    frames_completed: u64,
    frames_dispatched: u64,
    session_start: Instant,
    last_report: Instant,
    reported_seen: u64,
    reported_completed: u64,
}

impl Default for SessionCounters {
    fn default() -> Self {
        Self::new(Instant::now())
    }
}

impl SessionCounters {
    pub fn new(session_start: Instant) -> Self {
        Self {
            frames_seen: 0,
            frames_completed: 0,
            frames_dispatched: 0,
            session_start,
            last_report: session_start,
            reported_seen: 0,
            reported_completed: 0,
        }
    }

    /// Count one finalization attempt.
    pub fn record_finalized(&mut self, complete: bool) {
        self.frames_seen += 1;
        if complete {
            self.frames_completed += 1;
        }
    }

    /// Count one frame handed to the sinks.
    pub fn record_dispatched(&mut self) {
        self.frames_dispatched += 1;
    }

    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }

    pub fn frames_completed(&self) -> u64 {
        self.frames_completed
    }

    pub fn frames_dispatched(&self) -> u64 {
        self.frames_dispatched
    }

    pub fn loss_percent(&self) -> f64 {
        loss_percent(self.frames_seen, self.frames_completed)
    }

    pub fn last_report(&self) -> Instant {
        self.last_report
    }

    /// Snapshot without moving the report window.
    pub fn snapshot(&self, gate: GateState, live_active: bool, now: Instant) -> TelemetrySnapshot {
        let interval_seen = self.frames_seen - self.reported_seen;
        let interval_completed = self.frames_completed - self.reported_completed;

        TelemetrySnapshot {
            elapsed: now.saturating_duration_since(self.session_start),
            frames_seen: self.frames_seen,
            frames_completed: self.frames_completed,
            frames_dispatched: self.frames_dispatched,
            loss_percent: self.loss_percent(),
            interval: now.saturating_duration_since(self.last_report),
            interval_seen,
            interval_completed,
            gate,
            live_active,
        }
    }

    /// Snapshot and start a new report window at `now`.
    pub fn report(&mut self, gate: GateState, live_active: bool, now: Instant) -> TelemetrySnapshot {
        let snapshot = self.snapshot(gate, live_active, now);
        self.last_report = now;
        self.reported_seen = self.frames_seen;
        self.reported_completed = self.frames_completed;
        snapshot
    }
}

/// Point-in-time view of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    /// Time since the session started
    pub elapsed: Duration,

    /// Frames finalized, complete or not
    pub frames_seen: u64,

    /// Frames that passed the completeness check
    pub frames_completed: u64,

    /// Complete frames admitted by the gate and written to the sinks
    pub frames_dispatched: u64,

    /// Share of finalized frames lost to missing shards
    pub loss_percent: f64,

    /// Length of the window the `interval_*` counts cover
    pub interval: Duration,

    pub interval_seen: u64,

    pub interval_completed: u64,

    pub gate: GateState,

    /// Whether the live sink is still accepting data
    pub live_active: bool,
}

impl Default for TelemetrySnapshot {
    fn default() -> Self {
        Self {
            elapsed: Duration::ZERO,
            frames_seen: 0,
            frames_completed: 0,
            frames_dispatched: 0,
            loss_percent: 0.0,
            interval: Duration::ZERO,
            interval_seen: 0,
            interval_completed: 0,
            gate: GateState::Waiting,
            live_active: false,
        }
    }
}

impl fmt::Display for TelemetrySnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}s | frames:{} | complete:{} | loss:{:.2}% | state:{} | live:{}",
            self.elapsed.as_secs(),
            self.frames_seen,
            self.frames_completed,
            self.loss_percent,
            self.gate,
            if self.live_active { "on" } else { "off" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loss_from_seen_and_completed() {
        assert!((loss_percent(10, 7) - 30.0).abs() < 1e-9);
        assert_eq!(loss_percent(0, 0), 0.0);
        assert_eq!(loss_percent(4, 4), 0.0);
        assert!((loss_percent(3, 0) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn counters_track_attempts_and_completions() {
        let start = Instant::now();
        let mut counters = SessionCounters::new(start);

        for complete in [true, true, false, true, true, true, false, true, false, true] {
            counters.record_finalized(complete);
        }

        assert_eq!(counters.frames_seen(), 10);
        assert_eq!(counters.frames_completed(), 7);
        let snapshot = counters.snapshot(GateState::Ready, true, start + Duration::from_secs(3));
        assert!((snapshot.loss_percent - 30.0).abs() < 1e-9);
        assert_eq!(snapshot.elapsed, Duration::from_secs(3));
    }

    #[test]
    fn report_moves_interval_window() {
        let start = Instant::now();
        let mut counters = SessionCounters::new(start);

        counters.record_finalized(true);
        counters.record_finalized(false);
        let first = counters.report(GateState::Waiting, false, start + Duration::from_secs(1));
        assert_eq!((first.interval_seen, first.interval_completed), (2, 1));
        assert_eq!(counters.last_report(), start + Duration::from_secs(1));

        counters.record_finalized(true);
        let second = counters.report(GateState::Ready, false, start + Duration::from_secs(2));
        assert_eq!((second.interval_seen, second.interval_completed), (1, 1));
        assert_eq!(second.interval, Duration::from_secs(1));
        assert_eq!((second.frames_seen, second.frames_completed), (3, 2));
    }

    #[test]
    fn status_line_format() {
        let snapshot = TelemetrySnapshot {
            elapsed: Duration::from_secs(12),
            frames_seen: 10,
            frames_completed: 7,
            loss_percent: 30.0,
            gate: GateState::Ready,
            live_active: true,
            ..Default::default()
        };

        assert_eq!(
            snapshot.to_string(),
            "12s | frames:10 | complete:7 | loss:30.00% | state:ready | live:on"
        );
    }
}

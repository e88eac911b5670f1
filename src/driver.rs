//! Driver spawns and manages the receive task

use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::dispatch::Dispatcher;
use crate::session::StreamSession;
use crate::source::DatagramSource;
use crate::telemetry::TelemetrySnapshot;
use crate::{Result, StreamError};

/// Consecutive receive failures tolerated before the transport is declared dead.
pub const MAX_RECEIVE_ERRORS: u32 = 10;

/// Result of spawning the receive task
pub struct DriverChannels {
    /// Latest telemetry snapshot, refreshed every report interval
    pub telemetry: watch::Receiver<TelemetrySnapshot>,
    /// Cancellation token for graceful shutdown
    pub cancel: CancellationToken,
    /// Resolves with the final snapshot once the sinks are closed
    pub task: JoinHandle<Result<TelemetrySnapshot>>,
}

/// Driver spawns and manages the receive task
///
/// The receive task owns the source, the session and the dispatcher. It is the only place
/// session state is touched, so datagrams are processed strictly in arrival order.
pub struct Driver;

impl Driver {
    /// Spawn the receive task.
    ///
    /// Must be called inside a tokio runtime.
    pub fn spawn<S>(
        source: S,
        session: StreamSession,
        dispatcher: Dispatcher,
        report_interval: Duration,
    ) -> DriverChannels
    where
        S: DatagramSource,
    {
        let initial = session.snapshot(dispatcher.live_active());
        let (telemetry_tx, telemetry_rx) = watch::channel(initial);

        let cancel = CancellationToken::new();
        let cancel_task = cancel.clone();

        let task = tokio::spawn(async move {
            Self::receive_task(source, session, dispatcher, report_interval, telemetry_tx, cancel_task).await
        });

        DriverChannels { telemetry: telemetry_rx, cancel, task }
    }

    /// Receive task - ingests datagrams, dispatches admitted frames, reports periodically
    async fn receive_task<S>(
        mut source: S,
        mut session: StreamSession,
        mut dispatcher: Dispatcher,
        report_interval: Duration,
        telemetry_tx: watch::Sender<TelemetrySnapshot>,
        cancel: CancellationToken,
    ) -> Result<TelemetrySnapshot>
    where
        S: DatagramSource,
    {
        info!("Receive task started");
        let mut datagram_count = 0u64;
        let mut error_count = 0u32;

        let report_interval = report_interval.max(Duration::from_millis(1));
        let mut report = interval_at(Instant::now() + report_interval, report_interval);
        report.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let outcome: Result<()> = 'receive: loop {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("Receive task cancelled");
                    break 'receive Ok(());
                }
                _ = report.tick() => {
                    let snapshot = session.report(dispatcher.live_active());
                    info!(
                        frames_seen = snapshot.frames_seen,
                        frames_completed = snapshot.frames_completed,
                        frames_dispatched = snapshot.frames_dispatched,
                        "{}",
                        snapshot
                    );
                    telemetry_tx.send_replace(snapshot);
                    continue 'receive;
                }
                result = source.recv() => result,
            };

            match result {
                Ok(Some(datagram)) => {
                    datagram_count += 1;
                    error_count = 0;
                    trace!("Datagram {}: {} bytes", datagram_count, datagram.len());

                    if let Some(plan) = session.ingest_bytes(datagram) {
                        if let Err(e) = dispatcher.dispatch(&plan).await {
                            error!("Recording failed, stopping: {}", e);
                            break 'receive Err(e);
                        }
                    }
                }
                Ok(None) => {
                    info!("Source ended after {} datagrams", datagram_count);
                    break 'receive Ok(());
                }
                Err(e) => {
                    // Don't give up on transient receive failures
                    error_count += 1;
                    error!("Receive error ({}/{}): {}", error_count, MAX_RECEIVE_ERRORS, e);

                    if error_count >= MAX_RECEIVE_ERRORS {
                        error!("Too many receive errors, shutting down");
                        break 'receive Err(StreamError::transport_failed(error_count, e));
                    }

                    // Exponential backoff: 100ms, 200ms, 400ms, ... capped at 1.6s
                    let backoff = Duration::from_millis(50 * (1 << error_count.min(5)));
                    tokio::select! {
                        _ = cancel.cancelled() => break 'receive Ok(()),
                        _ = tokio::time::sleep(backoff) => {}
                    }
                }
            }
        };

        let pending = session.pending_frames();
        if pending > 0 {
            warn!("Discarding {} frame(s) still awaiting shards", pending);
        }

        let closed = dispatcher.close().await;
        let live_active = closed.as_ref().is_ok_and(|summary| summary.live_completed);

        let snapshot = session.report(live_active);
        info!("Final: {}", snapshot);
        telemetry_tx.send_replace(snapshot.clone());

        outcome?;
        let summary = closed?;
        debug!(
            "Receive task ended ({} datagrams, {} bytes recorded)",
            datagram_count, summary.durable_bytes
        );

        Ok(snapshot)
    }
}

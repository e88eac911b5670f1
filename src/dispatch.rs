//! Sink dispatch
//!
//! Every sink is driven by its own writer task fed through a bounded FIFO queue, so each
//! sink sees chunks in exactly the order they were planned. The durable sink is mandatory:
//! its queue applies backpressure, and if its writer fails, dispatch fails. The live sink is
//! best effort and never waited on: frames are offered without blocking, and once its writer
//! stops or falls a full queue behind, the live path is switched off for the rest of the
//! session.

use bytes::Bytes;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::session::DispatchPlan;
use crate::sink::{Sink, SinkError};
use crate::{Result, StreamError};

/// Default number of queued chunks per sink.
pub const DEFAULT_SINK_QUEUE_DEPTH: usize = 256;

/// How long a live sink may take to drain and close at shutdown.
pub const LIVE_CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Writer task handle for one sink.
struct SinkWorker {
    name: &'static str,
    tx: mpsc::Sender<Bytes>,
    task: JoinHandle<std::result::Result<u64, SinkError>>,
}

impl SinkWorker {
    fn spawn<S: Sink>(name: &'static str, sink: S, depth: usize) -> Self {
        let (tx, rx) = mpsc::channel(depth.max(1));
        let task = tokio::spawn(Self::run(name, sink, rx));
        Self { name, tx, task }
    }

    /// Write queued chunks until the queue closes, flushing whenever it runs dry.
    async fn run<S: Sink>(
        name: &'static str,
        mut sink: S,
        mut rx: mpsc::Receiver<Bytes>,
    ) -> std::result::Result<u64, SinkError> {
        let mut written = 0u64;

        let outcome = async {
            while let Some(chunk) = rx.recv().await {
                sink.write(&chunk).await?;
                written += chunk.len() as u64;
                if rx.is_empty() {
                    sink.flush().await?;
                }
            }
            Ok::<(), SinkError>(())
        }
        .await;

        // Refuse further chunks before closing so senders observe the failure
        rx.close();
        let closed = sink.close().await;

        match outcome.and(closed) {
            Ok(()) => {
                debug!(sink = name, bytes = written, "sink writer finished");
                Ok(written)
            }
            Err(e) => Err(e),
        }
    }

    fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Queue a chunk, waiting for room. Fails once the writer has stopped.
    async fn send(&self, chunk: Bytes) -> std::result::Result<(), ()> {
        self.tx.send(chunk).await.map_err(|_| ())
    }

    /// Queue all `chunks` without waiting, or none of them.
    fn offer(&self, chunks: &[&Bytes]) -> std::result::Result<(), Offer> {
        if self.tx.is_closed() {
            return Err(Offer::Stopped);
        }
        if self.tx.capacity() < chunks.len() {
            return Err(Offer::Behind);
        }
        for chunk in chunks {
            // This dispatcher is the only sender, so the capacity checked above cannot shrink
            self.tx.try_send((*chunk).clone()).map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => Offer::Behind,
                mpsc::error::TrySendError::Closed(_) => Offer::Stopped,
            })?;
        }
        Ok(())
    }

    /// Close the queue and wait for the writer to drain it.
    async fn finish(self) -> Result<std::result::Result<u64, SinkError>> {
        drop(self.tx);
        Ok(self.task.await?)
    }

    /// Like [`SinkWorker::finish`], but abandon the writer if it is still busy after `limit`.
    async fn finish_within(self, limit: Duration) -> Option<Result<std::result::Result<u64, SinkError>>> {
        drop(self.tx);
        let mut task = self.task;
        match tokio::time::timeout(limit, &mut task).await {
            Ok(joined) => Some(joined.map_err(StreamError::from)),
            Err(_) => {
                task.abort();
                None
            }
        }
    }

    /// Stop the writer now, dropping whatever is still queued.
    fn abort(self) {
        drop(self.tx);
        self.task.abort();
    }
}

/// Why a live offer was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Offer {
    /// The writer has stopped.
    Stopped,
    /// The queue has no room for the whole plan.
    Behind,
}

/// Bytes written per sink over a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub durable_bytes: u64,
    pub live_bytes: u64,
    /// The live sink was still healthy when it was closed
    pub live_completed: bool,
}

/// Fans admitted frames out to the durable and live sinks.
///
/// Must be created inside a tokio runtime.
pub struct Dispatcher {
    durable: Option<SinkWorker>,
    live: Option<SinkWorker>,
    /// A live writer that stopped by itself, closed at shutdown
    retired: Option<SinkWorker>,
}

impl Dispatcher {
    /// Start writer tasks for both sinks. Pass `None` to run without live playback.
    pub fn new<D, L>(durable: D, live: Option<L>, queue_depth: usize) -> Self
    where
        D: Sink,
        L: Sink,
    {
        Self {
            durable: Some(SinkWorker::spawn("durable", durable, queue_depth)),
            live: live.map(|sink| SinkWorker::spawn("live", sink, queue_depth)),
            retired: None,
        }
    }

    /// Whether frames are still being offered to the live sink.
    pub fn live_active(&self) -> bool {
        self.live.as_ref().is_some_and(SinkWorker::is_open)
    }

    /// Queue one plan on both sinks.
    ///
    /// Waits only for room on the durable queue, and only a durable sink failure is returned.
    /// A live sink that has stopped or cannot take the whole plan is switched off.
    pub async fn dispatch(&mut self, plan: &DispatchPlan) -> Result<()> {
        if let Some(durable) = &self.durable {
            for chunk in plan.durable_chunks() {
                if durable.send(chunk.clone()).await.is_err() {
                    return Err(self.durable_failure().await);
                }
            }
        }

        let live_chunks: Vec<&Bytes> = plan.live_chunks().collect();
        if let Some(Err(refused)) = self.live.as_ref().map(|live| live.offer(&live_chunks)) {
            self.retire_live(refused);
        }

        Ok(())
    }

    async fn durable_failure(&mut self) -> StreamError {
        let Some(worker) = self.durable.take() else {
            return StreamError::Task { details: "durable sink already finished".to_string() };
        };
        let name = worker.name;

        match worker.finish().await {
            Ok(Err(e)) => StreamError::sink_failed(name, e),
            Ok(Ok(_)) => StreamError::Task { details: "durable sink stopped unexpectedly".to_string() },
            Err(e) => e,
        }
    }

    /// Switch the live path off without waiting on its writer.
    fn retire_live(&mut self, refused: Offer) {
        let Some(worker) = self.live.take() else {
            return;
        };

        match refused {
            Offer::Stopped => {
                warn!("Live sink stopped, continuing with recording only");
                self.retired = Some(worker);
            }
            Offer::Behind => {
                warn!(
                    queued = worker.tx.max_capacity() - worker.tx.capacity(),
                    "Live sink stalled, continuing with recording only"
                );
                worker.abort();
            }
        }
    }

    /// Drain the durable queue and close its sink, then give the live sink
    /// [`LIVE_CLOSE_TIMEOUT`] to do the same.
    pub async fn close(mut self) -> Result<DispatchSummary> {
        let mut summary = DispatchSummary::default();

        if let Some(durable) = self.durable.take() {
            let name = durable.name;
            let closed = durable.finish().await.and_then(|r| r.map_err(|e| StreamError::sink_failed(name, e)));
            if closed.is_err() {
                // The live writer must not outlive a failed recording
                if let Some(live) = self.live.take() {
                    live.abort();
                }
            }
            summary.durable_bytes = closed?;
        }

        if let Some(live) = self.live.take() {
            match live.finish_within(LIVE_CLOSE_TIMEOUT).await {
                Some(Ok(Ok(bytes))) => {
                    summary.live_bytes = bytes;
                    summary.live_completed = true;
                }
                Some(Ok(Err(e))) => warn!("Live sink stopped before shutdown: {}", e),
                Some(Err(e)) => warn!("Live sink task failed: {}", e),
                None => warn!(timeout = ?LIVE_CLOSE_TIMEOUT, "Live sink did not close in time, abandoned"),
            }
        }

        if let Some(retired) = self.retired.take() {
            match retired.finish_within(LIVE_CLOSE_TIMEOUT).await {
                Some(Ok(Err(e))) => debug!("Live sink ended with: {}", e),
                Some(Ok(Ok(bytes))) => summary.live_bytes = bytes,
                Some(Err(e)) => warn!("Live sink task failed: {}", e),
                None => debug!("Retired live sink did not close in time, abandoned"),
            }
        }

        info!(durable_bytes = summary.durable_bytes, live_bytes = summary.live_bytes, "Sinks closed");
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use crate::types::{AssembledFrame, UnitType};

    fn plan(frame: &'static [u8], prelude: &[&'static [u8]]) -> DispatchPlan {
        DispatchPlan {
            frame: AssembledFrame::new(1, Bytes::from_static(frame), 1).with_unit_type(UnitType::Known(19)),
            live_prelude: prelude.iter().copied().map(Bytes::from_static).collect(),
        }
    }

    #[tokio::test]
    async fn prelude_goes_to_live_only() {
        let durable = MemorySink::new();
        let live = MemorySink::new();
        let mut dispatcher = Dispatcher::new(durable.clone(), Some(live.clone()), 8);

        dispatcher.dispatch(&plan(b"K", &[&b"P1"[..], &b"P2"[..]])).await.expect("dispatch");
        let summary = dispatcher.close().await.expect("close");

        assert_eq!(durable.writes(), vec![Bytes::from_static(b"K")]);
        assert_eq!(
            live.writes(),
            vec![Bytes::from_static(b"P1"), Bytes::from_static(b"P2"), Bytes::from_static(b"K")]
        );
        assert_eq!(summary, DispatchSummary { durable_bytes: 1, live_bytes: 5, live_completed: true });
        assert!(durable.is_closed());
        assert!(live.is_closed());
    }

    #[tokio::test]
    async fn live_failure_is_isolated() {
        let durable = MemorySink::new();
        let live = MemorySink::new();
        let mut dispatcher = Dispatcher::new(durable.clone(), Some(live.clone()), 1);

        dispatcher.dispatch(&plan(b"one", &[])).await.expect("dispatch");
        while live.write_count() < 1 {
            tokio::task::yield_now().await;
        }
        live.disconnect();

        // The live writer only notices on its next write; keep dispatching until it retires
        for _ in 0..100 {
            dispatcher.dispatch(&plan(b"more", &[])).await.expect("durable unaffected");
            if !dispatcher.live_active() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(!dispatcher.live_active());

        dispatcher.dispatch(&plan(b"last", &[])).await.expect("durable unaffected");
        let summary = dispatcher.close().await.expect("close");
        assert!(!summary.live_completed);

        let durable_writes = durable.writes();
        assert_eq!(durable_writes.first(), Some(&Bytes::from_static(b"one")));
        assert_eq!(durable_writes.last(), Some(&Bytes::from_static(b"last")));
        assert_eq!(live.writes(), vec![Bytes::from_static(b"one")]);
    }

    #[tokio::test]
    async fn durable_failure_is_reported() {
        let durable = MemorySink::new();
        let mut dispatcher = Dispatcher::new(durable.clone(), None::<MemorySink>, 1);
        durable.disconnect();

        let mut result = Ok(());
        for _ in 0..100 {
            result = dispatcher.dispatch(&plan(b"x", &[])).await;
            if result.is_err() {
                break;
            }
            tokio::task::yield_now().await;
        }

        assert!(matches!(result, Err(StreamError::Sink { source: SinkError::Closed, .. })));
    }

    /// Accepts nothing: every write waits forever, like a player that stopped reading its pipe.
    struct StalledSink;

    #[async_trait::async_trait]
    impl Sink for StalledSink {
        async fn write(&mut self, _bytes: &[u8]) -> std::result::Result<(), SinkError> {
            std::future::pending().await
        }

        async fn flush(&mut self) -> std::result::Result<(), SinkError> {
            Ok(())
        }

        async fn close(&mut self) -> std::result::Result<(), SinkError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn stalled_live_sink_is_switched_off() {
        let durable = MemorySink::new();
        let mut dispatcher = Dispatcher::new(durable.clone(), Some(StalledSink), 4);

        let dispatched = tokio::time::timeout(Duration::from_secs(1), async {
            for _ in 0..50 {
                dispatcher.dispatch(&plan(b"f", &[])).await.expect("durable unaffected");
            }
        })
        .await;
        assert!(dispatched.is_ok(), "dispatch waited on the live sink");
        assert!(!dispatcher.live_active());

        let summary = tokio::time::timeout(Duration::from_secs(1), dispatcher.close())
            .await
            .expect("close does not wait on the live sink")
            .expect("close");
        assert_eq!(durable.write_count(), 50);
        assert!(durable.is_closed());
        assert_eq!(summary.durable_bytes, 50);
        assert!(!summary.live_completed);
    }

    #[tokio::test]
    async fn live_close_is_bounded() {
        let durable = MemorySink::new();
        let dispatcher = Dispatcher::new(durable.clone(), Some(StalledSink), 4);

        let summary = tokio::time::timeout(LIVE_CLOSE_TIMEOUT * 2, dispatcher.close())
            .await
            .expect("live close gives up")
            .expect("close");

        assert!(durable.is_closed());
        assert!(!summary.live_completed);
    }

    #[tokio::test]
    async fn plan_that_does_not_fit_is_not_split() {
        let durable = MemorySink::new();
        let live = MemorySink::new();
        let mut dispatcher = Dispatcher::new(durable.clone(), Some(live.clone()), 2);

        dispatcher.dispatch(&plan(b"K", &[&b"P1"[..], &b"P2"[..]])).await.expect("dispatch");
        assert!(!dispatcher.live_active());
        dispatcher.close().await.expect("close");

        assert!(live.writes().is_empty());
        assert_eq!(durable.writes(), vec![Bytes::from_static(b"K")]);
    }

    #[tokio::test]
    async fn no_live_sink_means_inactive() {
        let dispatcher = Dispatcher::new(MemorySink::new(), None::<MemorySink>, 4);
        assert!(!dispatcher.live_active());
        dispatcher.close().await.expect("close");
    }
}

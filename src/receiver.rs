//! Receiver entry point

use futures::Stream;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ReceiverConfig;
use crate::dispatch::Dispatcher;
use crate::driver::Driver;
use crate::session::StreamSession;
use crate::sink::{FileSink, ProcessSink, Sink};
use crate::source::DatagramSource;
use crate::sources::UdpSource;
use crate::telemetry::TelemetrySnapshot;
use crate::{Result, StreamError};

/// Starts receive sessions.
pub struct Receiver;

impl Receiver {
    /// Bind the UDP socket, open the recording and start the live player from `config`.
    ///
    /// Fails if the socket cannot be bound or the recording cannot be created. A live player
    /// that cannot be started is logged and the session runs with the recording alone.
    pub async fn bind(config: &ReceiverConfig) -> Result<ReceiverHandle> {
        config.validate()?;

        let source = UdpSource::bind(config.listen_addr).await?;
        let local_addr = source.local_addr()?;

        let durable = FileSink::create(&config.recording_path).await?;

        let live = if config.live.enabled {
            match ProcessSink::spawn(&config.live.program, config.live.args.as_slice()) {
                Ok(sink) => Some(sink),
                Err(e) => {
                    warn!("Live playback unavailable, recording only: {}", e);
                    None
                }
            }
        } else {
            info!("Live playback disabled");
            None
        };

        let session = StreamSession::new(config.session_options());
        let mut handle =
            Self::start(source, session, durable, live, config.sink_queue_depth, config.report_interval());
        handle.local_addr = Some(local_addr);

        Ok(handle)
    }

    /// Start a session over any source and sinks.
    ///
    /// Must be called inside a tokio runtime.
    pub fn start<S, D, L>(
        source: S,
        session: StreamSession,
        durable: D,
        live: Option<L>,
        queue_depth: usize,
        report_interval: Duration,
    ) -> ReceiverHandle
    where
        S: DatagramSource,
        D: Sink,
        L: Sink,
    {
        let dispatcher = Dispatcher::new(durable, live, queue_depth);
        let channels = Driver::spawn(source, session, dispatcher, report_interval);

        ReceiverHandle {
            local_addr: None,
            telemetry: channels.telemetry,
            cancel: channels.cancel,
            task: Some(channels.task),
        }
    }
}

/// A running receive session.
///
/// Dropping the handle cancels the session without waiting for the sinks to close; call
/// [`ReceiverHandle::shutdown`] to drain and close them.
pub struct ReceiverHandle {
    local_addr: Option<SocketAddr>,

    /// Telemetry watch receiver
    telemetry: watch::Receiver<TelemetrySnapshot>,

    /// Cancellation token for stopping the receive task
    cancel: CancellationToken,

    task: Option<JoinHandle<Result<TelemetrySnapshot>>>,
}

impl ReceiverHandle {
    /// Bound socket address, when the session was started by [`Receiver::bind`]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Telemetry snapshots as a stream, starting with the current one
    pub fn telemetry_updates(&self) -> impl Stream<Item = TelemetrySnapshot> + 'static {
        WatchStream::new(self.telemetry.clone())
    }

    /// Most recently reported snapshot
    pub fn current_telemetry(&self) -> TelemetrySnapshot {
        self.telemetry.borrow().clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Wait for the session to end on its own (source exhausted or a fatal error).
    ///
    /// Cancel safe: it can be raced against a shutdown signal and called again.
    pub async fn wait(&mut self) -> Result<TelemetrySnapshot> {
        let Some(task) = self.task.as_mut() else {
            return Err(StreamError::Task { details: "receive task already joined".to_string() });
        };

        let result = task.await;
        self.task = None;
        result?
    }

    /// Stop receiving, drain and close the sinks, and return the final snapshot.
    pub async fn shutdown(mut self) -> Result<TelemetrySnapshot> {
        info!("Shutting down receiver");
        self.cancel.cancel();
        self.wait().await
    }
}

impl Drop for ReceiverHandle {
    fn drop(&mut self) {
        debug!("Dropping receiver handle");
        // Cancel tasks on drop for clean shutdown
        self.cancel.cancel();
    }
}

//! Event subscriber: background task reading Marathon's event stream.
//!
//! The subscriber keeps one `/v2/events` connection open, feeds every
//! decoded frame through the [`EventPipeline`], and reconnects with
//! exponential backoff when the stream fails or ends.

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use bridge_marathon::{ClientError, EventStream, MarathonClient, SUBSCRIBED_EVENTS};

use crate::backoff::ReconnectBackoff;
use crate::normalizer::EventNormalizer;
use crate::queue::EventQueue;
use crate::sse::{SseDecoder, SseFrame};

/// Normalizer plus queue: what happens to each frame.
#[derive(Debug, Clone)]
pub struct EventPipeline {
    normalizer: EventNormalizer,
    queue: EventQueue,
}

impl EventPipeline {
    pub fn new(normalizer: EventNormalizer, queue: EventQueue) -> Self {
        Self { normalizer, queue }
    }

    /// Normalize a frame and enqueue the result. Returns whether an
    /// event was enqueued.
    pub fn handle(&self, frame: &SseFrame) -> bool {
        match self.normalizer.handle_raw(&frame.event, &frame.data) {
            Some(event) => {
                self.queue.push(event);
                true
            }
            None => false,
        }
    }

    pub fn queue(&self) -> &EventQueue {
        &self.queue
    }

    pub fn normalizer(&self) -> &EventNormalizer {
        &self.normalizer
    }
}

/// Handle to the running subscriber task.
pub struct EventSubscriber {
    handle: Option<JoinHandle<()>>,
    shutdown_tx: watch::Sender<bool>,
}

impl EventSubscriber {
    /// Start the background reader.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn subscribe(
        client: MarathonClient,
        pipeline: EventPipeline,
        backoff: ReconnectBackoff,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            run_subscriber(client, pipeline, backoff, shutdown_rx).await;
        });
        Self {
            handle: Some(handle),
            shutdown_tx,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the reader and wait for it to exit.
    pub async fn close(mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    warn!(error = %e, "event subscriber task failed");
                }
            }
        }
    }
}

impl Drop for EventSubscriber {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// Why a connected stream stopped.
enum StreamEnd {
    Shutdown,
    Closed,
    Failed(ClientError),
}

async fn run_subscriber(
    client: MarathonClient,
    pipeline: EventPipeline,
    mut backoff: ReconnectBackoff,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut decoder = SseDecoder::new();

    loop {
        let connected = tokio::select! {
            result = client.open_event_stream(&SUBSCRIBED_EVENTS) => result,
            _ = shutdown.changed() => break,
        };

        let reason = match connected {
            Ok(mut stream) => {
                info!("subscribed to marathon event stream");
                backoff.reset();
                decoder.reset();
                match read_stream(&mut stream, &mut decoder, &pipeline, &mut shutdown).await {
                    StreamEnd::Shutdown => break,
                    StreamEnd::Closed => "stream closed by marathon".to_string(),
                    StreamEnd::Failed(e) => e.to_string(),
                }
            }
            Err(e) => e.to_string(),
        };

        let delay = backoff.next();
        warn!(
            error = %reason,
            delay_ms = delay.as_millis() as u64,
            "marathon event stream unavailable, reconnecting"
        );

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shutdown.changed() => break,
        }
    }

    info!("marathon event subscriber closed");
}

async fn read_stream(
    stream: &mut EventStream,
    decoder: &mut SseDecoder,
    pipeline: &EventPipeline,
    shutdown: &mut watch::Receiver<bool>,
) -> StreamEnd {
    loop {
        let chunk = tokio::select! {
            chunk = stream.next_chunk() => chunk,
            _ = shutdown.changed() => return StreamEnd::Shutdown,
        };

        match chunk {
            Ok(Some(bytes)) => {
                for frame in decoder.feed(&bytes) {
                    if !pipeline.handle(&frame) {
                        debug!(event = %frame.event, "event produced no normalized output");
                    }
                }
            }
            Ok(None) => return StreamEnd::Closed,
            Err(e) => return StreamEnd::Failed(e),
        }
    }
}

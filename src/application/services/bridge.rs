//! Fan-out Bridge
//!
//! Connects the local registry to the message bus:
//!
//! - `publish` sends a locally originated envelope to `room:{room_id}`.
//! - One subscriber loop on `room:*` re-injects envelopes from peer
//!   processes into the local registry.
//!
//! Loop prevention is by `message_id`. The subscriber loop owns a dedup
//! window; `publish` hands the id to the loop over a marks channel before
//! the payload reaches the bus, and the loop always drains marks before it
//! reads the next bus message, so a process never re-delivers its own echo.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::{Stream, StreamExt};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use super::dedup::DedupWindow;
use super::hub::{Hub, HubError};
use crate::domain::{
    room_channel, BusError, BusMessage, BusStream, Envelope, MessageBus, ROOM_CHANNEL_PATTERN,
};
use crate::infrastructure::metrics;

#[derive(Debug, Clone, Copy)]
pub struct BridgeConfig {
    /// How long a message id is remembered
    pub dedup_window: Duration,
    /// Most message ids remembered at once
    pub dedup_capacity: usize,
    /// Pause before re-subscribing after the bus stream ends
    pub resubscribe_delay: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            dedup_window: Duration::from_secs(30),
            dedup_capacity: 10_000,
            resubscribe_delay: Duration::from_secs(1),
        }
    }
}

struct Lifecycle {
    shutdown: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

#[derive(Clone)]
pub struct FanoutBridge {
    bus: Arc<dyn MessageBus>,
    marks_tx: mpsc::UnboundedSender<String>,
    lifecycle: Arc<Lifecycle>,
}

impl FanoutBridge {
    /// Subscribe to every room channel and start the subscriber loop.
    ///
    /// A failed initial subscription is not fatal: the loop keeps retrying
    /// until it succeeds or the bridge is shut down.
    pub async fn start(bus: Arc<dyn MessageBus>, hub: Hub, config: BridgeConfig) -> Self {
        let initial = match bus.subscribe(ROOM_CHANNEL_PATTERN).await {
            Ok(stream) => {
                info!(pattern = ROOM_CHANNEL_PATTERN, "Bridge subscribed");
                Some(stream)
            }
            Err(e) => {
                warn!(error = %e, "Bridge subscription failed, will retry");
                None
            }
        };

        let (marks_tx, marks_rx) = mpsc::unbounded_channel();
        let (shutdown, shutdown_rx) = watch::channel(false);

        let subscriber = SubscriberLoop {
            bus: bus.clone(),
            hub,
            dedup: DedupWindow::new(config.dedup_window, config.dedup_capacity),
            marks_rx,
            shutdown: shutdown_rx,
            resubscribe_delay: config.resubscribe_delay,
        };
        let task = tokio::spawn(subscriber.run(initial));

        Self {
            bus,
            marks_tx,
            lifecycle: Arc::new(Lifecycle {
                shutdown,
                task: Mutex::new(Some(task)),
            }),
        }
    }

    /// Publish a locally originated envelope to its room channel.
    #[instrument(skip(self, envelope), fields(room_id = %envelope.room_id, message_id = %envelope.message_id))]
    pub async fn publish(&self, envelope: &Envelope) -> Result<(), BusError> {
        let payload = envelope
            .encode()
            .map_err(|e| BusError::Encode(e.to_string()))?;

        // The id must be in the window before the bus can echo it back.
        self.marks_tx
            .send(envelope.message_id.clone())
            .map_err(|_| BusError::Closed)?;

        let channel = room_channel(&envelope.room_id);
        if let Err(e) = self.bus.publish(&channel, payload).await {
            metrics::record_bus_publish_failure();
            warn!(error = %e, channel = %channel, "Bus publish failed");
            return Err(e);
        }

        debug!(channel = %channel, "Published to bus");
        Ok(())
    }

    /// Open a bus subscription for a single room, independent of the
    /// registry. Dropping the subscription releases it.
    pub async fn subscribe_room(&self, room_id: &str) -> Result<Subscription, BusError> {
        let stream = self.bus.subscribe(&room_channel(room_id)).await?;
        debug!(room_id = %room_id, "Room subscription opened");
        Ok(Subscription {
            room_id: room_id.to_string(),
            inner: stream,
        })
    }

    pub fn is_closed(&self) -> bool {
        *self.lifecycle.shutdown.borrow()
    }

    /// Stop the subscriber loop and wait for it.
    pub async fn shutdown(&self) {
        self.lifecycle.shutdown.send_replace(true);

        let task = self.lifecycle.task.lock().await.take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                error!(error = %e, "Bridge subscriber task failed");
            }
        }
    }
}

struct SubscriberLoop {
    bus: Arc<dyn MessageBus>,
    hub: Hub,
    dedup: DedupWindow,
    marks_rx: mpsc::UnboundedReceiver<String>,
    shutdown: watch::Receiver<bool>,
    resubscribe_delay: Duration,
}

impl SubscriberLoop {
    async fn run(mut self, mut initial: Option<BusStream>) {
        loop {
            let mut messages = match initial.take() {
                Some(stream) => stream,
                None => match self.resubscribe().await {
                    Some(stream) => stream,
                    None => break,
                },
            };

            let stream_ended = loop {
                tokio::select! {
                    biased;
                    _ = self.shutdown.changed() => break false,
                    Some(id) = self.marks_rx.recv() => self.mark(&id),
                    message = messages.next() => match message {
                        Some(message) => self.handle(message).await,
                        None => break true,
                    },
                }
            };

            if !stream_ended {
                break;
            }
            warn!("Bus subscription ended, resubscribing");
        }

        info!("Bridge subscriber stopped");
    }

    /// Wait out the resubscribe delay and subscribe again. Returns `None` on
    /// shutdown.
    async fn resubscribe(&mut self) -> Option<BusStream> {
        loop {
            let delay = tokio::time::sleep(self.resubscribe_delay);
            tokio::pin!(delay);

            loop {
                tokio::select! {
                    biased;
                    _ = self.shutdown.changed() => return None,
                    Some(id) = self.marks_rx.recv() => self.mark(&id),
                    _ = &mut delay => break,
                }
            }

            match self.bus.subscribe(ROOM_CHANNEL_PATTERN).await {
                Ok(stream) => {
                    info!(pattern = ROOM_CHANNEL_PATTERN, "Bridge resubscribed");
                    return Some(stream);
                }
                Err(e) => warn!(error = %e, "Bridge resubscribe failed"),
            }
        }
    }

    fn mark(&mut self, message_id: &str) {
        self.dedup.insert(message_id);
    }

    async fn handle(&mut self, message: BusMessage) {
        let envelope = match Envelope::decode(&message.payload) {
            Ok(envelope) => envelope,
            Err(e) => {
                metrics::record_bus_rejected();
                warn!(channel = %message.channel, error = %e, "Dropping invalid bus payload");
                return;
            }
        };

        if room_channel(&envelope.room_id) != message.channel {
            metrics::record_bus_rejected();
            warn!(
                channel = %message.channel,
                room_id = %envelope.room_id,
                "Envelope room does not match its channel"
            );
            return;
        }

        if !self.dedup.insert(&envelope.message_id) {
            metrics::record_duplicate_suppressed();
            debug!(message_id = %envelope.message_id, "Duplicate envelope suppressed");
            return;
        }

        let room_id = envelope.room_id.clone();
        let message_id = envelope.message_id.clone();
        match self.hub.broadcast(&room_id, Arc::new(envelope)).await {
            Ok(delivered) => debug!(
                room_id = %room_id,
                message_id = %message_id,
                delivered,
                "Re-injected bus envelope"
            ),
            Err(HubError::RegistryClosed) => debug!("Registry closed, bus envelope dropped"),
            Err(e) => warn!(error = %e, "Failed to re-inject bus envelope"),
        }
    }
}

/// Envelope stream for one room, bound to one RPC call.
pub struct Subscription {
    room_id: String,
    inner: BusStream,
}

impl Subscription {
    pub fn room_id(&self) -> &str {
        &self.room_id
    }
}

impl Stream for Subscription {
    type Item = Envelope;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            match this.inner.poll_next_unpin(cx) {
                Poll::Ready(Some(message)) => match Envelope::decode(&message.payload) {
                    Ok(envelope) if envelope.room_id == this.room_id => {
                        return Poll::Ready(Some(envelope))
                    }
                    Ok(_) => continue,
                    Err(e) => {
                        warn!(room_id = %this.room_id, error = %e, "Skipping invalid bus payload");
                        continue;
                    }
                },
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        debug!(room_id = %self.room_id, "Room subscription released");
    }
}

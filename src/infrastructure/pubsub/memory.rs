//! In-process message bus for single-node runs and tests.
//!
//! Every subscriber gets its own `broadcast` receiver and filters by
//! channel pattern. A subscriber that falls more than `capacity` messages
//! behind loses the overflow, which matches the at-most-once contract of
//! the Redis bus.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tokio::sync::broadcast;
use tracing::warn;

use crate::domain::{channel_matches, BusError, BusMessage, BusStream, MessageBus};

const DEFAULT_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
pub struct MemoryBus {
    sender: broadcast::Sender<BusMessage>,
}

impl MemoryBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for MemoryBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[async_trait]
impl MessageBus for MemoryBus {
    async fn publish(&self, channel: &str, payload: Vec<u8>) -> Result<(), BusError> {
        // No subscribers is not an error, same as PUBLISH returning 0.
        let _ = self.sender.send(BusMessage {
            channel: channel.to_string(),
            payload,
        });
        Ok(())
    }

    async fn subscribe(&self, pattern: &str) -> Result<BusStream, BusError> {
        let receiver = self.sender.subscribe();
        let pattern = pattern.to_string();

        let stream = stream::unfold((receiver, pattern), |(mut receiver, pattern)| async move {
            loop {
                match receiver.recv().await {
                    Ok(message) if channel_matches(&pattern, &message.channel) => {
                        return Some((message, (receiver, pattern)));
                    }
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(pattern = %pattern, skipped, "Subscriber lagged, messages dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        });
        Ok(stream.boxed())
    }

    async fn ping(&self) -> Result<(), BusError> {
        Ok(())
    }
}

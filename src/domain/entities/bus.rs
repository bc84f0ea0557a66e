//! Publish/subscribe bus collaborator contract.

use async_trait::async_trait;
use futures::stream::BoxStream;

/// A message received from the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    pub channel: String,
    pub payload: Vec<u8>,
}

/// Stream of messages for one subscription. Dropping it releases the
/// underlying bus subscription.
pub type BusStream = BoxStream<'static, BusMessage>;

/// Bus collaborator errors.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Bus closed")]
    Closed,

    #[error("Encoding error: {0}")]
    Encode(String),
}

#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Publish `payload` on `channel`. Subscribers on this process see it too.
    async fn publish(&self, channel: &str, payload: Vec<u8>) -> Result<(), BusError>;

    /// Subscribe to a channel or a glob pattern (`room:*`).
    async fn subscribe(&self, pattern: &str) -> Result<BusStream, BusError>;

    /// Connectivity check for readiness probes.
    async fn ping(&self) -> Result<(), BusError>;
}

/// Glob match supporting a trailing `*`, which is the only form the relay
/// subscribes with.
pub fn channel_matches(pattern: &str, channel: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => channel.starts_with(prefix),
        None => pattern == channel,
    }
}

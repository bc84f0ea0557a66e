//! Redis-backed message bus.
//!
//! Publishes go through the shared `ConnectionManager`. Every subscription
//! opens its own pub/sub connection, so dropping the returned stream closes
//! that connection and releases the subscription on the server.

use async_trait::async_trait;
use futures::StreamExt;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use tracing::{debug, instrument};

use crate::domain::{BusError, BusMessage, BusStream, MessageBus};

#[derive(Clone)]
pub struct RedisBus {
    client: Client,
    publisher: ConnectionManager,
}

impl RedisBus {
    pub fn new(client: Client, publisher: ConnectionManager) -> Self {
        Self { client, publisher }
    }
}

#[async_trait]
impl MessageBus for RedisBus {
    #[instrument(skip(self, payload), fields(bytes = payload.len()))]
    async fn publish(&self, channel: &str, payload: Vec<u8>) -> Result<(), BusError> {
        let mut conn = self.publisher.clone();
        let receivers: i64 = conn.publish(channel, payload).await?;
        debug!(receivers, "Published");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn subscribe(&self, pattern: &str) -> Result<BusStream, BusError> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        if pattern.contains('*') {
            pubsub.psubscribe(pattern).await?;
        } else {
            pubsub.subscribe(pattern).await?;
        }
        debug!("Subscribed");

        let stream = pubsub.into_on_message().map(|msg| BusMessage {
            channel: msg.get_channel_name().to_string(),
            payload: msg.get_payload_bytes().to_vec(),
        });
        Ok(stream.boxed())
    }

    async fn ping(&self) -> Result<(), BusError> {
        let mut conn = self.publisher.clone();
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        Ok(())
    }
}

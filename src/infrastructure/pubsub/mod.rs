//! Pub/Sub Module
//!
//! Message bus implementations behind the `MessageBus` trait.
//!
//! ```text
//! +-------------------+
//! |   FanoutBridge    |
//! +-------------------+
//!          |
//!          v
//! +-------------------+
//! | MessageBus Trait  |  <-- Abstract interface
//! +-------------------+
//!      |          |
//!      v          v
//! +----------+ +-----------+
//! | RedisBus | | MemoryBus |  <-- multi-process / single-process
//! +----------+ +-----------+
//! ```

mod memory;
mod redis_bus;

pub use memory::MemoryBus;
pub use redis_bus::RedisBus;

use redis::aio::ConnectionManager;
use redis::Client;
use tracing::{info, instrument};

use crate::config::RedisSettings;

/// Creates a Redis connection manager with automatic reconnection.
///
/// # Errors
/// Returns `redis::RedisError` if the URL is invalid or the server is
/// unreachable.
#[instrument(skip(settings), fields(url = %settings.url))]
pub async fn create_redis_client(
    settings: &RedisSettings,
) -> Result<(Client, ConnectionManager), redis::RedisError> {
    info!("Connecting to Redis...");
    let client = Client::open(settings.url.as_str())?;
    let manager = ConnectionManager::new(client.clone()).await?;
    info!("Redis connection established");
    Ok((client, manager))
}

/// Creates a `RedisBus` from configuration settings.
pub async fn create_redis_bus(settings: &RedisSettings) -> Result<RedisBus, redis::RedisError> {
    let (client, publisher) = create_redis_client(settings).await?;
    Ok(RedisBus::new(client, publisher))
}

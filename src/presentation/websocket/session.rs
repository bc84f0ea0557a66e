//! WebSocket Session State
//!
//! Per-connection deadlines and limits shared by the read and write pumps.

use std::time::Duration;

use crate::config::WebSocketSettings;
use crate::domain::DEFAULT_QUEUE_CAPACITY;

/// Deadlines and limits of one connection.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionConfig {
    /// Idle read deadline, refreshed by every inbound frame including pongs
    pub read_timeout: Duration,
    /// Ping period; must be shorter than the read deadline
    pub ping_interval: Duration,
    /// Deadline for a single socket write
    pub write_timeout: Duration,
    pub queue_capacity: usize,
    /// Protocol violations tolerated before disconnecting
    pub max_violations: u32,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(60),
            ping_interval: Duration::from_secs(54),
            write_timeout: Duration::from_secs(10),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_violations: 5,
        }
    }
}

impl From<&WebSocketSettings> for ConnectionConfig {
    fn from(settings: &WebSocketSettings) -> Self {
        Self {
            read_timeout: settings.read_timeout(),
            ping_interval: settings.ping_interval(),
            write_timeout: settings.write_timeout(),
            queue_capacity: settings.queue_capacity,
            max_violations: settings.max_violations,
        }
    }
}

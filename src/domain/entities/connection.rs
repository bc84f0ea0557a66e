//! Live connection handle.
//!
//! A connection is owned by its read/write pumps. The registry only holds a
//! `ConnectionHandle`: the sending half of the bounded outbound queue plus a
//! close signal. Dropping the handle closes the queue.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, Notify};
use uuid::Uuid;

use super::envelope::{Envelope, ProtocolError};
use super::user::Identity;

/// Default outbound queue capacity per connection.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Unique id assigned at accept time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConnectionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// An envelope encoded once per broadcast and shared by every recipient.
#[derive(Debug, Clone)]
pub struct OutboundFrame {
    pub envelope: Arc<Envelope>,
    pub text: Arc<str>,
}

impl OutboundFrame {
    pub fn encode(envelope: Arc<Envelope>) -> Result<Self, ProtocolError> {
        let text = envelope.encode_text()?;
        Ok(Self {
            envelope,
            text: text.into(),
        })
    }
}

/// Outcome of a non-blocking enqueue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Queued,
    /// Queue at capacity: the consumer is not keeping up
    Full,
    /// Receiver gone: the pumps already exited
    Closed,
}

/// Registry-side reference to a live connection.
#[derive(Debug)]
pub struct ConnectionHandle {
    pub id: ConnectionId,
    pub identity: Identity,
    pub room_id: String,
    outbound: mpsc::Sender<OutboundFrame>,
    closed: Arc<Notify>,
}

/// Pump-side ends of a connection: the queue receiver and the close signal.
#[derive(Debug)]
pub struct ConnectionQueue {
    pub frames: mpsc::Receiver<OutboundFrame>,
    pub closed: Arc<Notify>,
}

impl ConnectionHandle {
    /// Create a handle with a bounded queue of `capacity` slots.
    pub fn new(
        identity: Identity,
        room_id: impl Into<String>,
        capacity: usize,
    ) -> (Self, ConnectionQueue) {
        let (outbound, frames) = mpsc::channel(capacity.max(1));
        let closed = Arc::new(Notify::new());
        let handle = Self {
            id: ConnectionId::generate(),
            identity,
            room_id: room_id.into(),
            outbound,
            closed: closed.clone(),
        };
        (handle, ConnectionQueue { frames, closed })
    }

    pub fn try_enqueue(&self, frame: OutboundFrame) -> EnqueueOutcome {
        match self.outbound.try_send(frame) {
            Ok(()) => EnqueueOutcome::Queued,
            Err(mpsc::error::TrySendError::Full(_)) => EnqueueOutcome::Full,
            Err(mpsc::error::TrySendError::Closed(_)) => EnqueueOutcome::Closed,
        }
    }

    /// Signal the write pump to send a close frame without draining the queue.
    pub fn close(self) {
        self.closed.notify_one();
    }
}

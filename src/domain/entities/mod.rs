//! # Domain Entities
//!
//! Core values of the relay and the collaborator contracts it consumes.
//!
//! ## Entities
//!
//! - **Envelope**: the canonical chat event and its wire codec
//! - **Connection**: registry-side handle of a live socket
//! - **Identity / UserStatus**: the authenticated sender and presence
//!
//! ## Collaborator Traits
//!
//! - **ChatStore**: message and membership persistence
//! - **MessageBus**: cross-process publish/subscribe
//!
//! Implementations live in the infrastructure layer.

mod bus;
mod connection;
mod envelope;
mod store;
mod user;

pub use bus::{channel_matches, BusError, BusMessage, BusStream, MessageBus};
pub use connection::{
    ConnectionHandle, ConnectionId, ConnectionQueue, EnqueueOutcome, OutboundFrame,
    DEFAULT_QUEUE_CAPACITY,
};
pub use envelope::{
    ingress_timestamp, room_channel, validate_content, validate_room_id, ClientFrame, Envelope,
    EventKind, ProtocolError, MAX_CONTENT_LENGTH, MAX_ROOM_ID_LENGTH, ROOM_CHANNEL_PATTERN,
    ROOM_CHANNEL_PREFIX, SYSTEM_SENDER_ID, SYSTEM_SENDER_NAME,
};
pub use store::{ChatStore, StoreError};
pub use user::{Identity, UserStatus};

#[cfg(test)]
pub use store::MockChatStore;

//! Envelope entity and wire codec.
//!
//! The envelope is the one value exchanged by every ingress path (socket,
//! HTTP, RPC), the connection registry and the fan-out bridge. It is built
//! once at ingress, wrapped in an `Arc`, and never mutated afterwards.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::user::Identity;

/// Maximum content length in characters.
pub const MAX_CONTENT_LENGTH: usize = 2000;

/// Maximum length of a room identifier.
pub const MAX_ROOM_ID_LENGTH: usize = 64;

/// Sender id used for server-synthesized envelopes.
pub const SYSTEM_SENDER_ID: &str = "system";

/// Sender name used for server-synthesized envelopes.
pub const SYSTEM_SENDER_NAME: &str = "System";

/// Event kinds carried by an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// A user chat message
    #[serde(alias = "message")]
    Chat,
    /// A user announced itself in the room
    Join,
    /// A user left the room
    Leave,
    /// Typing indicator ("start" / "stop" in content)
    Typing,
    /// Server-synthesized notice
    System,
    /// Application-level liveness frame
    Heartbeat,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Join => "join",
            Self::Leave => "leave",
            Self::Typing => "typing",
            Self::System => "system",
            Self::Heartbeat => "heartbeat",
        }
    }

    /// Kinds a client is allowed to send over a socket.
    pub fn is_client_originated(&self) -> bool {
        !matches!(self, Self::System)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chat" | "message" => Ok(Self::Chat),
            "join" => Ok(Self::Join),
            "leave" => Ok(Self::Leave),
            "typing" => Ok(Self::Typing),
            "system" => Ok(Self::System),
            "heartbeat" => Ok(Self::Heartbeat),
            other => Err(ProtocolError::UnknownKind(other.to_string())),
        }
    }
}

/// Wire-level protocol errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("Malformed frame: {0}")]
    Malformed(String),

    #[error("Unknown event kind: {0}")]
    UnknownKind(String),

    #[error("Event kind not allowed from clients: {0}")]
    ForbiddenKind(EventKind),

    #[error("Content too long ({len} > {max} characters)")]
    ContentTooLong { len: usize, max: usize },

    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Frame exceeds {max} bytes")]
    FrameTooLarge { max: usize },
}

/// The canonical chat event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub kind: EventKind,
    pub room_id: String,
    pub sender_id: String,
    pub sender_name: String,
    #[serde(default)]
    pub content: String,
    pub message_id: String,
    /// Milliseconds since the Unix epoch
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl Envelope {
    /// Build an envelope at ingress, assigning its id and timestamp.
    pub fn ingress(
        kind: EventKind,
        room_id: impl Into<String>,
        sender: &Identity,
        content: impl Into<String>,
        metadata: BTreeMap<String, String>,
    ) -> Self {
        Self {
            kind,
            room_id: room_id.into(),
            sender_id: sender.user_id.clone(),
            sender_name: sender.username.clone(),
            content: content.into(),
            message_id: next_message_id(),
            created_at: ingress_timestamp(),
            metadata,
        }
    }

    /// Server-synthesized notice for a room.
    pub fn system(room_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::ingress(
            EventKind::System,
            room_id,
            &Identity::system(),
            content,
            BTreeMap::new(),
        )
    }

    pub fn is_system(&self) -> bool {
        self.sender_id == SYSTEM_SENDER_ID
    }

    /// Check the structural invariants of a decoded envelope.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        validate_room_id(&self.room_id)?;
        if self.message_id.is_empty() {
            return Err(ProtocolError::MissingField("message_id"));
        }
        if self.sender_id.is_empty() {
            return Err(ProtocolError::MissingField("sender_id"));
        }
        validate_content(&self.content)
    }

    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(self).map_err(|e| ProtocolError::Malformed(e.to_string()))
    }

    pub fn encode_text(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Malformed(e.to_string()))
    }

    /// Decode and validate an envelope received from the bus.
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let envelope: Self =
            serde_json::from_slice(bytes).map_err(|e| ProtocolError::Malformed(e.to_string()))?;
        envelope.validate()?;
        Ok(envelope)
    }
}

/// A frame sent by a socket client. Identity, id and timestamp are never
/// taken from the client; they are assigned at ingress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientFrame {
    pub kind: EventKind,
    pub content: String,
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct RawClientFrame {
    #[serde(alias = "type")]
    kind: Option<String>,
    #[serde(default)]
    content: String,
    #[serde(default)]
    metadata: BTreeMap<String, String>,
}

impl ClientFrame {
    /// Decode a text frame from a socket client.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let raw: RawClientFrame =
            serde_json::from_str(text).map_err(|e| ProtocolError::Malformed(e.to_string()))?;

        let kind: EventKind = raw
            .kind
            .as_deref()
            .ok_or(ProtocolError::MissingField("kind"))?
            .parse()?;

        if !kind.is_client_originated() {
            return Err(ProtocolError::ForbiddenKind(kind));
        }

        validate_content(&raw.content)?;

        Ok(Self {
            kind,
            content: raw.content,
            metadata: raw.metadata,
        })
    }
}

/// Bus channel for a room.
pub fn room_channel(room_id: &str) -> String {
    format!("{}{}", ROOM_CHANNEL_PREFIX, room_id)
}

/// Prefix shared by every room channel.
pub const ROOM_CHANNEL_PREFIX: &str = "room:";

/// Pattern matching every room channel.
pub const ROOM_CHANNEL_PATTERN: &str = "room:*";

pub fn validate_room_id(room_id: &str) -> Result<(), ProtocolError> {
    if room_id.is_empty() {
        return Err(ProtocolError::MissingField("room_id"));
    }
    if room_id.len() > MAX_ROOM_ID_LENGTH || room_id.contains(['*', '?', '[', ']']) {
        return Err(ProtocolError::Malformed(format!("invalid room id: {}", room_id)));
    }
    Ok(())
}

pub fn validate_content(content: &str) -> Result<(), ProtocolError> {
    let len = content.chars().count();
    if len > MAX_CONTENT_LENGTH {
        return Err(ProtocolError::ContentTooLong {
            len,
            max: MAX_CONTENT_LENGTH,
        });
    }
    Ok(())
}

fn next_message_id() -> String {
    Uuid::now_v7().to_string()
}

static LAST_TIMESTAMP: AtomicI64 = AtomicI64::new(0);

/// Wall-clock milliseconds, clamped so they never go backwards in-process.
pub fn ingress_timestamp() -> i64 {
    let now = Utc::now().timestamp_millis();
    let previous = LAST_TIMESTAMP.fetch_max(now, Ordering::AcqRel);
    previous.max(now)
}

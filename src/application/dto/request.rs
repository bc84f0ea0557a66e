//! Request DTOs
//!
//! Data structures for API request bodies.

use std::collections::BTreeMap;

use serde::Deserialize;
use validator::Validate;

/// Send message request (`POST /api/rooms/{room_id}/messages`)
#[derive(Debug, Deserialize, Validate)]
pub struct SendMessageRequest {
    #[validate(length(min = 1, max = 2000, message = "Content must be 1-2000 characters"))]
    pub content: String,

    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// `SendMessage` RPC request. The caller's identity comes from its token,
/// never from the body.
#[derive(Debug, Deserialize, Validate)]
pub struct RpcSendMessageRequest {
    #[validate(length(min = 1, max = 64, message = "Room id must be 1-64 characters"))]
    pub room_id: String,

    #[validate(length(min = 1, max = 2000, message = "Content must be 1-2000 characters"))]
    pub content: String,

    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// `JoinRoom`, `LeaveRoom` and `GetOnlineUsers` RPC request. The caller's
/// identity comes from its token.
#[derive(Debug, Deserialize, Validate)]
pub struct RoomRequest {
    #[validate(length(min = 1, max = 64, message = "Room id must be 1-64 characters"))]
    pub room_id: String,
}

/// `StreamMessages` RPC query string
#[derive(Debug, Deserialize, Validate)]
pub struct StreamMessagesQuery {
    #[validate(length(min = 1, max = 64, message = "Room id must be 1-64 characters"))]
    pub room_id: String,
}

//! Response DTOs
//!
//! Data structures for API response bodies.

use serde::Serialize;

use crate::application::services::Delivery;
use crate::domain::Identity;

/// Result of `SendMessage` over HTTP or RPC
#[derive(Debug, Serialize)]
pub struct SendMessageResponse {
    pub message_id: String,
    pub persisted: bool,
    pub delivered: usize,
}

impl From<Delivery> for SendMessageResponse {
    fn from(delivery: Delivery) -> Self {
        Self {
            message_id: delivery.message_id,
            persisted: delivery.persisted,
            delivered: delivery.delivered,
        }
    }
}

/// Result of `JoinRoom` / `LeaveRoom`
#[derive(Debug, Serialize)]
pub struct RoomResponse {
    pub success: bool,
    /// Id of the announced join/leave envelope
    pub message_id: String,
    pub delivered: usize,
}

impl From<Delivery> for RoomResponse {
    fn from(delivery: Delivery) -> Self {
        Self {
            success: true,
            message_id: delivery.message_id,
            delivered: delivery.delivered,
        }
    }
}

/// A user with a live socket in a room
#[derive(Debug, Serialize)]
pub struct OnlineUserResponse {
    pub user_id: String,
    pub username: String,
}

impl From<Identity> for OnlineUserResponse {
    fn from(identity: Identity) -> Self {
        Self {
            user_id: identity.user_id,
            username: identity.username,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RoomUsersResponse {
    pub room_id: String,
    pub users: Vec<OnlineUserResponse>,
}

//! Storage collaborator contract.
//!
//! The relay calls these synchronously on the `chat`/`join`/`leave` paths
//! and treats every failure as "log and keep delivering". Durable storage
//! itself lives behind this trait.

use async_trait::async_trait;

use super::envelope::Envelope;
use super::user::UserStatus;

/// Storage collaborator errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Persist a chat envelope.
    async fn insert_message(&self, envelope: &Envelope) -> Result<(), StoreError>;

    /// Record that `user_id` joined (`joined = true`) or left a room.
    async fn upsert_room_membership(
        &self,
        room_id: &str,
        user_id: &str,
        joined: bool,
    ) -> Result<(), StoreError>;

    /// Update a user's presence status.
    async fn set_user_status(&self, user_id: &str, status: UserStatus) -> Result<(), StoreError>;

    /// Connectivity check for readiness probes.
    async fn ping(&self) -> Result<(), StoreError>;
}

//! In-memory chat store for single-node runs and tests.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::domain::{ChatStore, Envelope, StoreError, UserStatus};

#[derive(Debug, Default)]
pub struct MemoryChatStore {
    messages: RwLock<Vec<Envelope>>,
    members: RwLock<BTreeSet<(String, String)>>,
    statuses: RwLock<HashMap<String, UserStatus>>,
}

impl MemoryChatStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Persisted messages of a room, oldest first.
    pub fn messages(&self, room_id: &str) -> Vec<Envelope> {
        self.messages
            .read()
            .iter()
            .filter(|m| m.room_id == room_id)
            .cloned()
            .collect()
    }

    pub fn is_member(&self, room_id: &str, user_id: &str) -> bool {
        self.members
            .read()
            .contains(&(room_id.to_string(), user_id.to_string()))
    }

    pub fn status(&self, user_id: &str) -> UserStatus {
        self.statuses
            .read()
            .get(user_id)
            .copied()
            .unwrap_or_default()
    }
}

#[async_trait]
impl ChatStore for MemoryChatStore {
    async fn insert_message(&self, envelope: &Envelope) -> Result<(), StoreError> {
        let mut messages = self.messages.write();
        if !messages.iter().any(|m| m.message_id == envelope.message_id) {
            messages.push(envelope.clone());
        }
        Ok(())
    }

    async fn upsert_room_membership(
        &self,
        room_id: &str,
        user_id: &str,
        joined: bool,
    ) -> Result<(), StoreError> {
        let key = (room_id.to_string(), user_id.to_string());
        let mut members = self.members.write();
        if joined {
            members.insert(key);
        } else {
            members.remove(&key);
        }
        Ok(())
    }

    async fn set_user_status(&self, user_id: &str, status: UserStatus) -> Result<(), StoreError> {
        self.statuses.write().insert(user_id.to_string(), status);
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

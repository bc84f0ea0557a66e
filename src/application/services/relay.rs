//! Chat Relay Service
//!
//! The single ingress path shared by the socket, HTTP and RPC front doors.
//! Every event is built into an envelope once, persisted where its kind
//! requires it, then handed to the local registry and the bridge together.
//!
//! Storage and bus failures never stop local delivery; they are logged,
//! counted and reported back in [`Delivery`].

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, instrument, warn};

use super::bridge::FanoutBridge;
use super::hub::{Hub, HubError};
use crate::domain::{
    validate_content, validate_room_id, ChatStore, ClientFrame, Envelope, EventKind, Identity,
    ProtocolError, UserStatus,
};
use crate::infrastructure::metrics;

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error(transparent)]
    Hub(#[from] HubError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// What happened to one relayed envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Delivery {
    pub message_id: String,
    /// Whether the storage write succeeded (always false for kinds that are not stored)
    pub persisted: bool,
    /// Local connections whose queue accepted the envelope
    pub delivered: usize,
    /// Whether the bus accepted the envelope for peer processes
    pub published: bool,
}

/// Result of dispatching one client frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatched {
    Delivered(Delivery),
    /// Liveness only, nothing relayed
    Heartbeat,
    /// The sender left; the connection should end
    Left(Delivery),
}

impl Dispatched {
    pub fn ends_connection(&self) -> bool {
        matches!(self, Self::Left(_))
    }
}

#[derive(Clone)]
pub struct ChatRelay {
    hub: Hub,
    bridge: FanoutBridge,
    store: Arc<dyn ChatStore>,
}

impl ChatRelay {
    pub fn new(hub: Hub, bridge: FanoutBridge, store: Arc<dyn ChatStore>) -> Self {
        Self { hub, bridge, store }
    }

    pub fn hub(&self) -> &Hub {
        &self.hub
    }

    pub fn bridge(&self) -> &FanoutBridge {
        &self.bridge
    }

    pub fn store(&self) -> &Arc<dyn ChatStore> {
        &self.store
    }

    /// Relay a chat message: persist (best effort), then deliver.
    #[instrument(skip(self, content, metadata), fields(user_id = %sender.user_id))]
    pub async fn send_chat(
        &self,
        sender: &Identity,
        room_id: &str,
        content: String,
        metadata: BTreeMap<String, String>,
    ) -> Result<Delivery, RelayError> {
        validate_room_id(room_id)?;
        validate_content(&content)?;

        let envelope = Envelope::ingress(EventKind::Chat, room_id, sender, content, metadata);

        let persisted = match self.store.insert_message(&envelope).await {
            Ok(()) => true,
            Err(e) => {
                metrics::record_persistence_failure("insert_message");
                warn!(message_id = %envelope.message_id, error = %e, "Failed to persist message, delivering anyway");
                false
            }
        };

        self.deliver(envelope, persisted).await
    }

    /// Record the membership, mark the user online and announce the join.
    /// `persisted` reflects the membership write; a failed status update is
    /// only logged.
    #[instrument(skip(self), fields(user_id = %sender.user_id))]
    pub async fn join(&self, sender: &Identity, room_id: &str) -> Result<Delivery, RelayError> {
        validate_room_id(room_id)?;

        let persisted = match self
            .store
            .upsert_room_membership(room_id, &sender.user_id, true)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                metrics::record_persistence_failure("upsert_room_membership");
                warn!(error = %e, "Failed to record room membership");
                false
            }
        };
        if let Err(e) = self
            .store
            .set_user_status(&sender.user_id, UserStatus::Online)
            .await
        {
            metrics::record_persistence_failure("set_user_status");
            warn!(error = %e, "Failed to update user status");
        }

        let content = format!("{} joined the room", sender.username);
        let envelope = Envelope::ingress(EventKind::Join, room_id, sender, content, BTreeMap::new());
        self.deliver(envelope, persisted).await
    }

    /// Drop the membership and announce the leave.
    #[instrument(skip(self), fields(user_id = %sender.user_id))]
    pub async fn leave(&self, sender: &Identity, room_id: &str) -> Result<Delivery, RelayError> {
        validate_room_id(room_id)?;

        let persisted = match self
            .store
            .upsert_room_membership(room_id, &sender.user_id, false)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                metrics::record_persistence_failure("upsert_room_membership");
                warn!(error = %e, "Failed to remove room membership");
                false
            }
        };

        let content = format!("{} left the room", sender.username);
        let envelope =
            Envelope::ingress(EventKind::Leave, room_id, sender, content, BTreeMap::new());
        self.deliver(envelope, persisted).await
    }

    /// Typing indicators are delivered but never stored.
    pub async fn typing(
        &self,
        sender: &Identity,
        room_id: &str,
        content: String,
    ) -> Result<Delivery, RelayError> {
        validate_room_id(room_id)?;
        validate_content(&content)?;

        let envelope =
            Envelope::ingress(EventKind::Typing, room_id, sender, content, BTreeMap::new());
        self.deliver(envelope, false).await
    }

    /// Route a decoded socket frame to the matching operation.
    pub async fn dispatch(
        &self,
        sender: &Identity,
        room_id: &str,
        frame: ClientFrame,
    ) -> Result<Dispatched, RelayError> {
        match frame.kind {
            EventKind::Chat => self
                .send_chat(sender, room_id, frame.content, frame.metadata)
                .await
                .map(Dispatched::Delivered),
            EventKind::Join => self.join(sender, room_id).await.map(Dispatched::Delivered),
            EventKind::Leave => self.leave(sender, room_id).await.map(Dispatched::Left),
            EventKind::Typing => self
                .typing(sender, room_id, frame.content)
                .await
                .map(Dispatched::Delivered),
            EventKind::Heartbeat => Ok(Dispatched::Heartbeat),
            EventKind::System => Err(ProtocolError::ForbiddenKind(EventKind::System).into()),
        }
    }

    /// Deliver to local room members and publish for peer processes.
    /// A bus failure only costs cross-process delivery.
    pub async fn deliver(&self, envelope: Envelope, persisted: bool) -> Result<Delivery, RelayError> {
        let envelope = Arc::new(envelope);
        let (local, remote) = tokio::join!(
            self.hub.broadcast(&envelope.room_id, envelope.clone()),
            self.bridge.publish(&envelope),
        );

        let delivered = local?;
        let published = remote.is_ok();

        debug!(
            room_id = %envelope.room_id,
            message_id = %envelope.message_id,
            kind = %envelope.kind,
            delivered,
            published,
            "Envelope relayed"
        );

        Ok(Delivery {
            message_id: envelope.message_id.clone(),
            persisted,
            delivered,
            published,
        })
    }
}

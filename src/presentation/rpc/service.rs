//! Chat RPC service.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use tracing::{debug, instrument};
use validator::Validate;

use super::RpcError;
use crate::application::dto::{
    OnlineUserResponse, RoomRequest, RoomResponse, RoomUsersResponse, RpcSendMessageRequest,
    SendMessageResponse,
};
use crate::application::services::ChatRelay;
use crate::domain::{validate_room_id, Envelope, Identity};
use crate::infrastructure::metrics;
use crate::shared::validation::validation_error;

/// First envelope of every message stream.
pub const STREAM_GREETING: &str = "Connected to message stream";

/// Envelopes of one `StreamMessages` call.
pub type EnvelopeStream = BoxStream<'static, Arc<Envelope>>;

#[async_trait]
pub trait ChatService: Send + Sync {
    /// Relay a message: ingress id and timestamp, best-effort persistence,
    /// local delivery and bus publish.
    async fn send_message(
        &self,
        sender: &Identity,
        request: RpcSendMessageRequest,
    ) -> Result<SendMessageResponse, RpcError>;

    /// Stream every envelope published to a room until the caller goes away.
    async fn stream_messages(&self, room_id: &str) -> Result<EnvelopeStream, RpcError>;

    /// Record the caller's membership, mark it online and announce the join.
    async fn join_room(
        &self,
        sender: &Identity,
        request: RoomRequest,
    ) -> Result<RoomResponse, RpcError>;

    /// Drop the caller's membership and announce the leave.
    async fn leave_room(
        &self,
        sender: &Identity,
        request: RoomRequest,
    ) -> Result<RoomResponse, RpcError>;

    /// Users with a live socket in the room on this process.
    async fn get_online_users(&self, request: RoomRequest) -> Result<RoomUsersResponse, RpcError>;
}

pub struct ChatServiceImpl {
    relay: ChatRelay,
}

impl ChatServiceImpl {
    pub fn new(relay: ChatRelay) -> Self {
        Self { relay }
    }
}

#[async_trait]
impl ChatService for ChatServiceImpl {
    #[instrument(skip(self, request), fields(user_id = %sender.user_id, room_id = %request.room_id))]
    async fn send_message(
        &self,
        sender: &Identity,
        request: RpcSendMessageRequest,
    ) -> Result<SendMessageResponse, RpcError> {
        request.validate().map_err(|e| RpcError::InvalidArgument(validation_error(e).to_string()))?;

        let delivery = self
            .relay
            .send_chat(sender, &request.room_id, request.content, request.metadata)
            .await?;

        Ok(delivery.into())
    }

    async fn stream_messages(&self, room_id: &str) -> Result<EnvelopeStream, RpcError> {
        validate_room_id(room_id)?;

        let subscription = self.relay.bridge().subscribe_room(room_id).await?;
        let gauge = StreamGauge::open(room_id);
        let greeting = Arc::new(Envelope::system(room_id, STREAM_GREETING));

        let stream = stream::once(async move { greeting })
            .chain(subscription.map(Arc::new))
            .map(move |envelope| {
                let _open = &gauge;
                envelope
            });

        Ok(stream.boxed())
    }

    #[instrument(skip(self, request), fields(user_id = %sender.user_id, room_id = %request.room_id))]
    async fn join_room(
        &self,
        sender: &Identity,
        request: RoomRequest,
    ) -> Result<RoomResponse, RpcError> {
        request.validate().map_err(|e| RpcError::InvalidArgument(validation_error(e).to_string()))?;

        let delivery = self.relay.join(sender, &request.room_id).await?;
        if !delivery.persisted {
            return Err(RpcError::Internal("Failed to join room".into()));
        }
        Ok(delivery.into())
    }

    #[instrument(skip(self, request), fields(user_id = %sender.user_id, room_id = %request.room_id))]
    async fn leave_room(
        &self,
        sender: &Identity,
        request: RoomRequest,
    ) -> Result<RoomResponse, RpcError> {
        request.validate().map_err(|e| RpcError::InvalidArgument(validation_error(e).to_string()))?;

        let delivery = self.relay.leave(sender, &request.room_id).await?;
        if !delivery.persisted {
            return Err(RpcError::Internal("Failed to leave room".into()));
        }
        Ok(delivery.into())
    }

    async fn get_online_users(&self, request: RoomRequest) -> Result<RoomUsersResponse, RpcError> {
        validate_room_id(&request.room_id)?;

        let users = self.relay.hub().room_users(&request.room_id).await?;
        Ok(RoomUsersResponse {
            room_id: request.room_id,
            users: users.into_iter().map(OnlineUserResponse::from).collect(),
        })
    }
}

/// Keeps the active stream gauge in step with the stream's lifetime.
struct StreamGauge {
    room_id: String,
}

impl StreamGauge {
    fn open(room_id: &str) -> Self {
        metrics::rpc_stream_opened();
        debug!(room_id = %room_id, "Message stream opened");
        Self {
            room_id: room_id.to_string(),
        }
    }
}

impl Drop for StreamGauge {
    fn drop(&mut self) {
        metrics::rpc_stream_closed();
        debug!(room_id = %self.room_id, "Message stream closed");
    }
}

//! RPC Handlers

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::{Extension, Query, State},
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::{Stream, StreamExt};

use super::{ChatService, ChatServiceImpl, RpcError};
use crate::application::dto::{
    RoomRequest, RoomResponse, RoomUsersResponse, RpcSendMessageRequest, SendMessageResponse,
    StreamMessagesQuery,
};
use crate::presentation::middleware::AuthUser;
use crate::startup::{shutdown_requested, AppState};

/// `SendMessage`
pub async fn send_message(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<RpcSendMessageRequest>,
) -> Result<Json<SendMessageResponse>, RpcError> {
    let service = ChatServiceImpl::new(state.relay.clone());
    let response = service.send_message(&auth.identity(), body).await?;
    Ok(Json(response))
}

/// `JoinRoom`
pub async fn join_room(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<RoomRequest>,
) -> Result<Json<RoomResponse>, RpcError> {
    let service = ChatServiceImpl::new(state.relay.clone());
    let response = service.join_room(&auth.identity(), body).await?;
    Ok(Json(response))
}

/// `LeaveRoom`
pub async fn leave_room(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<RoomRequest>,
) -> Result<Json<RoomResponse>, RpcError> {
    let service = ChatServiceImpl::new(state.relay.clone());
    let response = service.leave_room(&auth.identity(), body).await?;
    Ok(Json(response))
}

/// `GetOnlineUsers`
pub async fn get_online_users(
    State(state): State<AppState>,
    Json(body): Json<RoomRequest>,
) -> Result<Json<RoomUsersResponse>, RpcError> {
    let service = ChatServiceImpl::new(state.relay.clone());
    let response = service.get_online_users(body).await?;
    Ok(Json(response))
}

/// `StreamMessages`
///
/// The bus subscription lives exactly as long as the HTTP response body,
/// which ends early when the server shuts down.
pub async fn stream_messages(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<StreamMessagesQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, RpcError> {
    let service = ChatServiceImpl::new(state.relay.clone());
    let envelopes = service.stream_messages(&query.room_id).await?;

    tracing::info!(
        user_id = %auth.user_id,
        room_id = %query.room_id,
        "Message stream started"
    );

    let events = envelopes
        .take_until(shutdown_requested(state.shutdown.clone()))
        .filter_map(|envelope| async move {
            match Event::default()
                .event(envelope.kind.as_str())
                .id(envelope.message_id.clone())
                .json_data(&*envelope)
            {
                Ok(event) => Some(Ok(event)),
                Err(e) => {
                    tracing::warn!(message_id = %envelope.message_id, error = %e, "Failed to encode stream event");
                    None
                }
            }
        });

    Ok(Sse::new(events).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}

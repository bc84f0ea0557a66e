//! WebSocket Connection Handler
//!
//! Authenticates the upgrade, then runs one connection: a welcome notice,
//! registration with the hub, and the read/write pump pair.

use std::fmt::Display;
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{Sink, SinkExt, Stream, StreamExt};
use serde::Deserialize;
use tokio::task::JoinError;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::pumps::{read_pump, write_pump, DisconnectReason, ReadContext, TransportError};
use super::session::ConnectionConfig;
use crate::application::services::ChatRelay;
use crate::domain::{
    validate_room_id, ConnectionHandle, EnqueueOutcome, Envelope, Identity, OutboundFrame,
};
use crate::presentation::middleware::{verify_token, AuthUser};
use crate::shared::error::AppError;
use crate::startup::AppState;

/// Query parameters of the upgrade request.
#[derive(Debug, Deserialize)]
pub struct ConnectParams {
    pub token: String,
    pub room_id: String,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    let claims = verify_token(&params.token, &state.settings.jwt.secret)?;
    validate_room_id(&params.room_id)?;

    let identity = AuthUser::from(claims).identity();
    let settings = &state.settings.websocket;
    let config = ConnectionConfig::from(settings);
    let relay = state.relay.clone();
    let room_id = params.room_id;

    Ok(ws
        .max_message_size(settings.max_message_size)
        .max_frame_size(settings.max_frame_size)
        .on_upgrade(move |socket| run_connection(socket, relay, identity, room_id, config)))
}

async fn run_connection(
    socket: WebSocket,
    relay: ChatRelay,
    identity: Identity,
    room_id: String,
    config: ConnectionConfig,
) {
    let (sink, stream) = socket.split();
    serve_connection(stream, sink, relay, identity, room_id, config).await;
}

/// Run one connection to completion over any socket halves.
///
/// The registration is released exactly once, whichever pump finishes
/// first, and also if either pump panics.
pub async fn serve_connection<St, Si, E>(
    stream: St,
    mut sink: Si,
    relay: ChatRelay,
    identity: Identity,
    room_id: String,
    config: ConnectionConfig,
) -> DisconnectReason
where
    St: Stream<Item = Result<Message, E>> + Unpin + Send + 'static,
    E: Display + Send + 'static,
    Si: Sink<Message> + Unpin + Send + 'static,
    Si::Error: Display + Send,
{
    let (handle, queue) = ConnectionHandle::new(identity.clone(), room_id.clone(), config.queue_capacity);
    let connection_id = handle.id.clone();

    // Queued before registration so it precedes any room traffic.
    let welcome = Envelope::system(
        room_id.clone(),
        format!("Welcome {} to room {}", identity.username, room_id),
    );
    match OutboundFrame::encode(Arc::new(welcome)) {
        Ok(frame) => {
            let outcome = handle.try_enqueue(frame);
            if outcome != EnqueueOutcome::Queued {
                debug!(room_id = %room_id, outcome = ?outcome, "Welcome envelope not queued");
            }
        }
        Err(e) => warn!(error = %e, "Failed to encode welcome envelope"),
    }

    let registration = match relay.hub().register(handle).await {
        Ok(registration) => registration,
        Err(e) => {
            warn!(room_id = %room_id, error = %e, "Rejected connection");
            let _ = sink.send(Message::Close(None)).await;
            return DisconnectReason::RegistryClosed;
        }
    };

    info!(
        connection_id = %connection_id,
        room_id = %room_id,
        user_id = %identity.user_id,
        "Client connected"
    );

    let mut writer = tokio::spawn(write_pump(sink, queue, config));
    let mut reader = tokio::spawn(read_pump(
        stream,
        ReadContext {
            relay,
            identity: identity.clone(),
            room_id: room_id.clone(),
            config,
        },
    ));

    let reason = tokio::select! {
        read = &mut reader => {
            if let Err(e) = registration.release().await {
                debug!(connection_id = %connection_id, error = %e, "Unregister after read loop exit");
            }
            // Unregistering closed the queue; give the writer one deadline to send the close frame.
            if timeout(config.write_timeout, &mut writer).await.is_err() {
                writer.abort();
            }
            joined(read)
        }
        write = &mut writer => {
            reader.abort();
            drop(registration);
            joined(write)
        }
    };

    if reason.is_error() {
        warn!(connection_id = %connection_id, room_id = %room_id, reason = ?reason, "Client disconnected");
    } else {
        info!(connection_id = %connection_id, room_id = %room_id, reason = ?reason, "Client disconnected");
    }
    reason
}

fn joined(result: Result<DisconnectReason, JoinError>) -> DisconnectReason {
    result.unwrap_or_else(|e| DisconnectReason::Transport(TransportError::Task(e.to_string())))
}

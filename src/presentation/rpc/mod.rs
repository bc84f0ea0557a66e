//! RPC Gateway
//!
//! The `chat.v1.ChatService` surface, served on its own listener:
//!
//! - `POST /chat.v1.ChatService/SendMessage` - unary send, JSON in and out
//! - `GET /chat.v1.ChatService/StreamMessages?room_id=` - server stream of
//!   room envelopes as Server-Sent Events
//! - `POST /chat.v1.ChatService/JoinRoom`, `/LeaveRoom` - membership plus a
//!   join/leave announcement
//! - `POST /chat.v1.ChatService/GetOnlineUsers` - live sockets in a room on
//!   this process
//!
//! Both calls require a bearer token. Streams read the bus directly and do
//! not touch the connection registry.

mod handlers;
mod service;

use axum::{
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::application::services::{HubError, RelayError};
use crate::domain::{BusError, ProtocolError};
use crate::presentation::middleware::auth_middleware;
use crate::startup::AppState;

pub use service::{ChatService, ChatServiceImpl, EnvelopeStream, STREAM_GREETING};

/// RPC call failures, carrying gRPC status codes.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("{0}")]
    InvalidArgument(String),

    #[error("{0}")]
    Unavailable(String),

    #[error("{0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
struct RpcStatus {
    code: u16,
    message: String,
}

impl RpcError {
    /// gRPC status code
    pub fn code(&self) -> u16 {
        match self {
            RpcError::InvalidArgument(_) => 3,
            RpcError::Internal(_) => 13,
            RpcError::Unavailable(_) => 14,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            RpcError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            RpcError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            RpcError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RpcError {
    fn into_response(self) -> Response {
        if let RpcError::Internal(msg) = &self {
            tracing::error!("RPC internal error: {}", msg);
        }
        let body = RpcStatus {
            code: self.code(),
            message: self.to_string(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}

impl From<ProtocolError> for RpcError {
    fn from(e: ProtocolError) -> Self {
        RpcError::InvalidArgument(e.to_string())
    }
}

impl From<HubError> for RpcError {
    fn from(e: HubError) -> Self {
        match e {
            HubError::RegistryClosed => RpcError::Unavailable(e.to_string()),
            e => RpcError::Internal(e.to_string()),
        }
    }
}

impl From<RelayError> for RpcError {
    fn from(e: RelayError) -> Self {
        match e {
            RelayError::Protocol(e) => e.into(),
            RelayError::Hub(e) => e.into(),
        }
    }
}

impl From<BusError> for RpcError {
    fn from(e: BusError) -> Self {
        RpcError::Unavailable(e.to_string())
    }
}

/// RPC routes (protected)
pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/chat.v1.ChatService/SendMessage",
            post(handlers::send_message),
        )
        .route(
            "/chat.v1.ChatService/StreamMessages",
            get(handlers::stream_messages),
        )
        .route("/chat.v1.ChatService/JoinRoom", post(handlers::join_room))
        .route("/chat.v1.ChatService/LeaveRoom", post(handlers::leave_room))
        .route(
            "/chat.v1.ChatService/GetOnlineUsers",
            post(handlers::get_online_users),
        )
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

//! Message Handlers

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::application::dto::{SendMessageRequest, SendMessageResponse};
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::shared::validation::validation_error;
use crate::startup::AppState;

/// Send a chat message to a room
///
/// The message is persisted (best effort), delivered to this process's
/// sockets in the room and published for peer processes.
pub async fn send_message(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(room_id): Path<String>,
    Json(body): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<SendMessageResponse>), AppError> {
    body.validate().map_err(validation_error)?;

    let delivery = state
        .relay
        .send_chat(&auth.identity(), &room_id, body.content, body.metadata)
        .await?;

    Ok((StatusCode::CREATED, Json(delivery.into())))
}

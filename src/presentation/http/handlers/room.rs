//! Room Handlers

use axum::{
    extract::{Path, State},
    Json,
};

use crate::application::dto::{OnlineUserResponse, RoomUsersResponse};
use crate::domain::validate_room_id;
use crate::shared::error::AppError;
use crate::startup::AppState;

/// Users with a live socket in the room on this process
pub async fn get_room_users(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Json<RoomUsersResponse>, AppError> {
    validate_room_id(&room_id)?;

    let users = state.relay.hub().room_users(&room_id).await?;

    Ok(Json(RoomUsersResponse {
        room_id,
        users: users.into_iter().map(OnlineUserResponse::from).collect(),
    }))
}

//! Participant Link Handlers
//!
//! The caller's user-conversation links: mute/block flags and the
//! last-seen message pointer.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::application::dto::request::{LastMessageRequest, UpdateLinkRequest};
use crate::application::dto::response::UserConversationResponse;
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::startup::AppState;

pub async fn list_links(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<UserConversationResponse>>, AppError> {
    let links = state.links.list_for_user(auth.user_id).await?;
    Ok(Json(links.into_iter().map(Into::into).collect()))
}

pub async fn get_link(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(link_id): Path<i64>,
) -> Result<Json<UserConversationResponse>, AppError> {
    Ok(Json(state.links.get(link_id, auth.user_id).await?.into()))
}

pub async fn update_link(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(link_id): Path<i64>,
    Json(body): Json<UpdateLinkRequest>,
) -> Result<Json<UserConversationResponse>, AppError> {
    let link = state
        .links
        .update(link_id, auth.user_id, body.into())
        .await?;
    Ok(Json(link.into()))
}

/// Move the caller's last-seen pointer for a conversation
pub async fn update_last_message(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<LastMessageRequest>,
) -> Result<Json<UserConversationResponse>, AppError> {
    let link = state
        .links
        .update_last_message(auth.user_id, body.conversation_id, body.last_message_id)
        .await?;
    Ok(Json(link.into()))
}

pub async fn delete_link(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(link_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    state.links.delete(link_id, auth.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

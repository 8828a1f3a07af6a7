//! Message Handlers
//!
//! Message history and CRUD. Messages sent here are stored only; real-time
//! delivery goes through the WebSocket gateway.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::application::dto::request::{PageParams, SendMessageRequest, UpdateMessageRequest};
use crate::application::dto::response::MessageResponse;
use crate::application::services::Page;
use crate::presentation::http::extractors::ValidatedJson;
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::startup::AppState;

/// Conversation history, newest first
pub async fn get_messages(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(conversation_id): Path<i64>,
    Query(params): Query<PageParams>,
) -> Result<Json<Page<MessageResponse>>, AppError> {
    let page = state
        .messages
        .get_messages(conversation_id, auth.user_id, params.page, params.page_size)
        .await?;

    Ok(Json(page.map(MessageResponse::from)))
}

/// Store a message in a conversation
pub async fn send_message(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(conversation_id): Path<i64>,
    ValidatedJson(body): ValidatedJson<SendMessageRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), AppError> {
    let message = state
        .messages
        .send_message(conversation_id, auth.user_id, &body.message)
        .await?;

    Ok((StatusCode::CREATED, Json(message.into())))
}

pub async fn get_message(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(message_id): Path<i64>,
) -> Result<Json<MessageResponse>, AppError> {
    let message = state.messages.get_message(message_id, auth.user_id).await?;
    Ok(Json(message.into()))
}

pub async fn update_message(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(message_id): Path<i64>,
    ValidatedJson(body): ValidatedJson<UpdateMessageRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let message = state
        .messages
        .update_message(message_id, auth.user_id, body.into())
        .await?;

    Ok(Json(message.into()))
}

pub async fn delete_message(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(message_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    state
        .messages
        .delete_message(message_id, auth.user_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

//! Conversation Handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::application::dto::request::{
    CreateConversationRequest, PageParams, UpdateConversationRequest,
};
use crate::application::dto::response::ConversationResponse;
use crate::application::services::Page;
use crate::domain::query::{DEFAULT_PAGE, DEFAULT_PAGE_SIZE};
use crate::presentation::http::extractors::ValidatedJson;
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::startup::AppState;

/// Create a conversation; the caller is always a participant
pub async fn create_conversation(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidatedJson(body): ValidatedJson<CreateConversationRequest>,
) -> Result<(StatusCode, Json<ConversationResponse>), AppError> {
    let conversation = state
        .conversations
        .create_conversation(auth.user_id, body.into())
        .await?;

    Ok((StatusCode::CREATED, Json(conversation.into())))
}

/// The caller's conversations, most recently updated first
pub async fn list_conversations(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<PageParams>,
) -> Result<Json<Page<ConversationResponse>>, AppError> {
    let page = state
        .conversations
        .list_conversations(
            auth.user_id,
            params.page.unwrap_or(DEFAULT_PAGE),
            params.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
        )
        .await?;

    Ok(Json(page.map(ConversationResponse::from)))
}

/// Get a conversation with its participants
pub async fn get_conversation(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(conversation_id): Path<i64>,
) -> Result<Json<ConversationResponse>, AppError> {
    let conversation = state
        .conversations
        .get_conversation(conversation_id, auth.user_id)
        .await?;

    Ok(Json(conversation.into()))
}

/// Participant ids of a conversation
pub async fn get_participants(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(conversation_id): Path<i64>,
) -> Result<Json<Vec<i64>>, AppError> {
    // Visibility check
    state
        .conversations
        .get_conversation(conversation_id, auth.user_id)
        .await?;

    Ok(Json(
        state.conversations.participant_ids(conversation_id).await?,
    ))
}

pub async fn update_conversation(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(conversation_id): Path<i64>,
    ValidatedJson(body): ValidatedJson<UpdateConversationRequest>,
) -> Result<Json<ConversationResponse>, AppError> {
    let conversation = state
        .conversations
        .update_conversation(conversation_id, auth.user_id, body.into())
        .await?;

    Ok(Json(conversation.into()))
}

pub async fn delete_conversation(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(conversation_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    state
        .conversations
        .delete_conversation(conversation_id, auth.user_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

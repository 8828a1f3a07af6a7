//! Query Handlers
//!
//! `POST /{resource}/query` endpoints accepting the query DSL as the body.

use axum::{extract::State, Json};

use crate::application::dto::response::{ConversationResponse, MessageResponse, UserResponse};
use crate::application::services::Page;
use crate::domain::query::QueryRequest;
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::startup::AppState;

pub async fn query_users(
    State(state): State<AppState>,
    _auth: AuthUser,
    Json(request): Json<QueryRequest>,
) -> Result<Json<Page<UserResponse>>, AppError> {
    let page = state.users.list_users(&request).await?;
    Ok(Json(page.map(UserResponse::from)))
}

pub async fn query_conversations(
    State(state): State<AppState>,
    _auth: AuthUser,
    Json(request): Json<QueryRequest>,
) -> Result<Json<Page<ConversationResponse>>, AppError> {
    let page = state.conversations.query_conversations(&request).await?;
    Ok(Json(page.map(ConversationResponse::from)))
}

pub async fn query_messages(
    State(state): State<AppState>,
    _auth: AuthUser,
    Json(request): Json<QueryRequest>,
) -> Result<Json<Page<MessageResponse>>, AppError> {
    let page = state.messages.query_messages(&request).await?;
    Ok(Json(page.map(MessageResponse::from)))
}

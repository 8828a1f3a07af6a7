//! User Handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::application::dto::request::{ChangePasswordRequest, PageParams, UpdateUserRequest};
use crate::application::dto::response::UserResponse;
use crate::application::services::Page;
use crate::domain::query::QueryRequest;
use crate::presentation::http::extractors::ValidatedJson;
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::startup::AppState;

/// Get current authenticated user
pub async fn get_current_user(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<UserResponse>, AppError> {
    let user = state.users.get_user(auth.user_id).await?;
    Ok(Json(user.into()))
}

/// Current user with their conversations
pub async fn get_current_user_conversations(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<UserResponse>, AppError> {
    let user = state.users.get_user_with_conversations(auth.user_id).await?;
    Ok(Json(user.into()))
}

/// Update current user
pub async fn update_current_user(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidatedJson(body): ValidatedJson<UpdateUserRequest>,
) -> Result<Json<UserResponse>, AppError> {
    let user = state.users.update_user(auth.user_id, body.into()).await?;
    Ok(Json(user.into()))
}

/// Change the current user's password
pub async fn change_password(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidatedJson(body): ValidatedJson<ChangePasswordRequest>,
) -> Result<StatusCode, AppError> {
    state
        .users
        .change_password(auth.user_id, &body.old_password, &body.new_password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Delete the current user
pub async fn delete_current_user(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<StatusCode, AppError> {
    state.users.delete_user(auth.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// List users
pub async fn list_users(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> Result<Json<Page<UserResponse>>, AppError> {
    let request = QueryRequest {
        page: params.page,
        page_size: params.page_size,
        ..QueryRequest::new()
    }
    .sort(["name"]);

    let page = state.users.list_users(&request).await?;
    Ok(Json(page.map(UserResponse::from)))
}

/// Get a user by id
pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<UserResponse>, AppError> {
    let user = state.users.get_user(user_id).await?;
    Ok(Json(user.into()))
}

//! Presence Handlers
//!
//! CRUD over the caller's presence rows. Gateway connections manage their
//! own rows; these endpoints cover other kinds and inspection.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::application::dto::request::{CreatePresenceRequest, UpdatePresenceRequest};
use crate::domain::Presence;
use crate::presentation::http::extractors::ValidatedJson;
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::startup::AppState;

pub async fn list_presences(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<Presence>>, AppError> {
    Ok(Json(state.presence.list(auth.user_id).await?))
}

pub async fn create_presence(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidatedJson(body): ValidatedJson<CreatePresenceRequest>,
) -> Result<(StatusCode, Json<Presence>), AppError> {
    let presence = state
        .presence
        .create(auth.user_id, &body.kind, &body.connection_id)
        .await?;
    Ok((StatusCode::CREATED, Json(presence)))
}

pub async fn get_presence(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(presence_id): Path<i64>,
) -> Result<Json<Presence>, AppError> {
    Ok(Json(state.presence.get(presence_id, auth.user_id).await?))
}

pub async fn update_presence(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(presence_id): Path<i64>,
    ValidatedJson(body): ValidatedJson<UpdatePresenceRequest>,
) -> Result<Json<Presence>, AppError> {
    let presence = state
        .presence
        .update(presence_id, auth.user_id, body.into())
        .await?;
    Ok(Json(presence))
}

pub async fn delete_presence(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(presence_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    state.presence.delete(presence_id, auth.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

//! Profile Handlers
//!
//! The caller's own profile under `/users/@me/profile`.

use axum::{extract::State, http::StatusCode, Json};

use crate::application::dto::request::ProfileRequest;
use crate::domain::Profile;
use crate::presentation::http::extractors::ValidatedJson;
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::startup::AppState;

pub async fn get_profile(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Profile>, AppError> {
    Ok(Json(state.profiles.get(auth.user_id).await?))
}

pub async fn create_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidatedJson(body): ValidatedJson<ProfileRequest>,
) -> Result<(StatusCode, Json<Profile>), AppError> {
    let profile = state.profiles.create(auth.user_id, body.into()).await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

pub async fn update_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidatedJson(body): ValidatedJson<ProfileRequest>,
) -> Result<Json<Profile>, AppError> {
    Ok(Json(state.profiles.update(auth.user_id, body.into()).await?))
}

pub async fn delete_profile(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<StatusCode, AppError> {
    state.profiles.delete(auth.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

//! Authentication Handlers

use axum::{extract::State, http::StatusCode, Json};

use crate::application::dto::request::{LoginRequest, RefreshTokenRequest, RegisterRequest};
use crate::application::dto::response::{AuthResponse, TokenResponse};
use crate::presentation::http::extractors::ValidatedJson;
use crate::shared::error::AppError;
use crate::startup::AppState;

/// Register a new user
pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let (user, tokens) = state
        .auth
        .register(&body.name, &body.email, &body.password)
        .await?;

    Ok((StatusCode::CREATED, Json(AuthResponse::new(user, tokens))))
}

/// Login with credentials
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let (user, tokens) = state.auth.authenticate(&body.email, &body.password).await?;

    Ok(Json(AuthResponse::new(user, tokens)))
}

/// Rotate a refresh token
pub async fn refresh_token(
    State(state): State<AppState>,
    Json(body): Json<RefreshTokenRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let tokens = state.auth.refresh_token(&body.refresh_token).await?;

    Ok(Json(TokenResponse::from(tokens)))
}

/// Logout (revoke refresh token)
pub async fn logout(
    State(state): State<AppState>,
    Json(body): Json<RefreshTokenRequest>,
) -> Result<StatusCode, AppError> {
    // Unknown tokens are not an error on logout
    if let Err(e) = state.auth.revoke_token(&body.refresh_token).await {
        tracing::debug!(error = %e, "Refresh token revocation skipped");
    }

    Ok(StatusCode::NO_CONTENT)
}

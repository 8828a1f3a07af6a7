//! Application Error Types
//!
//! Centralized error handling with Axum integration. Service errors convert
//! into [`AppError`] so handlers can use `?` directly.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::application::services::{
    AuthError, ConversationError, FanoutError, MessageError, PresenceError, ProfileError,
    RecordError, UserConversationError, UserError,
};
use crate::domain::query::QueryError;

/// Application error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Validation error: {message}")]
    Validation {
        message: String,
        errors: Vec<FieldError>,
    },
}

impl AppError {
    /// Stable numeric code sent to clients
    pub fn code(&self) -> u16 {
        match self {
            AppError::Internal(_) => 10000,
            AppError::NotFound(_) => 10001,
            AppError::BadRequest(_) => 10002,
            AppError::Unauthorized(_) => 10003,
            AppError::Forbidden(_) => 10004,
            AppError::Conflict(_) => 10005,
            AppError::Validation { .. } => 10007,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) | AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Conflict(_) => StatusCode::CONFLICT,
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldError>>,
}

/// Field-level validation error
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        let (message, errors) = match self {
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                ("Internal server error".to_string(), None)
            }
            AppError::Validation { message, errors } => (message, Some(errors)),
            AppError::NotFound(msg)
            | AppError::BadRequest(msg)
            | AppError::Unauthorized(msg)
            | AppError::Forbidden(msg)
            | AppError::Conflict(msg) => (msg, None),
        };

        let body = ErrorResponse {
            code,
            message,
            errors,
        };

        (status, Json(body)).into_response()
    }
}

// ============================================================================
// Service error conversions
// ============================================================================

impl From<QueryError> for AppError {
    fn from(e: QueryError) -> Self {
        AppError::BadRequest(e.to_string())
    }
}

impl From<RecordError> for AppError {
    fn from(e: RecordError) -> Self {
        match e {
            RecordError::Query(e) => e.into(),
            // Already logged with its cause; the message is fixed.
            e => AppError::Internal(e.to_string()),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::InvalidCredentials => {
                AppError::Unauthorized("Invalid email or password".into())
            }
            AuthError::TokenExpired => AppError::Unauthorized("Token expired".into()),
            AuthError::InvalidToken => AppError::Unauthorized("Invalid token".into()),
            AuthError::RefreshTokenInvalid => {
                AppError::Unauthorized("Invalid or expired refresh token".into())
            }
            AuthError::UserNotFound => AppError::NotFound("User not found".into()),
            AuthError::EmailExists => AppError::Conflict("Email already exists".into()),
            AuthError::Internal(msg) => AppError::Internal(msg),
            AuthError::Record(e) => e.into(),
        }
    }
}

impl From<UserError> for AppError {
    fn from(e: UserError) -> Self {
        match e {
            UserError::NotFound => AppError::NotFound(e.to_string()),
            UserError::InvalidPassword | UserError::SamePassword => {
                AppError::BadRequest(e.to_string())
            }
            UserError::Internal(msg) => AppError::Internal(msg),
            UserError::Record(e) => e.into(),
        }
    }
}

impl From<ProfileError> for AppError {
    fn from(e: ProfileError) -> Self {
        match e {
            ProfileError::NotFound => AppError::NotFound(e.to_string()),
            ProfileError::AlreadyExists => AppError::Conflict(e.to_string()),
            ProfileError::Internal(msg) => AppError::Internal(msg),
            ProfileError::Record(e) => e.into(),
        }
    }
}

impl From<ConversationError> for AppError {
    fn from(e: ConversationError) -> Self {
        match e {
            ConversationError::NotFound => AppError::NotFound(e.to_string()),
            ConversationError::Forbidden => AppError::Forbidden(e.to_string()),
            ConversationError::InvalidParticipants => AppError::BadRequest(e.to_string()),
            ConversationError::Record(e) => e.into(),
        }
    }
}

impl From<MessageError> for AppError {
    fn from(e: MessageError) -> Self {
        match e {
            MessageError::NotFound | MessageError::ConversationNotFound => {
                AppError::NotFound(e.to_string())
            }
            MessageError::Forbidden => AppError::Forbidden(e.to_string()),
            MessageError::InvalidContent => AppError::BadRequest(e.to_string()),
            MessageError::Record(e) => e.into(),
        }
    }
}

impl From<UserConversationError> for AppError {
    fn from(e: UserConversationError) -> Self {
        match e {
            UserConversationError::NotFound => AppError::NotFound(e.to_string()),
            UserConversationError::Forbidden => AppError::Forbidden(e.to_string()),
            UserConversationError::Record(e) => e.into(),
        }
    }
}

impl From<PresenceError> for AppError {
    fn from(e: PresenceError) -> Self {
        match e {
            PresenceError::NotFound => AppError::NotFound(e.to_string()),
            PresenceError::Forbidden => AppError::Forbidden(e.to_string()),
            PresenceError::Record(e) => e.into(),
        }
    }
}

impl From<FanoutError> for AppError {
    fn from(e: FanoutError) -> Self {
        match e {
            FanoutError::ConversationNotFound | FanoutError::NotFound => {
                AppError::NotFound(e.to_string())
            }
            FanoutError::InvalidContent => AppError::BadRequest(e.to_string()),
            FanoutError::Record(e) => e.into(),
        }
    }
}

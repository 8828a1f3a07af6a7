//! Authentication Service
//!
//! Registration, credential checks and access/refresh token management.
//! Refresh tokens are opaque, stored hashed and rotated on every use.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde::Serialize;
use serde_json::json;
use tracing::{info, instrument, warn};

use super::record_service::{RecordContext, RecordError, RecordService};
use crate::domain::ports::{document, Claims, TokenError, TokenService};
use crate::domain::query::{fields, FieldFilter, QueryRequest};
use crate::domain::{normalize_email, RefreshToken, User};
use crate::infrastructure::auth::{
    generate_refresh_token, hash_password, hash_refresh_token, verify_password,
};

/// Authentication service trait for dependency injection
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Register a new user
    async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<(User, AuthTokens), AuthError>;

    /// Authenticate user with credentials
    async fn authenticate(&self, email: &str, password: &str)
        -> Result<(User, AuthTokens), AuthError>;

    /// Exchange a refresh token for a new token pair
    async fn refresh_token(&self, refresh_token: &str) -> Result<AuthTokens, AuthError>;

    /// Revoke refresh token (logout)
    async fn revoke_token(&self, refresh_token: &str) -> Result<(), AuthError>;

    /// Validate access token and return its claims
    fn validate_token(&self, access_token: &str) -> Result<Claims, AuthError>;

    /// Resolve an access token to a live user through its email claim
    async fn get_current_user(&self, access_token: &str) -> Result<User, AuthError>;
}

/// Authentication tokens response
#[derive(Debug, Clone, Serialize)]
pub struct AuthTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub token_type: String,
}

/// Authentication errors
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("User not found")]
    UserNotFound,

    #[error("Email already exists")]
    EmailExists,

    #[error("Refresh token not found or already used")]
    RefreshTokenInvalid,

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Record(#[from] RecordError),
}

impl From<TokenError> for AuthError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Expired => AuthError::TokenExpired,
            TokenError::Invalid(_) => AuthError::InvalidToken,
            TokenError::Encoding(msg) => AuthError::Internal(msg),
        }
    }
}

/// AuthService implementation
pub struct AuthServiceImpl {
    users: RecordService<User>,
    refresh_tokens: RecordService<RefreshToken>,
    tokens: Arc<dyn TokenService>,
    refresh_token_expiry_days: i64,
}

impl AuthServiceImpl {
    pub fn new(
        ctx: &RecordContext,
        tokens: Arc<dyn TokenService>,
        refresh_token_expiry_days: i64,
    ) -> Self {
        Self {
            users: RecordService::new(ctx),
            refresh_tokens: RecordService::new(ctx),
            tokens,
            refresh_token_expiry_days,
        }
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        let request = QueryRequest::new()
            .matching(fields([("email", FieldFilter::eq(normalize_email(email)))]));
        Ok(self.users.find_one(&request).await?)
    }

    async fn find_refresh_token(&self, refresh_token: &str) -> Result<Option<RefreshToken>, AuthError> {
        let request = QueryRequest::new().matching(fields([(
            "token_hash",
            FieldFilter::eq(hash_refresh_token(refresh_token)),
        )]));
        Ok(self.refresh_tokens.find_one(&request).await?)
    }

    /// Issues an access token and stores a fresh refresh token.
    async fn generate_tokens(&self, user: &User) -> Result<AuthTokens, AuthError> {
        let access_token = self.tokens.issue(user.id, &user.email, &user.name)?;
        let refresh_token = generate_refresh_token();

        self.refresh_tokens
            .create_one(RefreshToken::new(
                user.id,
                hash_refresh_token(&refresh_token),
                Utc::now() + Duration::days(self.refresh_token_expiry_days),
            ))
            .await?;

        Ok(AuthTokens {
            access_token,
            refresh_token,
            expires_in: self.tokens.expires_in(),
            token_type: "Bearer".to_string(),
        })
    }

    async fn mark_used(&self, token: &RefreshToken) -> Result<(), AuthError> {
        self.refresh_tokens
            .update_one_by_id(token.id, document(json!({ "is_used": true })))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl AuthService for AuthServiceImpl {
    #[instrument(skip(self, password))]
    async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<(User, AuthTokens), AuthError> {
        if self.find_by_email(email).await?.is_some() {
            return Err(AuthError::EmailExists);
        }

        let password_hash = hash_password(password).map_err(AuthError::Internal)?;
        let user = self
            .users
            .create_one(User::new(name.trim(), email, password_hash))
            .await?;
        let tokens = self.generate_tokens(&user).await?;

        info!(user_id = user.id, "User registered");
        Ok((user, tokens))
    }

    #[instrument(skip(self, password))]
    async fn authenticate(
        &self,
        email: &str,
        password: &str,
    ) -> Result<(User, AuthTokens), AuthError> {
        let user = self
            .find_by_email(email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !verify_password(password, &user.password) {
            return Err(AuthError::InvalidCredentials);
        }

        let tokens = self.generate_tokens(&user).await?;
        Ok((user, tokens))
    }

    #[instrument(skip_all)]
    async fn refresh_token(&self, refresh_token: &str) -> Result<AuthTokens, AuthError> {
        let stored = self
            .find_refresh_token(refresh_token)
            .await?
            .ok_or(AuthError::RefreshTokenInvalid)?;

        if stored.is_used {
            warn!(user_id = stored.user_id, "Refresh token reuse detected");
            return Err(AuthError::RefreshTokenInvalid);
        }
        if !stored.is_valid(Utc::now()) {
            return Err(AuthError::TokenExpired);
        }

        let user = self
            .users
            .find_one_by_id(stored.user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        // Rotation: the presented token is spent before a new pair exists.
        self.mark_used(&stored).await?;
        self.generate_tokens(&user).await
    }

    #[instrument(skip_all)]
    async fn revoke_token(&self, refresh_token: &str) -> Result<(), AuthError> {
        let stored = self
            .find_refresh_token(refresh_token)
            .await?
            .ok_or(AuthError::RefreshTokenInvalid)?;

        if !stored.is_used {
            self.mark_used(&stored).await?;
        }
        Ok(())
    }

    fn validate_token(&self, access_token: &str) -> Result<Claims, AuthError> {
        Ok(self.tokens.verify(access_token)?)
    }

    async fn get_current_user(&self, access_token: &str) -> Result<User, AuthError> {
        let claims = self.validate_token(access_token)?;

        self.find_by_email(&claims.email)
            .await?
            .ok_or(AuthError::UserNotFound)
    }
}

//! User Service
//!
//! Handles user management operations.

use async_trait::async_trait;
use serde_json::json;
use tracing::{info, instrument};

use super::record_service::{DeleteMode, Page, RecordContext, RecordError, RecordService};
use crate::domain::ports::document;
use crate::domain::query::{fields, FieldFilter, QueryRequest};
use crate::domain::User;
use crate::infrastructure::auth::{hash_password, verify_password};

/// User service trait
#[async_trait]
pub trait UserService: Send + Sync {
    /// Get user by ID
    async fn get_user(&self, user_id: i64) -> Result<User, UserError>;

    /// Get user with the conversations they take part in
    async fn get_user_with_conversations(&self, user_id: i64) -> Result<User, UserError>;

    /// Query users
    async fn list_users(&self, request: &QueryRequest) -> Result<Page<User>, UserError>;

    /// Update user
    async fn update_user(&self, user_id: i64, update: UpdateUserDto) -> Result<User, UserError>;

    /// Change password; the old one must match and the new one must differ
    async fn change_password(
        &self,
        user_id: i64,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), UserError>;

    /// Delete user account
    async fn delete_user(&self, user_id: i64) -> Result<(), UserError>;
}

/// Update user request
#[derive(Debug, Clone, Default)]
pub struct UpdateUserDto {
    pub name: Option<String>,
}

/// User service errors
#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error("User not found")]
    NotFound,

    #[error("Old password is incorrect")]
    InvalidPassword,

    #[error("New password must differ from the old one")]
    SamePassword,

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Record(#[from] RecordError),
}

/// UserService implementation
pub struct UserServiceImpl {
    users: RecordService<User>,
}

impl UserServiceImpl {
    pub fn new(ctx: &RecordContext) -> Self {
        Self {
            users: RecordService::new(ctx),
        }
    }
}

#[async_trait]
impl UserService for UserServiceImpl {
    async fn get_user(&self, user_id: i64) -> Result<User, UserError> {
        self.users
            .find_one_by_id(user_id)
            .await?
            .ok_or(UserError::NotFound)
    }

    async fn get_user_with_conversations(&self, user_id: i64) -> Result<User, UserError> {
        let request = QueryRequest::new()
            .matching(fields([("id", FieldFilter::eq(user_id))]))
            .join(["conversations"]);

        self.users
            .find_one(&request)
            .await?
            .ok_or(UserError::NotFound)
    }

    async fn list_users(&self, request: &QueryRequest) -> Result<Page<User>, UserError> {
        Ok(self.users.find_many(request).await?)
    }

    #[instrument(skip(self, update))]
    async fn update_user(&self, user_id: i64, update: UpdateUserDto) -> Result<User, UserError> {
        let current = self.get_user(user_id).await?;
        let Some(name) = update.name else {
            return Ok(current);
        };

        Ok(self
            .users
            .update_one_by_id(user_id, document(json!({ "name": name.trim() })))
            .await?)
    }

    #[instrument(skip(self, old_password, new_password))]
    async fn change_password(
        &self,
        user_id: i64,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), UserError> {
        let user = self.get_user(user_id).await?;

        if !verify_password(old_password, &user.password) {
            return Err(UserError::InvalidPassword);
        }
        if old_password == new_password {
            return Err(UserError::SamePassword);
        }

        let hash = hash_password(new_password).map_err(UserError::Internal)?;
        self.users
            .update_one_by_id(user_id, document(json!({ "password": hash })))
            .await?;

        info!(user_id, "Password changed");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_user(&self, user_id: i64) -> Result<(), UserError> {
        self.users
            .delete_one_by_id(user_id, DeleteMode::Soft)
            .await?
            .map(|_| ())
            .ok_or(UserError::NotFound)
    }
}

//! Request DTOs
//!
//! Data structures for API request bodies.

use chrono::NaiveDate;
use serde::Deserialize;
use validator::Validate;

use crate::application::services::{
    CreateConversationDto, ProfileDto, UpdateConversationDto, UpdateLinkDto, UpdateMessageDto,
    UpdatePresenceDto, UpdateUserDto,
};

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
}

/// Registration request
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
}

/// Refresh token request
#[derive(Debug, Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

/// Change password request
#[derive(Debug, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    pub old_password: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub new_password: String,
}

/// Update user request
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,
}

impl From<UpdateUserRequest> for UpdateUserDto {
    fn from(body: UpdateUserRequest) -> Self {
        Self { name: body.name }
    }
}

/// Create or update profile request
#[derive(Debug, Default, Deserialize, Validate)]
pub struct ProfileRequest {
    #[validate(url(message = "Avatar must be a URL"))]
    pub avatar: Option<String>,

    #[validate(length(max = 255, message = "Address must be at most 255 characters"))]
    pub address: Option<String>,

    #[validate(length(max = 32, message = "Phone must be at most 32 characters"))]
    pub phone: Option<String>,

    #[validate(length(max = 1000, message = "Description must be at most 1000 characters"))]
    pub description: Option<String>,

    pub gender: Option<String>,
    pub position: Option<String>,
    pub birthday: Option<NaiveDate>,
}

impl From<ProfileRequest> for ProfileDto {
    fn from(body: ProfileRequest) -> Self {
        Self {
            avatar: body.avatar,
            address: body.address,
            phone: body.phone,
            description: body.description,
            gender: body.gender,
            position: body.position,
            birthday: body.birthday,
        }
    }
}

/// Create conversation request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateConversationRequest {
    #[validate(length(max = 100, message = "Title must be at most 100 characters"))]
    pub title: Option<String>,

    #[validate(length(max = 500, message = "Description must be at most 500 characters"))]
    pub description: Option<String>,

    pub background: Option<String>,
    pub emoji: Option<String>,

    /// Other participants; the caller is always included
    #[serde(default)]
    pub participant_ids: Vec<i64>,
}

impl From<CreateConversationRequest> for CreateConversationDto {
    fn from(body: CreateConversationRequest) -> Self {
        Self {
            title: body.title,
            description: body.description,
            background: body.background,
            emoji: body.emoji,
            participant_ids: body.participant_ids,
        }
    }
}

/// Update conversation request
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateConversationRequest {
    #[validate(length(max = 100, message = "Title must be at most 100 characters"))]
    pub title: Option<String>,

    #[validate(length(max = 500, message = "Description must be at most 500 characters"))]
    pub description: Option<String>,

    pub background: Option<String>,
    pub emoji: Option<String>,
}

impl From<UpdateConversationRequest> for UpdateConversationDto {
    fn from(body: UpdateConversationRequest) -> Self {
        Self {
            title: body.title,
            description: body.description,
            background: body.background,
            emoji: body.emoji,
        }
    }
}

/// Send message request
#[derive(Debug, Deserialize, Validate)]
pub struct SendMessageRequest {
    #[validate(length(min = 1, max = 4000, message = "Message must be 1-4000 characters"))]
    pub message: String,
}

/// Update message request
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateMessageRequest {
    #[validate(length(min = 1, max = 4000, message = "Message must be 1-4000 characters"))]
    pub message: Option<String>,

    /// Read flag
    pub status: Option<bool>,
}

impl From<UpdateMessageRequest> for UpdateMessageDto {
    fn from(body: UpdateMessageRequest) -> Self {
        Self {
            message: body.message,
            status: body.status,
        }
    }
}

/// Update participant link request
#[derive(Debug, Deserialize)]
pub struct UpdateLinkRequest {
    pub mute: Option<bool>,
    pub block: Option<bool>,
}

impl From<UpdateLinkRequest> for UpdateLinkDto {
    fn from(body: UpdateLinkRequest) -> Self {
        Self {
            mute: body.mute,
            block: body.block,
        }
    }
}

/// Move the caller's last-seen pointer
#[derive(Debug, Deserialize)]
pub struct LastMessageRequest {
    pub conversation_id: i64,
    pub last_message_id: i64,
}

/// Create presence row request
#[derive(Debug, Deserialize, Validate)]
pub struct CreatePresenceRequest {
    #[validate(length(min = 1, max = 64, message = "Kind must be 1-64 characters"))]
    pub kind: String,

    #[validate(length(min = 1, max = 255, message = "Connection id must be 1-255 characters"))]
    pub connection_id: String,
}

/// Update presence row request
#[derive(Debug, Deserialize, Validate)]
pub struct UpdatePresenceRequest {
    pub active: Option<bool>,

    #[validate(length(min = 1, max = 64, message = "Kind must be 1-64 characters"))]
    pub kind: Option<String>,
}

impl From<UpdatePresenceRequest> for UpdatePresenceDto {
    fn from(body: UpdatePresenceRequest) -> Self {
        Self {
            active: body.active,
            kind: body.kind,
        }
    }
}

/// Pagination query parameters
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageParams {
    pub page: Option<u64>,
    pub page_size: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MAX_MESSAGE_LENGTH;

    #[test]
    fn test_register_request_validation() {
        let body: RegisterRequest = serde_json::from_value(serde_json::json!({
            "name": "Ann",
            "email": "not-an-email",
            "password": "password123"
        }))
        .unwrap();
        let errors = body.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("email"));
    }

    #[test]
    fn test_message_length_is_bounded() {
        let body = SendMessageRequest {
            message: "x".repeat(MAX_MESSAGE_LENGTH + 1),
        };
        assert!(body.validate().is_err());

        let body = SendMessageRequest {
            message: "hello".into(),
        };
        assert!(body.validate().is_ok());
    }

    #[test]
    fn test_participants_default_to_empty() {
        let body: CreateConversationRequest =
            serde_json::from_value(serde_json::json!({ "title": "Lunch" })).unwrap();
        assert!(body.participant_ids.is_empty());
        assert!(CreateConversationDto::from(body).title.is_some());
    }

    #[test]
    fn test_page_params_are_camel_case() {
        let params: PageParams =
            serde_json::from_value(serde_json::json!({ "page": 2, "pageSize": 5 })).unwrap();
        assert_eq!(params.page, Some(2));
        assert_eq!(params.page_size, Some(5));
    }
}

//! Response DTOs
//!
//! Data structures for API response bodies. Users are always rendered
//! without their password hash, including when nested in a relation.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::application::services::AuthTokens;
use crate::domain::{Conversation, Message, User, UserConversation};

/// Authentication tokens response
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub token_type: String,
}

impl From<AuthTokens> for TokenResponse {
    fn from(tokens: AuthTokens) -> Self {
        Self {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            expires_in: tokens.expires_in,
            token_type: tokens.token_type,
        }
    }
}

/// Registration/login response (user and tokens)
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: UserResponse,
    #[serde(flatten)]
    pub tokens: TokenResponse,
}

impl AuthResponse {
    pub fn new(user: User, tokens: AuthTokens) -> Self {
        Self {
            user: user.into(),
            tokens: tokens.into(),
        }
    }
}

/// User response
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversations: Option<Vec<ConversationResponse>>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            created_at: user.created_at,
            updated_at: user.updated_at,
            conversations: user
                .conversations
                .map(|list| list.into_iter().map(Into::into).collect()),
        }
    }
}

/// Conversation response
#[derive(Debug, Serialize)]
pub struct ConversationResponse {
    pub id: i64,
    pub title: Option<String>,
    pub description: Option<String>,
    pub background: Option<String>,
    pub emoji: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub users: Option<Vec<UserResponse>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<MessageResponse>>,
}

impl From<Conversation> for ConversationResponse {
    fn from(conversation: Conversation) -> Self {
        Self {
            id: conversation.id,
            title: conversation.title,
            description: conversation.description,
            background: conversation.background,
            emoji: conversation.emoji,
            created_at: conversation.created_at,
            updated_at: conversation.updated_at,
            users: conversation
                .users
                .map(|list| list.into_iter().map(Into::into).collect()),
            messages: conversation
                .messages
                .map(|list| list.into_iter().map(Into::into).collect()),
        }
    }
}

/// Message response
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub id: i64,
    pub conversation_id: i64,
    pub user_id: i64,
    pub status: bool,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserResponse>,
}

impl From<Message> for MessageResponse {
    fn from(message: Message) -> Self {
        Self {
            id: message.id,
            conversation_id: message.conversation_id,
            user_id: message.user_id,
            status: message.status,
            message: message.message,
            created_at: message.created_at,
            updated_at: message.updated_at,
            user: message.user.map(|user| (*user).into()),
        }
    }
}

/// Participant link response
#[derive(Debug, Serialize)]
pub struct UserConversationResponse {
    pub id: i64,
    pub user_id: i64,
    pub conversation_id: i64,
    pub last_message_id: Option<i64>,
    pub mute: bool,
    pub block: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation: Option<ConversationResponse>,
}

impl From<UserConversation> for UserConversationResponse {
    fn from(link: UserConversation) -> Self {
        Self {
            id: link.id,
            user_id: link.user_id,
            conversation_id: link.conversation_id,
            last_message_id: link.last_message_id,
            mute: link.mute,
            block: link.block,
            created_at: link.created_at,
            updated_at: link.updated_at,
            conversation: link.conversation.map(|c| (*c).into()),
        }
    }
}

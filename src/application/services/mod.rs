//! Application Services
//!
//! Business logic services that coordinate domain operations.
//!
//! ## Available Services
//!
//! - **RecordService**: Generic CRUD over any entity (query compiler + store)
//! - **AuthService**: Registration, login, JWT and refresh token rotation
//! - **UserService**: User management and password changes
//! - **ProfileService**: Per-user profile
//! - **ConversationService**: Conversations and participants
//! - **MessageService**: Message history and CRUD
//! - **UserConversationService**: Participant links and last-seen pointers
//! - **PresenceRegistry**: User to live connection mapping
//! - **MessageFanout**: Inbound gateway messages to every participant

pub mod auth_service;
pub mod conversation_service;
pub mod fanout_service;
pub mod message_service;
pub mod presence_service;
pub mod profile_service;
pub mod record_service;
pub mod user_conversation_service;
pub mod user_service;

// Re-export generic record service types
pub use record_service::{
    DeleteMode, Page, RecordContext, RecordError, RecordService, FIND_ALL_LIMIT,
};

// Re-export auth service types
pub use auth_service::{AuthError, AuthService, AuthServiceImpl, AuthTokens};

// Re-export user service types
pub use user_service::{UpdateUserDto, UserError, UserService, UserServiceImpl};

pub use profile_service::{ProfileDto, ProfileError, ProfileService};

// Re-export conversation service types
pub use conversation_service::{
    ConversationError, ConversationService, ConversationServiceImpl, CreateConversationDto,
    UpdateConversationDto,
};

// Re-export message service types
pub use message_service::{
    MessageError, MessageService, MessageServiceImpl, UpdateMessageDto,
    DEFAULT_MESSAGE_PAGE_SIZE,
};

pub use user_conversation_service::{
    UpdateLinkDto, UserConversationError, UserConversationService,
};

pub use presence_service::{PresenceError, PresenceRegistry, UpdatePresenceDto};

pub use fanout_service::{
    FanoutError, FanoutReport, MessageFanout, MessageReceived, MESSAGE_RECEIVED_EVENT,
};

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use fake::faker::name::en::Name;
    use fake::Fake;

    use super::record_service::{RecordContext, RecordService};
    use crate::config::JwtSettings;
    use crate::domain::ports::TokenService;
    use crate::domain::User;
    use crate::infrastructure::auth::{hash_password, JwtTokenService};
    use crate::infrastructure::storage::MemoryStore;
    use crate::shared::snowflake::SnowflakeGenerator;

    pub fn context() -> RecordContext {
        RecordContext::new(
            Arc::new(MemoryStore::new()),
            Arc::new(SnowflakeGenerator::new(1, 1)),
        )
    }

    pub fn token_service() -> Arc<dyn TokenService> {
        Arc::new(JwtTokenService::new(&JwtSettings {
            secret: "unit-test-secret-that-is-long-enough".to_string(),
            access_token_expiry_minutes: 15,
            refresh_token_expiry_days: 7,
        }))
    }

    pub async fn seed_user(ctx: &RecordContext, email: &str, password: &str) -> User {
        let name: String = Name().fake();
        RecordService::<User>::new(ctx)
            .create_one(User::new(name, email, hash_password(password).unwrap()))
            .await
            .unwrap()
    }
}

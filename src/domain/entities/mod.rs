//! # Domain Entities
//!
//! Persisted records of the chat backend. Each entity carries a static
//! schema (table, columns, relations) and is read and written through the
//! generic record service.
//!
//! - **User**: account with credentials
//! - **Profile**: optional personal details of a user
//! - **RefreshToken**: hashed, single-use refresh tokens
//! - **Conversation**: a chat between participants
//! - **UserConversation**: participant link with mute/block flags and last-seen pointer
//! - **Message**: a message posted to a conversation
//! - **Presence**: one row per live gateway connection

mod conversation;
mod message;
mod presence;
mod profile;
mod refresh_token;
mod user;
mod user_conversation;

pub use conversation::Conversation;
pub use message::{Message, MAX_MESSAGE_LENGTH};
pub use presence::{Presence, SOCKET_ID_KIND};
pub use profile::Profile;
pub use refresh_token::RefreshToken;
pub use user::{normalize_email, User};
pub use user_conversation::UserConversation;

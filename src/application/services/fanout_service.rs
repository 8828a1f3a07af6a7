//! Message Fan-out
//!
//! Handles one inbound chat message from the gateway:
//!
//! ```text
//! load conversation (+users) -> participant ids -> live connections
//!   -> persist message -> sender's last-message pointer -> push to all
//! ```
//!
//! Persistence happens before any push. Pushes are best effort; a failed
//! pointer update is reported only after the message went out.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use tracing::{info, instrument, warn};

use super::presence_service::{PresenceError, PresenceRegistry};
use super::record_service::{RecordContext, RecordError, RecordService};
use super::user_conversation_service::{UserConversationError, UserConversationService};
use crate::domain::ports::{ConnectionPusher, PushEvent};
use crate::domain::query::{fields, FieldFilter, QueryRequest};
use crate::domain::{Conversation, Message, MAX_MESSAGE_LENGTH};
use crate::infrastructure::metrics;

/// Outbound event name for delivered chat messages.
pub const MESSAGE_RECEIVED_EVENT: &str = "message-received";

/// `message-received` payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageReceived {
    pub id: i64,
    pub message: String,
    pub conversation_id: i64,
    pub user_id: i64,
    pub status: bool,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl From<&Message> for MessageReceived {
    fn from(message: &Message) -> Self {
        Self {
            id: message.id,
            message: message.message.clone(),
            conversation_id: message.conversation_id,
            user_id: message.user_id,
            status: message.status,
            created_at: message.created_at,
            updated_at: message.updated_at,
        }
    }
}

/// Outcome of a successful fan-out.
#[derive(Debug, Clone)]
pub struct FanoutReport {
    pub message: Message,
    pub delivered: usize,
    pub dropped: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum FanoutError {
    #[error("Conversation not found")]
    ConversationNotFound,

    /// The sender has no link record for the conversation.
    #[error("Not found")]
    NotFound,

    #[error("Message must be between 1 and {} characters", MAX_MESSAGE_LENGTH)]
    InvalidContent,

    #[error(transparent)]
    Record(#[from] RecordError),
}

impl From<PresenceError> for FanoutError {
    fn from(e: PresenceError) -> Self {
        match e {
            PresenceError::Record(e) => FanoutError::Record(e),
            PresenceError::NotFound | PresenceError::Forbidden => FanoutError::NotFound,
        }
    }
}

impl From<UserConversationError> for FanoutError {
    fn from(e: UserConversationError) -> Self {
        match e {
            UserConversationError::Record(e) => FanoutError::Record(e),
            UserConversationError::NotFound | UserConversationError::Forbidden => {
                FanoutError::NotFound
            }
        }
    }
}

#[derive(Clone)]
pub struct MessageFanout {
    conversations: RecordService<Conversation>,
    messages: RecordService<Message>,
    links: UserConversationService,
    presence: PresenceRegistry,
    pusher: Arc<dyn ConnectionPusher>,
}

impl MessageFanout {
    pub fn new(ctx: &RecordContext, pusher: Arc<dyn ConnectionPusher>) -> Self {
        Self {
            conversations: RecordService::new(ctx),
            messages: RecordService::new(ctx),
            links: UserConversationService::new(ctx),
            presence: PresenceRegistry::new(ctx),
            pusher,
        }
    }

    /// Persists `text` from `sender_id` and pushes it to every live
    /// connection of every participant.
    #[instrument(skip(self, text))]
    pub async fn handle_inbound_message(
        &self,
        connection_id: &str,
        sender_id: i64,
        conversation_id: i64,
        text: &str,
    ) -> Result<FanoutReport, FanoutError> {
        let length = text.trim().chars().count();
        if length == 0 || length > MAX_MESSAGE_LENGTH {
            return Err(FanoutError::InvalidContent);
        }

        let request = QueryRequest::new()
            .matching(fields([("id", FieldFilter::eq(conversation_id))]))
            .join(["users"]);
        let conversation = self
            .conversations
            .find_one(&request)
            .await?
            .ok_or(FanoutError::ConversationNotFound)?;

        let participants = conversation.participant_ids();
        let connections = self.presence.resolve_connections(&participants).await?;

        let message = self
            .messages
            .create_one(Message::new(conversation_id, sender_id, text))
            .await?;

        // Deferred until the message has been pushed.
        let pointer = self
            .links
            .update_last_message(sender_id, conversation_id, message.id)
            .await;

        let payload = match serde_json::to_value(MessageReceived::from(&message)) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "Failed to encode message payload");
                serde_json::Value::Null
            }
        };
        let event = PushEvent::new(MESSAGE_RECEIVED_EVENT, payload);
        let results = join_all(
            connections
                .iter()
                .map(|connection| self.pusher.push(connection, event.clone())),
        )
        .await;

        let delivered = results.iter().filter(|ok| **ok).count();
        let dropped = results.len() - delivered;
        metrics::record_fanout(delivered as u64, dropped as u64);
        info!(
            message_id = message.id,
            delivered, dropped, "Message fanned out"
        );

        if let Err(e) = pointer {
            warn!(error = %e, "Sender link update failed");
            return Err(e.into());
        }

        Ok(FanoutReport {
            message,
            delivered,
            dropped,
        })
    }
}

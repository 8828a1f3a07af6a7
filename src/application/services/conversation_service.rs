//! Conversation Service
//!
//! Conversations and their participants. Every participant gets a
//! user-conversation link when the conversation is created.

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, instrument};

use super::record_service::{DeleteMode, Page, RecordContext, RecordError, RecordService};
use super::user_conversation_service::{UserConversationError, UserConversationService};
use crate::domain::ports::Document;
use crate::domain::query::{fields, FieldFilter, QueryRequest};
use crate::domain::{Conversation, User};

/// Conversation service trait
#[async_trait]
pub trait ConversationService: Send + Sync {
    /// Create a conversation; the creator is always a participant
    async fn create_conversation(
        &self,
        creator_id: i64,
        dto: CreateConversationDto,
    ) -> Result<Conversation, ConversationError>;

    /// Get a conversation with its participants
    async fn get_conversation(
        &self,
        conversation_id: i64,
        user_id: i64,
    ) -> Result<Conversation, ConversationError>;

    /// Conversations the user takes part in, most recently updated first
    async fn list_conversations(
        &self,
        user_id: i64,
        page: u64,
        page_size: u64,
    ) -> Result<Page<Conversation>, ConversationError>;

    /// Query conversations
    async fn query_conversations(
        &self,
        request: &QueryRequest,
    ) -> Result<Page<Conversation>, ConversationError>;

    async fn update_conversation(
        &self,
        conversation_id: i64,
        user_id: i64,
        dto: UpdateConversationDto,
    ) -> Result<Conversation, ConversationError>;

    async fn delete_conversation(
        &self,
        conversation_id: i64,
        user_id: i64,
    ) -> Result<(), ConversationError>;

    /// Ids of every participant
    async fn participant_ids(&self, conversation_id: i64) -> Result<Vec<i64>, ConversationError>;
}

/// Create conversation request
#[derive(Debug, Clone, Default)]
pub struct CreateConversationDto {
    pub title: Option<String>,
    pub description: Option<String>,
    pub background: Option<String>,
    pub emoji: Option<String>,
    /// Other participants; the creator is added automatically
    pub participant_ids: Vec<i64>,
}

/// Update conversation request; `None` leaves a field untouched
#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateConversationDto {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emoji: Option<String>,
}

/// Conversation service errors
#[derive(Debug, thiserror::Error)]
pub enum ConversationError {
    #[error("Conversation not found")]
    NotFound,

    #[error("Not a participant of this conversation")]
    Forbidden,

    #[error("Unknown participant(s)")]
    InvalidParticipants,

    #[error(transparent)]
    Record(#[from] RecordError),
}

impl From<UserConversationError> for ConversationError {
    fn from(e: UserConversationError) -> Self {
        match e {
            UserConversationError::NotFound => ConversationError::NotFound,
            UserConversationError::Forbidden => ConversationError::Forbidden,
            UserConversationError::Record(e) => ConversationError::Record(e),
        }
    }
}

/// ConversationService implementation
pub struct ConversationServiceImpl {
    conversations: RecordService<Conversation>,
    users: RecordService<User>,
    links: UserConversationService,
}

impl ConversationServiceImpl {
    pub fn new(ctx: &RecordContext) -> Self {
        Self {
            conversations: RecordService::new(ctx),
            users: RecordService::new(ctx),
            links: UserConversationService::new(ctx),
        }
    }

    async fn load(&self, conversation_id: i64) -> Result<Conversation, ConversationError> {
        let request = QueryRequest::new()
            .matching(fields([("id", FieldFilter::eq(conversation_id))]))
            .join(["users"]);

        self.conversations
            .find_one(&request)
            .await?
            .ok_or(ConversationError::NotFound)
    }

    async fn ensure_participant(
        &self,
        conversation_id: i64,
        user_id: i64,
    ) -> Result<(), ConversationError> {
        if self
            .conversations
            .find_one_by_id(conversation_id)
            .await?
            .is_none()
        {
            return Err(ConversationError::NotFound);
        }
        if !self.links.is_participant(conversation_id, user_id).await? {
            return Err(ConversationError::Forbidden);
        }
        Ok(())
    }
}

#[async_trait]
impl ConversationService for ConversationServiceImpl {
    #[instrument(skip(self, dto))]
    async fn create_conversation(
        &self,
        creator_id: i64,
        dto: CreateConversationDto,
    ) -> Result<Conversation, ConversationError> {
        let mut participants = vec![creator_id];
        for id in dto.participant_ids {
            if !participants.contains(&id) {
                participants.push(id);
            }
        }

        let known = self
            .users
            .count(&QueryRequest::new().matching(fields([(
                "id",
                FieldFilter::is_in(participants.iter().copied()),
            )])))
            .await?;
        if known != participants.len() as u64 {
            return Err(ConversationError::InvalidParticipants);
        }

        let conversation = self
            .conversations
            .create_one(Conversation {
                title: dto.title,
                description: dto.description,
                background: dto.background,
                emoji: dto.emoji,
                ..Conversation::default()
            })
            .await?;
        self.links
            .link_participants(conversation.id, &participants)
            .await?;

        info!(
            conversation_id = conversation.id,
            participants = participants.len(),
            "Conversation created"
        );
        self.load(conversation.id).await
    }

    async fn get_conversation(
        &self,
        conversation_id: i64,
        user_id: i64,
    ) -> Result<Conversation, ConversationError> {
        let conversation = self.load(conversation_id).await?;
        if !conversation.participant_ids().contains(&user_id) {
            return Err(ConversationError::Forbidden);
        }
        Ok(conversation)
    }

    async fn list_conversations(
        &self,
        user_id: i64,
        page: u64,
        page_size: u64,
    ) -> Result<Page<Conversation>, ConversationError> {
        let ids: Vec<i64> = self
            .links
            .list_for_user(user_id)
            .await?
            .into_iter()
            .map(|link| link.conversation_id)
            .collect();

        let request = QueryRequest::new()
            .matching(fields([("id", FieldFilter::is_in(ids))]))
            .sort(["-updated_at"])
            .page(page, page_size);
        Ok(self.conversations.find_many(&request).await?)
    }

    async fn query_conversations(
        &self,
        request: &QueryRequest,
    ) -> Result<Page<Conversation>, ConversationError> {
        Ok(self.conversations.find_many(request).await?)
    }

    #[instrument(skip(self, dto))]
    async fn update_conversation(
        &self,
        conversation_id: i64,
        user_id: i64,
        dto: UpdateConversationDto,
    ) -> Result<Conversation, ConversationError> {
        self.ensure_participant(conversation_id, user_id).await?;

        let patch: Document = match serde_json::to_value(dto) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => Document::new(),
        };
        if !patch.is_empty() {
            self.conversations
                .update_one_by_id(conversation_id, patch)
                .await?;
        }
        self.load(conversation_id).await
    }

    #[instrument(skip(self))]
    async fn delete_conversation(
        &self,
        conversation_id: i64,
        user_id: i64,
    ) -> Result<(), ConversationError> {
        self.ensure_participant(conversation_id, user_id).await?;
        self.conversations
            .delete_one_by_id(conversation_id, DeleteMode::Soft)
            .await?
            .map(|_| ())
            .ok_or(ConversationError::NotFound)
    }

    async fn participant_ids(&self, conversation_id: i64) -> Result<Vec<i64>, ConversationError> {
        Ok(self.load(conversation_id).await?.participant_ids())
    }
}

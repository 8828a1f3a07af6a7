//! Message Service
//!
//! Handles message operations: history, send, edit, delete.

use async_trait::async_trait;
use serde::Serialize;
use tracing::instrument;

use super::record_service::{DeleteMode, Page, RecordContext, RecordError, RecordService};
use super::user_conversation_service::{UserConversationError, UserConversationService};
use crate::domain::ports::Document;
use crate::domain::query::{fields, FieldFilter, QueryRequest};
use crate::domain::{Conversation, Message, MAX_MESSAGE_LENGTH};

/// Default history page size
pub const DEFAULT_MESSAGE_PAGE_SIZE: u64 = 30;

/// Message service trait
#[async_trait]
pub trait MessageService: Send + Sync {
    /// Conversation history, newest first
    async fn get_messages(
        &self,
        conversation_id: i64,
        user_id: i64,
        page: Option<u64>,
        page_size: Option<u64>,
    ) -> Result<Page<Message>, MessageError>;

    /// Get a single message
    async fn get_message(&self, message_id: i64, user_id: i64) -> Result<Message, MessageError>;

    /// Store a message without real-time delivery
    async fn send_message(
        &self,
        conversation_id: i64,
        author_id: i64,
        content: &str,
    ) -> Result<Message, MessageError>;

    /// Edit text (author only) or the read flag (any participant)
    async fn update_message(
        &self,
        message_id: i64,
        user_id: i64,
        dto: UpdateMessageDto,
    ) -> Result<Message, MessageError>;

    /// Delete a message (author only)
    async fn delete_message(&self, message_id: i64, user_id: i64) -> Result<(), MessageError>;

    /// Query messages
    async fn query_messages(&self, request: &QueryRequest) -> Result<Page<Message>, MessageError>;
}

/// Update message request; `None` leaves a field untouched
#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateMessageDto {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<bool>,
}

/// Message service errors
#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    #[error("Message not found")]
    NotFound,

    #[error("Conversation not found")]
    ConversationNotFound,

    #[error("Permission denied")]
    Forbidden,

    #[error("Message must be between 1 and {} characters", MAX_MESSAGE_LENGTH)]
    InvalidContent,

    #[error(transparent)]
    Record(#[from] RecordError),
}

impl From<UserConversationError> for MessageError {
    fn from(e: UserConversationError) -> Self {
        match e {
            UserConversationError::NotFound => MessageError::NotFound,
            UserConversationError::Forbidden => MessageError::Forbidden,
            UserConversationError::Record(e) => MessageError::Record(e),
        }
    }
}

fn check_content(content: &str) -> Result<(), MessageError> {
    let length = content.trim().chars().count();
    if length == 0 || length > MAX_MESSAGE_LENGTH {
        return Err(MessageError::InvalidContent);
    }
    Ok(())
}

/// MessageService implementation
pub struct MessageServiceImpl {
    messages: RecordService<Message>,
    conversations: RecordService<Conversation>,
    links: UserConversationService,
}

impl MessageServiceImpl {
    pub fn new(ctx: &RecordContext) -> Self {
        Self {
            messages: RecordService::new(ctx),
            conversations: RecordService::new(ctx),
            links: UserConversationService::new(ctx),
        }
    }

    async fn check_access(&self, conversation_id: i64, user_id: i64) -> Result<(), MessageError> {
        if self
            .conversations
            .find_one_by_id(conversation_id)
            .await?
            .is_none()
        {
            return Err(MessageError::ConversationNotFound);
        }
        if !self.links.is_participant(conversation_id, user_id).await? {
            return Err(MessageError::Forbidden);
        }
        Ok(())
    }
}

#[async_trait]
impl MessageService for MessageServiceImpl {
    async fn get_messages(
        &self,
        conversation_id: i64,
        user_id: i64,
        page: Option<u64>,
        page_size: Option<u64>,
    ) -> Result<Page<Message>, MessageError> {
        self.check_access(conversation_id, user_id).await?;

        let request = QueryRequest::new()
            .matching(fields([("conversation_id", FieldFilter::eq(conversation_id))]))
            .sort(["-created_at", "-id"])
            .page(
                page.unwrap_or(1),
                page_size.unwrap_or(DEFAULT_MESSAGE_PAGE_SIZE),
            );
        Ok(self.messages.find_many(&request).await?)
    }

    async fn get_message(&self, message_id: i64, user_id: i64) -> Result<Message, MessageError> {
        let message = self
            .messages
            .find_one_by_id(message_id)
            .await?
            .ok_or(MessageError::NotFound)?;
        self.check_access(message.conversation_id, user_id).await?;
        Ok(message)
    }

    #[instrument(skip(self, content))]
    async fn send_message(
        &self,
        conversation_id: i64,
        author_id: i64,
        content: &str,
    ) -> Result<Message, MessageError> {
        check_content(content)?;
        self.check_access(conversation_id, author_id).await?;

        Ok(self
            .messages
            .create_one(Message::new(conversation_id, author_id, content))
            .await?)
    }

    #[instrument(skip(self, dto))]
    async fn update_message(
        &self,
        message_id: i64,
        user_id: i64,
        dto: UpdateMessageDto,
    ) -> Result<Message, MessageError> {
        let message = self.get_message(message_id, user_id).await?;
        if let Some(text) = &dto.message {
            check_content(text)?;
            if message.user_id != user_id {
                return Err(MessageError::Forbidden);
            }
        }

        let patch: Document = match serde_json::to_value(dto) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => Document::new(),
        };
        if patch.is_empty() {
            return Ok(message);
        }
        Ok(self.messages.update_one_by_id(message.id, patch).await?)
    }

    #[instrument(skip(self))]
    async fn delete_message(&self, message_id: i64, user_id: i64) -> Result<(), MessageError> {
        let message = self
            .messages
            .find_one_by_id(message_id)
            .await?
            .ok_or(MessageError::NotFound)?;
        if message.user_id != user_id {
            return Err(MessageError::Forbidden);
        }

        self.messages
            .delete_one_by_id(message.id, DeleteMode::Soft)
            .await?
            .map(|_| ())
            .ok_or(MessageError::NotFound)
    }

    async fn query_messages(&self, request: &QueryRequest) -> Result<Page<Message>, MessageError> {
        Ok(self.messages.find_many(request).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::test_support::context;

    async fn conversation_with(ctx: &RecordContext, users: &[i64]) -> i64 {
        let conversation = RecordService::<Conversation>::new(ctx)
            .create_one(Conversation::default())
            .await
            .unwrap();
        UserConversationService::new(ctx)
            .link_participants(conversation.id, users)
            .await
            .unwrap();
        conversation.id
    }

    #[tokio::test]
    async fn test_history_is_newest_first_with_default_page_size() {
        let ctx = context();
        let service = MessageServiceImpl::new(&ctx);
        let conversation_id = conversation_with(&ctx, &[1, 2]).await;

        for i in 0..35 {
            service
                .send_message(conversation_id, 1 + (i % 2), &format!("message {}", i))
                .await
                .unwrap();
        }

        let page = service
            .get_messages(conversation_id, 2, None, None)
            .await
            .unwrap();
        assert_eq!(page.total, 35);
        assert_eq!(page.page_size, DEFAULT_MESSAGE_PAGE_SIZE);
        assert_eq!(page.data.len(), 30);
        assert_eq!(page.data[0].message, "message 34");
        assert!(page.data.windows(2).all(|w| w[0].id > w[1].id));
    }

    #[tokio::test]
    async fn test_non_participant_is_forbidden() {
        let ctx = context();
        let service = MessageServiceImpl::new(&ctx);
        let conversation_id = conversation_with(&ctx, &[1]).await;

        let err = service
            .send_message(conversation_id, 9, "hi")
            .await
            .unwrap_err();
        assert!(matches!(err, MessageError::Forbidden));

        let err = service.send_message(404, 1, "hi").await.unwrap_err();
        assert!(matches!(err, MessageError::ConversationNotFound));
    }

    #[tokio::test]
    async fn test_only_author_edits_text_but_anyone_marks_read() {
        let ctx = context();
        let service = MessageServiceImpl::new(&ctx);
        let conversation_id = conversation_with(&ctx, &[1, 2]).await;
        let message = service
            .send_message(conversation_id, 1, "hello")
            .await
            .unwrap();

        let err = service
            .update_message(
                message.id,
                2,
                UpdateMessageDto {
                    message: Some("edited".into()),
                    status: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, MessageError::Forbidden));

        let read = service
            .update_message(
                message.id,
                2,
                UpdateMessageDto {
                    message: None,
                    status: Some(true),
                },
            )
            .await
            .unwrap();
        assert!(read.status);
        assert_eq!(read.message, "hello");

        assert!(matches!(
            service.delete_message(message.id, 2).await,
            Err(MessageError::Forbidden)
        ));
        service.delete_message(message.id, 1).await.unwrap();
    }

    #[tokio::test]
    async fn test_empty_message_is_rejected() {
        let ctx = context();
        let service = MessageServiceImpl::new(&ctx);
        let conversation_id = conversation_with(&ctx, &[1]).await;

        let err = service
            .send_message(conversation_id, 1, "   ")
            .await
            .unwrap_err();
        assert!(matches!(err, MessageError::InvalidContent));
    }
}

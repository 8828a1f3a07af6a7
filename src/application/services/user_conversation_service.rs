//! User-Conversation Link Service
//!
//! Participation records: membership, mute/block flags and the last-seen
//! message pointer.

use serde::Serialize;
use serde_json::json;
use tracing::instrument;

use super::record_service::{DeleteMode, RecordContext, RecordError, RecordService};
use crate::domain::ports::{document, Document};
use crate::domain::query::{fields, FieldFilter, QueryRequest};
use crate::domain::UserConversation;

/// Link flags; `None` leaves a flag untouched.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateLinkDto {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mute: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block: Option<bool>,
}

#[derive(Debug, thiserror::Error)]
pub enum UserConversationError {
    #[error("Not found")]
    NotFound,

    #[error("Not a participant of this conversation")]
    Forbidden,

    #[error(transparent)]
    Record(#[from] RecordError),
}

#[derive(Clone)]
pub struct UserConversationService {
    links: RecordService<UserConversation>,
}

impl UserConversationService {
    pub fn new(ctx: &RecordContext) -> Self {
        Self {
            links: RecordService::new(ctx),
        }
    }

    fn membership(user_id: i64, conversation_id: i64) -> QueryRequest {
        QueryRequest::new().matching(fields([
            ("user_id", FieldFilter::eq(user_id)),
            ("conversation_id", FieldFilter::eq(conversation_id)),
        ]))
    }

    pub async fn get(&self, id: i64, user_id: i64) -> Result<UserConversation, UserConversationError> {
        let link = self
            .links
            .find_one_by_id(id)
            .await?
            .ok_or(UserConversationError::NotFound)?;
        if link.user_id != user_id {
            return Err(UserConversationError::Forbidden);
        }
        Ok(link)
    }

    /// The caller's links, newest first, with their conversations.
    pub async fn list_for_user(
        &self,
        user_id: i64,
    ) -> Result<Vec<UserConversation>, UserConversationError> {
        let request = QueryRequest::new()
            .matching(fields([("user_id", FieldFilter::eq(user_id))]))
            .join(["conversation"])
            .sort(["-id"]);
        Ok(self.links.find_all(&request).await?)
    }

    pub async fn find_link(
        &self,
        user_id: i64,
        conversation_id: i64,
    ) -> Result<Option<UserConversation>, UserConversationError> {
        Ok(self
            .links
            .find_one(&Self::membership(user_id, conversation_id))
            .await?)
    }

    pub async fn is_participant(
        &self,
        conversation_id: i64,
        user_id: i64,
    ) -> Result<bool, UserConversationError> {
        let count = self
            .links
            .count(&Self::membership(user_id, conversation_id))
            .await?;
        Ok(count > 0)
    }

    /// Creates one link per user.
    #[instrument(skip(self))]
    pub async fn link_participants(
        &self,
        conversation_id: i64,
        user_ids: &[i64],
    ) -> Result<Vec<UserConversation>, UserConversationError> {
        let links = user_ids
            .iter()
            .map(|user_id| UserConversation::new(*user_id, conversation_id))
            .collect();
        Ok(self.links.create_many(links).await?)
    }

    #[instrument(skip(self, dto))]
    pub async fn update(
        &self,
        id: i64,
        user_id: i64,
        dto: UpdateLinkDto,
    ) -> Result<UserConversation, UserConversationError> {
        let link = self.get(id, user_id).await?;
        let patch: Document = match serde_json::to_value(dto) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => Document::new(),
        };
        if patch.is_empty() {
            return Ok(link);
        }
        Ok(self.links.update_one_by_id(link.id, patch).await?)
    }

    /// Points the user's link for a conversation at `message_id`.
    #[instrument(skip(self))]
    pub async fn update_last_message(
        &self,
        user_id: i64,
        conversation_id: i64,
        message_id: i64,
    ) -> Result<UserConversation, UserConversationError> {
        let link = self
            .find_link(user_id, conversation_id)
            .await?
            .ok_or(UserConversationError::NotFound)?;

        Ok(self
            .links
            .update_one_by_id(link.id, document(json!({ "last_message_id": message_id })))
            .await?)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: i64, user_id: i64) -> Result<(), UserConversationError> {
        let link = self.get(id, user_id).await?;
        self.links
            .delete_one_by_id(link.id, DeleteMode::Soft)
            .await?
            .map(|_| ())
            .ok_or(UserConversationError::NotFound)
    }
}

//! Conversation entity.
//!
//! Maps to the `conversations` table. Participants are linked through
//! `user_conversation`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Message, User, UserConversation};
use crate::domain::schema::{
    audit_columns, Column, ColumnType, Entity, EntitySchema, RelationDef, RelationKind,
};

pub(crate) static SCHEMA: EntitySchema = EntitySchema {
    table: "conversations",
    columns: audit_columns![
        Column::nullable("title", ColumnType::Text),
        Column::nullable("description", ColumnType::Text),
        Column::nullable("background", ColumnType::Text),
        Column::nullable("emoji", ColumnType::Text),
    ],
    relations: &[
        RelationDef {
            name: "users",
            kind: RelationKind::ManyToMany {
                through: "user_conversation",
                local_key: "conversation_id",
                foreign_key: "user_id",
            },
            target: || &super::user::SCHEMA,
        },
        RelationDef {
            name: "messages",
            kind: RelationKind::HasMany {
                foreign_key: "conversation_id",
            },
            target: || &super::message::SCHEMA,
        },
        RelationDef {
            name: "user_conversations",
            kind: RelationKind::HasMany {
                foreign_key: "conversation_id",
            },
            target: || &super::user_conversation::SCHEMA,
        },
    ],
};

/// A conversation between two or more users.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Conversation {
    pub id: i64,
    pub title: Option<String>,
    pub description: Option<String>,
    /// Background image URL or color
    pub background: Option<String>,
    pub emoji: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub users: Option<Vec<User>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<Message>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_conversations: Option<Vec<UserConversation>>,
}

impl Conversation {
    /// Ids of the loaded participants; empty when `users` was not joined.
    pub fn participant_ids(&self) -> Vec<i64> {
        self.users
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|u| u.id)
            .collect()
    }
}

impl Entity for Conversation {
    fn schema() -> &'static EntitySchema {
        &SCHEMA
    }

    fn id(&self) -> i64 {
        self.id
    }
}

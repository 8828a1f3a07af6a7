//! Participant link between a user and a conversation.
//!
//! Maps to the `user_conversation` table. Besides membership it carries the
//! per-user mute/block flags and the last-seen message pointer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Conversation, User};
use crate::domain::schema::{
    audit_columns, Column, ColumnType, Entity, EntitySchema, RelationDef, RelationKind,
};

pub(crate) static SCHEMA: EntitySchema = EntitySchema {
    table: "user_conversation",
    columns: audit_columns![
        Column::new("user_id", ColumnType::BigInt),
        Column::new("conversation_id", ColumnType::BigInt),
        Column::nullable("last_message_id", ColumnType::BigInt),
        Column::new("mute", ColumnType::Boolean),
        Column::new("block", ColumnType::Boolean),
    ],
    relations: &[
        RelationDef {
            name: "user",
            kind: RelationKind::BelongsTo {
                local_key: "user_id",
            },
            target: || &super::user::SCHEMA,
        },
        RelationDef {
            name: "conversation",
            kind: RelationKind::BelongsTo {
                local_key: "conversation_id",
            },
            target: || &super::conversation::SCHEMA,
        },
    ],
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UserConversation {
    pub id: i64,
    pub user_id: i64,
    pub conversation_id: i64,
    /// Last message the user has seen
    pub last_message_id: Option<i64>,
    pub mute: bool,
    pub block: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<Box<User>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation: Option<Box<Conversation>>,
}

impl UserConversation {
    pub fn new(user_id: i64, conversation_id: i64) -> Self {
        Self {
            user_id,
            conversation_id,
            ..Self::default()
        }
    }
}

impl Entity for UserConversation {
    fn schema() -> &'static EntitySchema {
        &SCHEMA
    }

    fn id(&self) -> i64 {
        self.id
    }
}

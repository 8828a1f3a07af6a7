//! Message entity.
//!
//! Maps to the `messages` table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::User;
use crate::domain::schema::{
    audit_columns, Column, ColumnType, Entity, EntitySchema, RelationDef, RelationKind,
};

pub(crate) static SCHEMA: EntitySchema = EntitySchema {
    table: "messages",
    columns: audit_columns![
        Column::new("conversation_id", ColumnType::BigInt),
        Column::new("user_id", ColumnType::BigInt),
        Column::new("status", ColumnType::Boolean),
        Column::new("message", ColumnType::Text),
    ],
    relations: &[RelationDef {
        name: "user",
        kind: RelationKind::BelongsTo {
            local_key: "user_id",
        },
        target: || &super::user::SCHEMA,
    }],
};

/// Maximum message length in characters.
pub const MAX_MESSAGE_LENGTH: usize = 4000;

/// A message posted to a conversation.
///
/// Maps to the `messages` table:
/// - id: BIGINT PRIMARY KEY (Snowflake ID)
/// - conversation_id: BIGINT NOT NULL REFERENCES conversations(id)
/// - user_id: BIGINT NOT NULL REFERENCES users(id)
/// - status: BOOLEAN NOT NULL DEFAULT FALSE (read flag)
/// - message: TEXT NOT NULL
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Message {
    pub id: i64,
    pub conversation_id: i64,
    /// Author
    pub user_id: i64,
    /// Read flag; new messages start unread
    pub status: bool,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<Box<User>>,
}

impl Message {
    /// A new unread message.
    pub fn new(conversation_id: i64, user_id: i64, message: impl Into<String>) -> Self {
        Self {
            conversation_id,
            user_id,
            status: false,
            message: message.into(),
            ..Self::default()
        }
    }
}

impl Entity for Message {
    fn schema() -> &'static EntitySchema {
        &SCHEMA
    }

    fn id(&self) -> i64 {
        self.id
    }
}

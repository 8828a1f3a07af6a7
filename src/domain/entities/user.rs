//! User entity.
//!
//! Maps to the `users` table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Conversation;
use crate::domain::schema::{
    audit_columns, Column, ColumnType, Entity, EntitySchema, RelationDef, RelationKind,
};

pub(crate) static SCHEMA: EntitySchema = EntitySchema {
    table: "users",
    columns: audit_columns![
        Column::new("name", ColumnType::Text),
        Column::new("email", ColumnType::Text),
        Column::new("password", ColumnType::Text),
    ],
    relations: &[RelationDef {
        name: "conversations",
        kind: RelationKind::ManyToMany {
            through: "user_conversation",
            local_key: "user_id",
            foreign_key: "conversation_id",
        },
        target: || &super::conversation::SCHEMA,
    }],
};

/// A user account.
///
/// Maps to the `users` table:
/// - id: BIGINT PRIMARY KEY (Snowflake ID)
/// - name: TEXT NOT NULL
/// - email: TEXT NOT NULL UNIQUE (stored lower-cased)
/// - password: TEXT NOT NULL (Argon2 PHC string)
/// - created_at / updated_at: TIMESTAMPTZ NOT NULL
/// - deleted_at: TIMESTAMPTZ NULL
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct User {
    /// Snowflake ID (primary key)
    pub id: i64,

    pub name: String,

    /// Lower-cased email address
    pub email: String,

    /// Argon2 password hash
    pub password: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,

    /// Conversations the user takes part in (loaded on join)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversations: Option<Vec<Conversation>>,
}

impl User {
    pub fn new(name: impl Into<String>, email: &str, password_hash: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: normalize_email(email),
            password: password_hash.into(),
            ..Self::default()
        }
    }
}

/// Emails are compared and stored lower-cased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl Entity for User {
    fn schema() -> &'static EntitySchema {
        &SCHEMA
    }

    fn id(&self) -> i64 {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_user_lowercases_email() {
        let user = User::new("Ann", "  Ann@Example.COM ", "hash");
        assert_eq!(user.email, "ann@example.com");
    }

    #[test]
    fn test_partial_document_deserializes_with_defaults() {
        let user: User = serde_json::from_value(serde_json::json!({ "name": "Ann" })).unwrap();
        assert_eq!(user.name, "Ann");
        assert_eq!(user.id, 0);
        assert!(user.conversations.is_none());
    }
}

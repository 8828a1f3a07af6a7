//! Refresh token entity.
//!
//! Maps to the `refresh_tokens` table. Only the SHA-256 of the token is
//! stored; a token is single use.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::schema::{audit_columns, Column, ColumnType, Entity, EntitySchema};

pub(crate) static SCHEMA: EntitySchema = EntitySchema {
    table: "refresh_tokens",
    columns: audit_columns![
        Column::new("user_id", ColumnType::BigInt),
        Column::new("token_hash", ColumnType::Text),
        Column::new("expires_at", ColumnType::Timestamp),
        Column::new("is_used", ColumnType::Boolean),
    ],
    relations: &[],
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshToken {
    pub id: i64,
    pub user_id: i64,
    /// Hex SHA-256 of the token
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub is_used: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl RefreshToken {
    pub fn new(user_id: i64, token_hash: String, expires_at: DateTime<Utc>) -> Self {
        Self {
            user_id,
            token_hash,
            expires_at,
            ..Self::default()
        }
    }

    /// Whether the token can still be exchanged.
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        !self.is_used && self.deleted_at.is_none() && self.expires_at > now
    }
}

impl Entity for RefreshToken {
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
    use chrono::Duration;

    #[test]
    fn test_refresh_token_validity() {
        let now = Utc::now();
        let token = RefreshToken::new(1, "h".into(), now + Duration::days(1));
        assert!(token.is_valid(now));

        let used = RefreshToken {
            is_used: true,
            ..token.clone()
        };
        assert!(!used.is_valid(now));

        let expired = RefreshToken::new(1, "h".into(), now - Duration::seconds(1));
        assert!(!expired.is_valid(now));
    }
}
